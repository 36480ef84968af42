use std::{env, time::Duration};

use s3_transfer::{Auth, Client};

#[tokio::main]
async fn main() -> Result<(), s3_transfer::Error> {
    let endpoint = env::var("S3_TEST_ENDPOINT").unwrap_or_else(|_| "https://s3.amazonaws.com".to_string());
    let bucket = env::var("S3_TEST_BUCKET").unwrap_or_else(|_| "my-bucket".to_string());
    let region = env::var("S3_TEST_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    let auth = match Auth::from_env() {
        Ok(v) => v,
        Err(err) => {
            eprintln!("Set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY: {err}");
            return Ok(());
        }
    };

    // A static region keeps presigning offline.
    let client = Client::builder(&endpoint)?
        .region(region)
        .auth(auth)
        .build()?;

    let presigned = client
        .objects()
        .presign_get(&bucket, "path/to/object.txt")
        .expires_in(Duration::from_secs(15 * 60))
        .build()
        .await?;

    println!("{} {}", presigned.method, presigned.url);
    Ok(())
}
