use std::env;

use s3_transfer::{Auth, Client, api::FileSource};

#[tokio::main]
async fn main() -> Result<(), s3_transfer::Error> {
    let mut args = env::args().skip(1);
    let (Some(path), Some(bucket), Some(key)) = (args.next(), args.next(), args.next()) else {
        eprintln!("usage: resumable_upload <file> <bucket> <key>");
        return Ok(());
    };

    let endpoint = match env::var("S3_TEST_ENDPOINT") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Set S3_TEST_ENDPOINT to run this example (e.g. http://127.0.0.1:9000).");
            return Ok(());
        }
    };
    let auth = match Auth::from_env() {
        Ok(v) => v,
        Err(err) => {
            eprintln!("Set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY: {err}");
            return Ok(());
        }
    };

    let mut builder = Client::builder(&endpoint)?
        .auth(auth)
        .app_info("resumable-upload", env!("CARGO_PKG_VERSION"));
    if let Ok(region) = env::var("S3_TEST_REGION") {
        builder = builder.region(region);
    }
    let client = builder.build()?;

    // Rerunning after an interruption picks up the parts already committed.
    let source = FileSource::open(&path).await?;
    let out = client.uploads().upload(&bucket, &key, source).send().await?;

    match &out.upload_id {
        Some(upload_id) => println!(
            "uploaded {} bytes in {} parts ({} reused) under upload {upload_id}",
            out.size,
            out.parts.len(),
            out.reused_parts
        ),
        None => println!("uploaded {} bytes in a single request", out.size),
    }
    Ok(())
}
