mod common;

use bytes::Bytes;
use futures_util::Stream;
use s3_transfer::{Error, Result};

use common::{FakeS3, PART, fake_client, pattern, static_auth};

const HTTP: &str = "http://127.0.0.1:9000";

fn chunked(data: &[u8], chunk: usize) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
    let items: Vec<Result<Bytes>> = data
        .chunks(chunk)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures_util::stream::iter(items)
}

#[tokio::test]
async fn short_stream_is_a_single_put() {
    let fake = FakeS3::new();
    let client = fake_client(HTTP, static_auth(), fake.clone());
    let data = pattern(3000);

    let out = client
        .uploads()
        .upload_stream("media", "short.bin", chunked(&data, 700))
        .content_type("text/plain")
        .send()
        .await
        .unwrap();

    assert_eq!(out.size, 3000);
    assert!(out.upload_id.is_none());
    assert_eq!(fake.object("media", "short.bin").unwrap(), Bytes::from(data));
    assert_eq!(
        fake.object_content_type("media", "short.bin").as_deref(),
        Some("text/plain")
    );
    assert_eq!(fake.seen().len(), 1);
}

#[tokio::test]
async fn empty_stream_creates_an_empty_object() {
    let fake = FakeS3::new();
    let client = fake_client(HTTP, static_auth(), fake.clone());

    let out = client
        .uploads()
        .upload_stream("media", "empty.bin", chunked(&[], 1))
        .send()
        .await
        .unwrap();

    assert_eq!(out.size, 0);
    assert_eq!(fake.object("media", "empty.bin").unwrap().len(), 0);
}

#[tokio::test]
async fn long_stream_is_sent_in_blocks() {
    let fake = FakeS3::new();
    let client = fake_client(HTTP, static_auth(), fake.clone());
    let data = pattern(2 * PART as usize + 100);

    let out = client
        .uploads()
        .upload_stream("media", "long.bin", chunked(&data, 1000))
        .size_hint(data.len() as u64)
        .send()
        .await
        .unwrap();

    let sizes: Vec<u64> = out.parts.iter().map(|p| p.size).collect();
    assert_eq!(sizes, vec![PART, PART, 100]);
    assert_eq!(out.size, data.len() as u64);
    assert_eq!(fake.object("media", "long.bin").unwrap(), Bytes::from(data));
    assert!(fake.incomplete_uploads().is_empty());
}

#[tokio::test]
async fn stream_resumes_matching_blocks() {
    let fake = FakeS3::new();
    let client = fake_client(HTTP, static_auth(), fake.clone());
    let data = pattern(2 * PART as usize + 100);

    fake.fail_part_once(2);
    let err = client
        .uploads()
        .upload_stream("media", "long.bin", chunked(&data, 4096))
        .size_hint(data.len() as u64)
        .send()
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("InternalError"));
    assert_eq!(fake.incomplete_uploads().len(), 1);

    fake.clear_log();
    let out = client
        .uploads()
        .upload_stream("media", "long.bin", chunked(&data, 4096))
        .size_hint(data.len() as u64)
        .send()
        .await
        .unwrap();

    assert_eq!(out.reused_parts, 1);
    let resent = fake.seen().iter().filter(|s| s.is_part_upload()).count();
    assert_eq!(resent, 2);
    assert_eq!(fake.object("media", "long.bin").unwrap(), Bytes::from(data));
}

#[tokio::test]
async fn source_failure_aborts_without_completing() {
    let fake = FakeS3::new();
    let client = fake_client(HTTP, static_auth(), fake.clone());

    let items: Vec<Result<Bytes>> = vec![
        Ok(Bytes::from(pattern(PART as usize))),
        Ok(Bytes::from(pattern(PART as usize))),
        Err(Error::transport("source closed", None)),
    ];
    let err = client
        .uploads()
        .upload_stream("media", "broken.bin", futures_util::stream::iter(items))
        .size_hint(3 * PART)
        .send()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport { .. }));
    assert!(fake.object("media", "broken.bin").is_none());
    assert_eq!(fake.incomplete_uploads().len(), 1);
}
