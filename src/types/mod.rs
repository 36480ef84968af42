//! Shared request and response types.

use std::{collections::BTreeMap, path::PathBuf};

use base64::Engine as _;
use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::Deserialize;
use time::OffsetDateTime;
use url::Url;

use crate::error::{Error, Result};

/// Streaming response body.
pub type ByteStream =
    std::pin::Pin<Box<dyn futures_core::Stream<Item = Result<Bytes>> + Send + 'static>>;

/// Fully resolved presigned request.
#[derive(Clone, Debug)]
pub struct PresignedRequest {
    /// HTTP method to use.
    pub method: Method,
    /// Fully signed request URL.
    pub url: Url,
    /// Headers that were signed and must accompany the request.
    pub headers: HeaderMap,
}

/// Result of one digest computation. Exactly one field is populated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChecksumSummary {
    /// Base64 MD5, the form `Content-MD5` expects.
    pub md5: Option<String>,
    /// Hex SHA256, the form `x-amz-content-sha256` expects.
    pub sha256: Option<String>,
}

impl ChecksumSummary {
    /// MD5 as lower-case hex, comparable with a single-part etag.
    pub fn md5_hex(&self) -> Option<String> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(self.md5.as_deref()?)
            .ok()?;
        Some(hex::encode(raw))
    }
}

/// One committed part of a multipart upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartRecord {
    pub number: u32,
    /// Etag without quotes.
    pub etag: String,
    pub size: u64,
}

/// State of one multipart upload as seen by the client.
#[derive(Clone, Debug)]
pub struct UploadSession {
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
    /// `None` while a stream of unknown length is still being read.
    pub total_size: Option<u64>,
    pub part_size: u64,
    pub parts: BTreeMap<u32, PartRecord>,
}

impl UploadSession {
    /// Parts in ascending part-number order, as sent on completion.
    pub fn manifest(&self) -> Vec<PartRecord> {
        self.parts.values().cloned().collect()
    }
}

/// Output from a GET object request.
pub struct GetObjectOutput {
    /// Response body stream, not yet consumed.
    pub body: ByteStream,
    pub etag: Option<String>,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    /// `Content-Range` of a ranged read.
    pub content_range: Option<String>,
}

impl std::fmt::Debug for GetObjectOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetObjectOutput")
            .field("body", &"<stream>")
            .field("etag", &self.etag)
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .field("content_range", &self.content_range)
            .finish()
    }
}

impl GetObjectOutput {
    /// Collects the response body into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        use futures_util::StreamExt as _;

        let mut out = Vec::new();
        let mut stream = self.body;
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(out))
    }

    /// Streams the response body into `writer` and returns the byte count.
    pub async fn write_to<W>(self, writer: &mut W) -> Result<u64>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        use futures_util::StreamExt as _;
        use tokio::io::AsyncWriteExt as _;

        let mut written = 0u64;
        let mut stream = self.body;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await.map_err(|e| {
                Error::transport("failed to write response body", Some(Box::new(e)))
            })?;
            written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| Error::transport("failed to flush writer", Some(Box::new(e))))?;
        Ok(written)
    }
}

/// Object metadata from a HEAD request.
#[derive(Clone, Debug)]
pub struct ObjectStat {
    pub size: u64,
    /// Etag without quotes.
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    /// `x-amz-meta-*` headers with the prefix stripped.
    pub metadata: BTreeMap<String, String>,
}

/// Output from a single PUT.
#[derive(Clone, Debug)]
pub struct PutObjectOutput {
    pub etag: Option<String>,
}

/// Output from a whole-object upload, simple or multipart.
#[derive(Clone, Debug)]
pub struct UploadOutput {
    pub etag: Option<String>,
    pub size: u64,
    /// Set when the object went through a multipart session.
    pub upload_id: Option<String>,
    /// Completion manifest; empty for a single PUT.
    pub parts: Vec<PartRecord>,
    /// Parts found already committed and left untouched.
    pub reused_parts: usize,
}

/// Output from initiating a multipart upload.
#[derive(Clone, Debug)]
pub struct InitiateMultipartUploadOutput {
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub upload_id: String,
}

/// Output from completing a multipart upload.
#[derive(Clone, Debug)]
pub struct CompleteMultipartUploadOutput {
    pub location: Option<String>,
    pub bucket: Option<String>,
    pub key: Option<String>,
    /// Etag without quotes. Multipart etags are not an MD5 of the object.
    pub etag: Option<String>,
}

/// One page of committed parts.
#[derive(Clone, Debug)]
pub struct ListPartsOutput {
    pub parts: Vec<PartRecord>,
    pub is_truncated: bool,
    pub next_part_number_marker: Option<u32>,
}

/// A multipart upload that was initiated but neither completed nor aborted.
#[derive(Clone, Debug)]
pub struct IncompleteUpload {
    pub key: String,
    pub upload_id: String,
    pub initiated: Option<OffsetDateTime>,
    /// Sum of the committed part sizes, when requested.
    pub size: u64,
}

/// One page of incomplete uploads.
#[derive(Clone, Debug)]
pub struct ListMultipartUploadsOutput {
    pub uploads: Vec<IncompleteUpload>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_upload_id_marker: Option<String>,
}

/// One object from a bucket listing.
#[derive(Clone, Debug)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    /// Etag without quotes.
    pub etag: Option<String>,
    pub last_modified: Option<OffsetDateTime>,
    pub storage_class: Option<String>,
}

/// One page of a `ListObjectsV2` listing.
#[derive(Clone, Debug)]
pub struct ListObjectsV2Output {
    pub objects: Vec<ObjectSummary>,
    /// Common prefixes when the listing is not recursive.
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// Output from a server-side copy.
#[derive(Clone, Debug)]
pub struct CopyObjectOutput {
    /// Etag of the new object, without quotes.
    pub etag: Option<String>,
    pub last_modified: Option<OffsetDateTime>,
}

/// A bucket owned by the caller.
#[derive(Clone, Debug)]
pub struct Bucket {
    pub name: String,
    pub creation_date: Option<String>,
}

/// Target and fields for a browser form upload.
#[derive(Clone, Debug)]
pub struct PostPolicyOutput {
    /// Where the form is posted.
    pub url: Url,
    /// Form fields to submit alongside the file, including `policy` and
    /// `x-amz-signature`.
    pub form_data: BTreeMap<String, String>,
}

/// Output from a resumable download.
#[derive(Clone, Debug)]
pub struct DownloadOutput {
    pub path: PathBuf,
    pub size: u64,
    pub etag: Option<String>,
    /// Bytes already present in the staging file when the download started.
    pub resumed_from: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct XmlError {
    #[serde(rename = "Code")]
    pub(crate) code: Option<String>,
    #[serde(rename = "Message")]
    pub(crate) message: Option<String>,
    #[serde(rename = "RequestId")]
    pub(crate) request_id: Option<String>,
    #[serde(rename = "HostId")]
    pub(crate) host_id: Option<String>,
    #[serde(rename = "Region")]
    pub(crate) region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlLocationConstraint {
    #[serde(rename = "$text", default)]
    pub(crate) region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlInitiateMultipartUploadResult {
    #[serde(rename = "Bucket")]
    pub(crate) bucket: Option<String>,
    #[serde(rename = "Key")]
    pub(crate) key: Option<String>,
    #[serde(rename = "UploadId")]
    pub(crate) upload_id: String,
}

impl From<XmlInitiateMultipartUploadResult> for InitiateMultipartUploadOutput {
    fn from(value: XmlInitiateMultipartUploadResult) -> Self {
        Self {
            bucket: value.bucket,
            key: value.key,
            upload_id: value.upload_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlCompleteMultipartUploadResult {
    #[serde(rename = "Location")]
    pub(crate) location: Option<String>,
    #[serde(rename = "Bucket")]
    pub(crate) bucket: Option<String>,
    #[serde(rename = "Key")]
    pub(crate) key: Option<String>,
    #[serde(rename = "ETag")]
    pub(crate) etag: Option<String>,
}

impl From<XmlCompleteMultipartUploadResult> for CompleteMultipartUploadOutput {
    fn from(value: XmlCompleteMultipartUploadResult) -> Self {
        Self {
            location: value.location,
            bucket: value.bucket,
            key: value.key,
            etag: value.etag.map(|e| e.trim_matches('"').to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlListPartsResult {
    #[serde(rename = "IsTruncated")]
    pub(crate) is_truncated: Option<bool>,
    #[serde(rename = "NextPartNumberMarker")]
    pub(crate) next_part_number_marker: Option<u32>,
    #[serde(rename = "Part", default)]
    pub(crate) parts: Vec<XmlPart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlPart {
    #[serde(rename = "PartNumber")]
    pub(crate) part_number: u32,
    #[serde(rename = "ETag")]
    pub(crate) etag: Option<String>,
    #[serde(rename = "Size")]
    pub(crate) size: u64,
}

impl From<XmlListPartsResult> for ListPartsOutput {
    fn from(value: XmlListPartsResult) -> Self {
        Self {
            parts: value
                .parts
                .into_iter()
                .map(|p| PartRecord {
                    number: p.part_number,
                    etag: p
                        .etag
                        .map(|e| e.trim_matches('"').to_string())
                        .unwrap_or_default(),
                    size: p.size,
                })
                .collect(),
            is_truncated: value.is_truncated.unwrap_or(false),
            next_part_number_marker: value.next_part_number_marker,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlListMultipartUploadsResult {
    #[serde(rename = "IsTruncated")]
    pub(crate) is_truncated: Option<bool>,
    #[serde(rename = "NextKeyMarker")]
    pub(crate) next_key_marker: Option<String>,
    #[serde(rename = "NextUploadIdMarker")]
    pub(crate) next_upload_id_marker: Option<String>,
    #[serde(rename = "Upload", default)]
    pub(crate) uploads: Vec<XmlUpload>,
    #[serde(rename = "CommonPrefixes", default)]
    pub(crate) common_prefixes: Vec<XmlCommonPrefix>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlUpload {
    #[serde(rename = "Key")]
    pub(crate) key: String,
    #[serde(rename = "UploadId")]
    pub(crate) upload_id: String,
    #[serde(rename = "Initiated")]
    pub(crate) initiated: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlCommonPrefix {
    #[serde(rename = "Prefix")]
    pub(crate) prefix: String,
}

impl From<XmlListMultipartUploadsResult> for ListMultipartUploadsOutput {
    fn from(value: XmlListMultipartUploadsResult) -> Self {
        Self {
            uploads: value
                .uploads
                .into_iter()
                .map(|u| IncompleteUpload {
                    key: u.key,
                    upload_id: u.upload_id,
                    initiated: u.initiated.as_deref().and_then(parse_timestamp),
                    size: 0,
                })
                .collect(),
            prefixes: value.common_prefixes.into_iter().map(|p| p.prefix).collect(),
            is_truncated: value.is_truncated.unwrap_or(false),
            next_key_marker: value.next_key_marker.filter(|v| !v.is_empty()),
            next_upload_id_marker: value.next_upload_id_marker.filter(|v| !v.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlListBucketResult {
    #[serde(rename = "IsTruncated")]
    pub(crate) is_truncated: Option<bool>,
    #[serde(rename = "NextContinuationToken")]
    pub(crate) next_continuation_token: Option<String>,
    #[serde(rename = "Contents", default)]
    pub(crate) contents: Vec<XmlObject>,
    #[serde(rename = "CommonPrefixes", default)]
    pub(crate) common_prefixes: Vec<XmlCommonPrefix>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlObject {
    #[serde(rename = "Key")]
    pub(crate) key: String,
    #[serde(rename = "Size", default)]
    pub(crate) size: u64,
    #[serde(rename = "ETag")]
    pub(crate) etag: Option<String>,
    #[serde(rename = "LastModified")]
    pub(crate) last_modified: Option<String>,
    #[serde(rename = "StorageClass")]
    pub(crate) storage_class: Option<String>,
}

impl From<XmlListBucketResult> for ListObjectsV2Output {
    fn from(value: XmlListBucketResult) -> Self {
        Self {
            objects: value
                .contents
                .into_iter()
                .map(|o| ObjectSummary {
                    key: o.key,
                    size: o.size,
                    etag: o.etag.map(|e| e.trim_matches('"').to_string()),
                    last_modified: o.last_modified.as_deref().and_then(parse_timestamp),
                    storage_class: o.storage_class,
                })
                .collect(),
            prefixes: value.common_prefixes.into_iter().map(|p| p.prefix).collect(),
            is_truncated: value.is_truncated.unwrap_or(false),
            next_continuation_token: value.next_continuation_token.filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlCopyObjectResult {
    #[serde(rename = "ETag")]
    pub(crate) etag: Option<String>,
    #[serde(rename = "LastModified")]
    pub(crate) last_modified: Option<String>,
}

impl From<XmlCopyObjectResult> for CopyObjectOutput {
    fn from(value: XmlCopyObjectResult) -> Self {
        Self {
            etag: value.etag.map(|e| e.trim_matches('"').to_string()),
            last_modified: value.last_modified.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlListAllMyBucketsResult {
    #[serde(rename = "Buckets")]
    pub(crate) buckets: Option<XmlBuckets>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlBuckets {
    #[serde(rename = "Bucket", default)]
    pub(crate) buckets: Vec<XmlBucket>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlBucket {
    #[serde(rename = "Name")]
    pub(crate) name: String,
    #[serde(rename = "CreationDate")]
    pub(crate) creation_date: Option<String>,
}

impl From<XmlListAllMyBucketsResult> for Vec<Bucket> {
    fn from(value: XmlListAllMyBucketsResult) -> Self {
        value
            .buckets
            .map(|b| b.buckets)
            .unwrap_or_default()
            .into_iter()
            .map(|b| Bucket {
                name: b.name,
                creation_date: b.creation_date,
            })
            .collect()
    }
}

fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &time::format_description::well_known::Rfc3339).ok()
}
