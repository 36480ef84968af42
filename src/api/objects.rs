use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use time::{OffsetDateTime, macros::format_description};
use tokio::io::AsyncWriteExt as _;

use crate::{
    client::{
        Client,
        dispatch::{Payload, RequestSpec},
    },
    error::{Error, Result},
    types::{
        CopyObjectOutput, DownloadOutput, GetObjectOutput, ListObjectsV2Output, ObjectStat,
        PresignedRequest, PutObjectOutput,
    },
    util::{self, signing::MAX_PRESIGN_EXPIRY_SECS},
};

/// Object-level operations.
#[derive(Clone)]
pub struct ObjectsService {
    client: Client,
}

impl ObjectsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub fn get(&self, bucket: impl Into<String>, key: impl Into<String>) -> GetObjectRequest {
        GetObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            offset: 0,
            length: None,
            if_match: None,
        }
    }

    pub fn stat(&self, bucket: impl Into<String>, key: impl Into<String>) -> StatObjectRequest {
        StatObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn remove(&self, bucket: impl Into<String>, key: impl Into<String>) -> RemoveObjectRequest {
        RemoveObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Single PUT of an in-memory body. Larger or re-readable sources go
    /// through [`crate::api::UploadsService::upload`].
    pub fn put(&self, bucket: impl Into<String>, key: impl Into<String>) -> PutObjectRequest {
        PutObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            metadata: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Server-side copy of `source_bucket/source_key` onto the destination.
    pub fn copy(
        &self,
        source_bucket: impl Into<String>,
        source_key: impl Into<String>,
        destination_bucket: impl Into<String>,
        destination_key: impl Into<String>,
    ) -> CopyObjectRequest {
        CopyObjectRequest {
            client: self.client.clone(),
            source_bucket: source_bucket.into(),
            source_key: source_key.into(),
            source_version_id: None,
            destination_bucket: destination_bucket.into(),
            destination_key: destination_key.into(),
            conditions: CopyConditions::default(),
            replace_metadata: false,
            content_type: None,
            metadata: Vec::new(),
        }
    }

    /// Lists the objects of a bucket with `ListObjectsV2`. Only the level
    /// below `prefix` is listed unless [`ListObjectsV2Request::recursive`] is
    /// set.
    pub fn list_v2(&self, bucket: impl Into<String>) -> ListObjectsV2Request {
        ListObjectsV2Request {
            client: self.client.clone(),
            bucket: bucket.into(),
            prefix: None,
            recursive: false,
            start_after: None,
            max_keys: None,
        }
    }

    /// Downloads into `path`, resuming from a staging file left behind by an
    /// earlier interrupted call for the same object version.
    pub fn download_to_file(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> DownloadToFileRequest {
        DownloadToFileRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            path: path.into(),
        }
    }

    pub fn presign_get(&self, bucket: impl Into<String>, key: impl Into<String>) -> PresignObjectRequest {
        self.presign(Method::GET, bucket, key)
    }

    pub fn presign_put(&self, bucket: impl Into<String>, key: impl Into<String>) -> PresignObjectRequest {
        self.presign(Method::PUT, bucket, key)
    }

    pub fn presign_head(&self, bucket: impl Into<String>, key: impl Into<String>) -> PresignObjectRequest {
        self.presign(Method::HEAD, bucket, key)
    }

    pub fn presign_delete(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> PresignObjectRequest {
        self.presign(Method::DELETE, bucket, key)
    }

    fn presign(
        &self,
        method: Method,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> PresignObjectRequest {
        PresignObjectRequest {
            client: self.client.clone(),
            method,
            bucket: bucket.into(),
            key: key.into(),
            expires_in: Duration::from_secs(MAX_PRESIGN_EXPIRY_SECS),
            query_params: Vec::new(),
            headers: HeaderMap::new(),
        }
    }
}

pub struct GetObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    offset: u64,
    length: Option<u64>,
    if_match: Option<String>,
}

impl GetObjectRequest {
    /// Reads `length` bytes from `offset`, or to the end when `length` is
    /// `None`.
    pub fn range(mut self, offset: u64, length: Option<u64>) -> Self {
        self.offset = offset;
        self.length = length;
        self
    }

    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }

    pub async fn send(self) -> Result<GetObjectOutput> {
        let mut headers = HeaderMap::new();
        let ranged = self.offset > 0 || self.length.is_some();
        if ranged {
            let range = match self.length {
                Some(0) => return Err(Error::validation("range length must be positive")),
                Some(length) => {
                    let last = self
                        .offset
                        .checked_add(length - 1)
                        .ok_or_else(|| Error::validation("range end overflows u64"))?;
                    format!("bytes={}-{last}", self.offset)
                }
                None => format!("bytes={}-", self.offset),
            };
            util::headers::insert(&mut headers, http::header::RANGE, &range)?;
        }
        if let Some(etag) = &self.if_match {
            util::headers::insert(&mut headers, http::header::IF_MATCH, etag)?;
        }

        let expected = if ranged {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };
        let resp = self
            .client
            .dispatch(
                RequestSpec::new(Method::GET)
                    .object(&self.bucket, &self.key)
                    .headers(headers),
                Payload::Empty,
                expected,
            )
            .await?;

        Ok(GetObjectOutput {
            etag: util::headers::etag(&resp.headers),
            content_length: util::headers::header_u64(&resp.headers, http::header::CONTENT_LENGTH),
            content_type: util::headers::header_string(&resp.headers, http::header::CONTENT_TYPE),
            content_range: util::headers::header_string(&resp.headers, http::header::CONTENT_RANGE),
            body: resp.body,
        })
    }
}

pub struct StatObjectRequest {
    client: Client,
    bucket: String,
    key: String,
}

impl StatObjectRequest {
    pub async fn send(self) -> Result<ObjectStat> {
        let (_, headers) = self
            .client
            .dispatch_drained(
                RequestSpec::new(Method::HEAD).object(&self.bucket, &self.key),
                Payload::Empty,
                StatusCode::OK,
            )
            .await?;

        let metadata: BTreeMap<String, String> = headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix("x-amz-meta-")?;
                Some((key.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();

        Ok(ObjectStat {
            size: util::headers::header_u64(&headers, http::header::CONTENT_LENGTH).unwrap_or(0),
            etag: util::headers::etag(&headers),
            content_type: util::headers::header_string(&headers, http::header::CONTENT_TYPE),
            last_modified: util::headers::header_string(&headers, http::header::LAST_MODIFIED),
            metadata,
        })
    }
}

pub struct RemoveObjectRequest {
    client: Client,
    bucket: String,
    key: String,
}

impl RemoveObjectRequest {
    pub async fn send(self) -> Result<()> {
        self.client
            .dispatch_drained(
                RequestSpec::new(Method::DELETE).object(&self.bucket, &self.key),
                Payload::Empty,
                StatusCode::NO_CONTENT,
            )
            .await?;
        Ok(())
    }
}

pub struct PutObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    content_type: Option<String>,
    metadata: Vec<(String, String)>,
    body: Bytes,
}

impl PutObjectRequest {
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub async fn send(self) -> Result<PutObjectOutput> {
        let headers = object_headers(self.content_type.as_deref(), &self.metadata)?;
        put_object(
            &self.client,
            &self.bucket,
            &self.key,
            headers,
            Payload::Bytes(self.body),
        )
        .await
    }
}

/// `Content-Type` (defaulting to `application/octet-stream`) plus user
/// metadata headers.
pub(crate) fn object_headers(
    content_type: Option<&str>,
    metadata: &[(String, String)],
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    util::headers::insert(
        &mut headers,
        http::header::CONTENT_TYPE,
        content_type.unwrap_or("application/octet-stream"),
    )?;
    for (key, value) in metadata {
        let name = util::headers::metadata_name(key)?;
        util::headers::insert(&mut headers, name, value)?;
    }
    Ok(headers)
}

/// Single PUT, shared by plain puts and the small-object path of uploads.
pub(crate) async fn put_object(
    client: &Client,
    bucket: &str,
    key: &str,
    headers: HeaderMap,
    payload: Payload,
) -> Result<PutObjectOutput> {
    let (_, headers) = client
        .dispatch_drained(
            RequestSpec::new(Method::PUT)
                .object(bucket, key)
                .headers(headers),
            payload,
            StatusCode::OK,
        )
        .await?;
    Ok(PutObjectOutput {
        etag: util::headers::etag(&headers),
    })
}

/// Preconditions on the copy source, checked by the server.
#[derive(Clone, Debug, Default)]
pub struct CopyConditions {
    modified_since: Option<OffsetDateTime>,
    unmodified_since: Option<OffsetDateTime>,
    match_etag: Option<String>,
    match_etag_except: Option<String>,
}

impl CopyConditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy only if the source changed after `at`.
    pub fn modified_since(mut self, at: OffsetDateTime) -> Self {
        self.modified_since = Some(at);
        self
    }

    /// Copy only if the source is unchanged since `at`.
    pub fn unmodified_since(mut self, at: OffsetDateTime) -> Self {
        self.unmodified_since = Some(at);
        self
    }

    pub fn match_etag(mut self, etag: impl Into<String>) -> Self {
        self.match_etag = Some(etag.into());
        self
    }

    pub fn match_etag_except(mut self, etag: impl Into<String>) -> Self {
        self.match_etag_except = Some(etag.into());
        self
    }

    fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        let dates = [
            ("x-amz-copy-source-if-modified-since", self.modified_since),
            ("x-amz-copy-source-if-unmodified-since", self.unmodified_since),
        ];
        for (name, at) in dates {
            if let Some(at) = at {
                util::headers::insert(headers, HeaderName::from_static(name), &http_date(at)?)?;
            }
        }
        let etags = [
            ("x-amz-copy-source-if-match", &self.match_etag),
            ("x-amz-copy-source-if-none-match", &self.match_etag_except),
        ];
        for (name, etag) in etags {
            if let Some(etag) = etag {
                util::headers::insert(headers, HeaderName::from_static(name), etag)?;
            }
        }
        Ok(())
    }
}

/// IMF-fixdate, e.g. `Tue, 15 Nov 1994 08:12:31 GMT`.
fn http_date(at: OffsetDateTime) -> Result<String> {
    at.to_offset(time::UtcOffset::UTC)
        .format(format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))
        .map_err(|_| Error::validation("copy condition date cannot be formatted"))
}

/// `x-amz-copy-source` value: `/bucket/key`, key encoded like a path.
fn copy_source(bucket: &str, key: &str, version_id: Option<&str>) -> String {
    let key = util::encode::encode_path(key);
    match version_id {
        Some(version) => format!(
            "/{bucket}/{key}?versionId={}",
            util::encode::encode_component(version)
        ),
        None => format!("/{bucket}/{key}"),
    }
}

pub struct CopyObjectRequest {
    client: Client,
    source_bucket: String,
    source_key: String,
    source_version_id: Option<String>,
    destination_bucket: String,
    destination_key: String,
    conditions: CopyConditions,
    replace_metadata: bool,
    content_type: Option<String>,
    metadata: Vec<(String, String)>,
}

impl CopyObjectRequest {
    pub fn source_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.source_version_id = Some(version_id.into());
        self
    }

    pub fn conditions(mut self, conditions: CopyConditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Replaces the source metadata instead of copying it. Implied by
    /// [`Self::content_type`] and [`Self::metadata`].
    pub fn replace_metadata(mut self) -> Self {
        self.replace_metadata = true;
        self
    }

    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self.replace_metadata = true;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self.replace_metadata = true;
        self
    }

    pub async fn send(self) -> Result<CopyObjectOutput> {
        util::validate::bucket_name(&self.source_bucket)?;
        util::validate::object_name(&self.source_key)?;

        let mut headers = if self.replace_metadata {
            let mut headers = object_headers(self.content_type.as_deref(), &self.metadata)?;
            headers.insert(
                HeaderName::from_static("x-amz-metadata-directive"),
                HeaderValue::from_static("REPLACE"),
            );
            headers
        } else {
            HeaderMap::new()
        };
        util::headers::insert(
            &mut headers,
            HeaderName::from_static("x-amz-copy-source"),
            &copy_source(
                &self.source_bucket,
                &self.source_key,
                self.source_version_id.as_deref(),
            ),
        )?;
        self.conditions.apply(&mut headers)?;

        let body = self
            .client
            .dispatch(
                RequestSpec::new(Method::PUT)
                    .object(&self.destination_bucket, &self.destination_key)
                    .headers(headers),
                Payload::Empty,
                StatusCode::OK,
            )
            .await?
            .text()
            .await?;
        let out = util::xml::parse_copy_object(&body)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            source_bucket = %self.source_bucket,
            source_key = %self.source_key,
            etag = ?out.etag,
            "copied object"
        );
        Ok(out)
    }
}

pub struct ListObjectsV2Request {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    recursive: bool,
    start_after: Option<String>,
    max_keys: Option<u32>,
}

impl ListObjectsV2Request {
    pub fn prefix(mut self, value: impl Into<String>) -> Self {
        self.prefix = Some(value.into());
        self
    }

    /// When `false`, keys below the next `/` are grouped into prefixes.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Lists keys that sort after `key`.
    pub fn start_after(mut self, key: impl Into<String>) -> Self {
        self.start_after = Some(key.into());
        self
    }

    /// Page size; the service caps it at 1000.
    pub fn max_keys(mut self, value: u32) -> Self {
        self.max_keys = Some(value);
        self
    }

    pub fn pager(self) -> ListObjectsV2Pager {
        ListObjectsV2Pager {
            request: self,
            continuation_token: None,
            done: false,
        }
    }

    /// First page only.
    pub async fn send(self) -> Result<ListObjectsV2Output> {
        self.page(None).await
    }

    async fn page(&self, continuation_token: Option<&str>) -> Result<ListObjectsV2Output> {
        if let Some(prefix) = &self.prefix {
            util::validate::prefix(prefix)?;
        }
        if self.max_keys == Some(0) {
            return Err(Error::validation("max_keys must be positive"));
        }

        let mut spec = RequestSpec::new(Method::GET)
            .bucket(&self.bucket)
            .query("list-type", "2")
            .query("prefix", self.prefix.clone().unwrap_or_default());
        if !self.recursive {
            spec = spec.query("delimiter", "/");
        }
        if let Some(max_keys) = self.max_keys {
            spec = spec.query("max-keys", max_keys.to_string());
        }
        match continuation_token {
            Some(token) => spec = spec.query("continuation-token", token),
            None => {
                if let Some(start_after) = &self.start_after {
                    spec = spec.query("start-after", start_after.as_str());
                }
            }
        }

        let body = self
            .client
            .dispatch(spec, Payload::Empty, StatusCode::OK)
            .await?
            .text()
            .await?;
        util::xml::parse_list_objects_v2(&body)
    }
}

pub struct ListObjectsV2Pager {
    request: ListObjectsV2Request,
    continuation_token: Option<String>,
    done: bool,
}

impl ListObjectsV2Pager {
    pub async fn next_page(&mut self) -> Result<Option<ListObjectsV2Output>> {
        if self.done {
            return Ok(None);
        }
        let page = self.request.page(self.continuation_token.as_deref()).await?;

        self.continuation_token = page.next_continuation_token.clone();
        if !page.is_truncated || self.continuation_token.is_none() {
            self.done = true;
        }
        Ok(Some(page))
    }
}

pub struct DownloadToFileRequest {
    client: Client,
    bucket: String,
    key: String,
    path: PathBuf,
}

impl DownloadToFileRequest {
    pub async fn send(self) -> Result<DownloadOutput> {
        let stat = ObjectsService::new(self.client.clone())
            .stat(&self.bucket, &self.key)
            .send()
            .await?;
        let etag = stat.etag.clone().unwrap_or_default();
        let staging = staging_path(&self.path, &etag);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("failed to create download directory", e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&staging)
            .await
            .map_err(|e| io_error("failed to open staging file", e))?;
        let mut offset = file
            .metadata()
            .await
            .map_err(|e| io_error("failed to stat staging file", e))?
            .len();

        if offset > stat.size {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                path = %staging.display(),
                offset,
                size = stat.size,
                "staging file larger than object, restarting download"
            );
            file.set_len(0)
                .await
                .map_err(|e| io_error("failed to truncate staging file", e))?;
            offset = 0;
        }
        let resumed_from = offset;

        if offset < stat.size {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                bucket = %self.bucket,
                key = %self.key,
                offset,
                size = stat.size,
                "downloading object"
            );
            let mut request = ObjectsService::new(self.client.clone()).get(&self.bucket, &self.key);
            if offset > 0 {
                request = request.range(offset, None);
            }
            if let Some(etag) = &stat.etag {
                request = request.if_match(etag.clone());
            }
            request.send().await?.write_to(&mut file).await?;
        }
        file.flush()
            .await
            .map_err(|e| io_error("failed to flush staging file", e))?;
        drop(file);

        let written = tokio::fs::metadata(&staging)
            .await
            .map_err(|e| io_error("failed to stat staging file", e))?
            .len();
        if written != stat.size {
            return Err(Error::consistency(format!(
                "downloaded {written} bytes but object {}/{} is {} bytes",
                self.bucket, self.key, stat.size
            )));
        }

        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| io_error("failed to move staging file into place", e))?;

        Ok(DownloadOutput {
            path: self.path,
            size: stat.size,
            etag: stat.etag,
            resumed_from,
        })
    }
}

/// `<path>.<etag>.part.s3`: a new object version never resumes an old file.
fn staging_path(path: &Path, etag: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{etag}.part.s3"));
    PathBuf::from(name)
}

fn io_error(message: &str, err: std::io::Error) -> Error {
    Error::transport(message, Some(Box::new(err)))
}

pub struct PresignObjectRequest {
    client: Client,
    method: Method,
    bucket: String,
    key: String,
    expires_in: Duration,
    query_params: Vec<(String, String)>,
    headers: HeaderMap,
}

impl PresignObjectRequest {
    /// Between one second and seven days; seven days when unset.
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expires_in = duration;
        self
    }

    /// Extra signed query parameter, e.g. `response-content-type`.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    /// Header the eventual request must carry unchanged.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub async fn build(self) -> Result<PresignedRequest> {
        self.client
            .presign(
                self.method,
                &self.bucket,
                &self.key,
                self.expires_in,
                self.query_params,
                self.headers,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_path_carries_etag() {
        let path = staging_path(Path::new("/tmp/out/data.bin"), "abc123");
        assert_eq!(path, PathBuf::from("/tmp/out/data.bin.abc123.part.s3"));
    }

    #[test]
    fn copy_source_encodes_the_key() {
        assert_eq!(copy_source("photos", "dir/a b+c.jpg", None), "/photos/dir/a%20b%2Bc.jpg");
        assert_eq!(
            copy_source("photos", "k", Some("v/1")),
            "/photos/k?versionId=v%2F1"
        );
    }

    #[test]
    fn copy_conditions_become_headers() {
        let at = OffsetDateTime::from_unix_timestamp(784_887_151).unwrap();
        let mut headers = HeaderMap::new();
        CopyConditions::new()
            .modified_since(at)
            .match_etag("abc")
            .match_etag_except("def")
            .apply(&mut headers)
            .unwrap();
        assert_eq!(
            headers["x-amz-copy-source-if-modified-since"],
            "Tue, 15 Nov 1994 08:12:31 GMT"
        );
        assert_eq!(headers["x-amz-copy-source-if-match"], "abc");
        assert_eq!(headers["x-amz-copy-source-if-none-match"], "def");
        assert!(!headers.contains_key("x-amz-copy-source-if-unmodified-since"));
    }

    #[test]
    fn object_headers_default_content_type() {
        let headers = object_headers(None, &[("Owner".to_string(), "ops".to_string())]).unwrap();
        assert_eq!(headers[http::header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(headers["x-amz-meta-owner"], "ops");
    }
}
