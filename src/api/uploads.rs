use std::{collections::BTreeMap, io, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt as _;
use http::{HeaderMap, Method, StatusCode};
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _};

use crate::{
    api::objects::{object_headers, put_object},
    client::{
        Client,
        dispatch::{Payload, RequestSpec},
    },
    error::{Error, Result},
    transport::BodyStream,
    types::{
        ByteStream, ChecksumSummary, CompleteMultipartUploadOutput, IncompleteUpload,
        InitiateMultipartUploadOutput, ListMultipartUploadsOutput, PartRecord, UploadOutput,
        UploadSession,
    },
    util::{
        self,
        hash::{ChecksumKind, StreamingHasher, normalize_etag},
        part::PartRange,
    },
};

const READ_CHUNK: usize = 64 * 1024;
const MAX_UPLOADS_PER_PAGE: u32 = 1000;

/// A re-readable upload body of known size.
#[async_trait]
pub trait UploadSource: Send + Sync {
    fn size(&self) -> u64;

    /// A fresh stream over `len` bytes starting at `offset`.
    async fn read_range(&self, offset: u64, len: u64) -> Result<ByteStream>;

    /// Content type used when the request does not set one.
    fn content_type(&self) -> Option<String> {
        None
    }
}

/// Uploads a local file without loading it into memory.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
    size: u64,
}

impl FileSource {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::transport("failed to stat upload source", Some(Box::new(e))))?;
        if !meta.is_file() {
            return Err(Error::validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(Self {
            path,
            size: meta.len(),
        })
    }
}

#[async_trait]
impl UploadSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    /// Guessed from the file extension.
    fn content_type(&self) -> Option<String> {
        mime_guess::from_path(&self.path).first().map(|mime| mime.to_string())
    }

    async fn read_range(&self, offset: u64, len: u64) -> Result<ByteStream> {
        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| Error::transport("failed to open upload source", Some(Box::new(e))))?;
        file.seek(io::SeekFrom::Start(offset))
            .await
            .map_err(|e| Error::transport("failed to seek upload source", Some(Box::new(e))))?;

        let reader = file.take(len);
        let stream = futures_util::stream::try_unfold(reader, |mut reader| async move {
            let mut buf = vec![0u8; READ_CHUNK];
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| Error::transport("failed to read upload source", Some(Box::new(e))))?;
            if n == 0 {
                return Ok(None);
            }
            buf.truncate(n);
            Ok(Some((Bytes::from(buf), reader)))
        });
        Ok(Box::pin(stream))
    }
}

/// Uploads an in-memory buffer.
#[derive(Clone, Debug)]
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl UploadSource for BytesSource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&self, offset: u64, len: u64) -> Result<ByteStream> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.data.len());
        let end = usize::try_from(offset.saturating_add(len))
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let slice = self.data.slice(start..end);
        Ok(Box::pin(futures_util::stream::once(async move { Ok(slice) })))
    }
}

/// Whole-object and multipart upload operations.
#[derive(Clone)]
pub struct UploadsService {
    client: Client,
}

impl UploadsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Uploads `source`, resuming an incomplete multipart upload of the same
    /// key when one exists.
    pub fn upload(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        source: impl UploadSource + 'static,
    ) -> UploadRequest {
        UploadRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            metadata: Vec::new(),
            source: Arc::new(source),
        }
    }

    pub fn initiate(&self, bucket: impl Into<String>, key: impl Into<String>) -> InitiateUploadRequest {
        InitiateUploadRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            metadata: Vec::new(),
        }
    }

    pub fn upload_part(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
        part_number: u32,
    ) -> UploadPartRequest {
        UploadPartRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
            part_number,
            body: Bytes::new(),
        }
    }

    pub fn complete(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> CompleteUploadRequest {
        CompleteUploadRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
            parts: Vec::new(),
        }
    }

    pub fn abort(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> AbortUploadRequest {
        AbortUploadRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }

    /// Every committed part of an upload, across all listing pages.
    pub async fn list_parts(&self, bucket: &str, key: &str, upload_id: &str) -> Result<Vec<PartRecord>> {
        list_parts(&self.client, bucket, key, upload_id).await
    }

    /// The most recently initiated incomplete upload of exactly `key`.
    pub async fn find_upload_id(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        find_upload_id(&self.client, bucket, key).await
    }

    pub fn list_incomplete_uploads(&self, bucket: impl Into<String>) -> ListIncompleteUploadsRequest {
        ListIncompleteUploadsRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            prefix: None,
            recursive: true,
            include_size: true,
        }
    }

    /// Aborts every incomplete upload of `key`.
    pub async fn remove_incomplete_upload(&self, bucket: &str, key: &str) -> Result<usize> {
        util::validate::object_name(key)?;
        let mut pager = self
            .list_incomplete_uploads(bucket)
            .prefix(key)
            .include_size(false)
            .pager();
        let mut ids = Vec::new();
        while let Some(page) = pager.next_page().await? {
            ids.extend(
                page.uploads
                    .into_iter()
                    .filter(|u| u.key == key)
                    .map(|u| u.upload_id),
            );
        }
        for upload_id in &ids {
            self.abort(bucket, key, upload_id.as_str()).send().await?;
        }
        Ok(ids.len())
    }
}

pub struct UploadRequest {
    client: Client,
    bucket: String,
    key: String,
    content_type: Option<String>,
    metadata: Vec<(String, String)>,
    source: Arc<dyn UploadSource>,
}

impl UploadRequest {
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub async fn send(self) -> Result<UploadOutput> {
        util::validate::bucket_name(&self.bucket)?;
        util::validate::object_name(&self.key)?;

        let planner = self.client.part_planner();
        let size = self.source.size();
        let content_type = self.content_type.clone().or_else(|| self.source.content_type());
        let headers = object_headers(content_type.as_deref(), &self.metadata)?;
        let kind = self.client.payload_mode().checksum_kind();

        if size < planner.min_part_size() {
            #[cfg(feature = "tracing")]
            tracing::debug!(bucket = %self.bucket, key = %self.key, size, "single request upload");
            let payload = if size == 0 {
                Payload::Empty
            } else {
                let checksum = digest_range(self.source.as_ref(), 0, size, kind).await?;
                range_payload(self.source.as_ref(), 0, size, checksum).await?
            };
            let out = put_object(&self.client, &self.bucket, &self.key, headers, payload).await?;
            return Ok(UploadOutput {
                etag: out.etag,
                size,
                upload_id: None,
                parts: Vec::new(),
                reused_parts: 0,
            });
        }

        let part_size = planner.part_size(size)?;
        let mut session = open_session(
            &self.client,
            &self.bucket,
            &self.key,
            headers,
            Some(size),
            part_size,
        )
        .await?;
        let ranges: Vec<PartRange> = planner.ranges(size, part_size).collect();
        check_committed_parts(&session, &ranges)?;

        let mut reused = 0;
        for range in ranges {
            let committed = session.parts.get(&range.number).cloned();
            let md5 = if committed.is_some() || kind == ChecksumKind::Md5 {
                Some(digest_range(self.source.as_ref(), range.offset, range.len, ChecksumKind::Md5).await?)
            } else {
                None
            };

            if let (Some(part), Some(md5)) = (&committed, &md5)
                && md5.md5_hex().as_deref() == Some(normalize_etag(&part.etag).as_str())
            {
                #[cfg(feature = "tracing")]
                tracing::debug!(part = range.number, "part already committed, skipping");
                reused += 1;
                continue;
            }

            let checksum = match (kind, md5) {
                (ChecksumKind::Md5, Some(md5)) => md5,
                _ => digest_range(self.source.as_ref(), range.offset, range.len, kind).await?,
            };
            let payload = range_payload(self.source.as_ref(), range.offset, range.len, checksum).await?;
            let record = send_part(
                &self.client,
                &self.bucket,
                &self.key,
                &session.upload_id,
                range.number,
                range.len,
                payload,
            )
            .await?;
            session.parts.insert(record.number, record);
        }

        let parts = session.manifest();
        let done = complete_upload(&self.client, &self.bucket, &self.key, &session.upload_id, &parts).await?;
        Ok(UploadOutput {
            etag: done.etag,
            size,
            upload_id: Some(session.upload_id),
            parts,
            reused_parts: reused,
        })
    }
}

/// Reuses the newest incomplete upload of the key or starts a new one, and
/// loads its committed parts.
pub(crate) async fn open_session(
    client: &Client,
    bucket: &str,
    key: &str,
    headers: HeaderMap,
    total_size: Option<u64>,
    part_size: u64,
) -> Result<UploadSession> {
    let (upload_id, parts) = match find_upload_id(client, bucket, key).await? {
        Some(upload_id) => {
            let parts = list_parts(client, bucket, key, &upload_id).await?;
            #[cfg(feature = "tracing")]
            tracing::debug!(%upload_id, committed = parts.len(), "resuming multipart upload");
            (upload_id, parts)
        }
        None => {
            let out = initiate_upload(client, bucket, key, headers).await?;
            #[cfg(feature = "tracing")]
            tracing::debug!(upload_id = %out.upload_id, "initiated multipart upload");
            (out.upload_id, Vec::new())
        }
    };

    Ok(UploadSession {
        upload_id,
        bucket: bucket.to_string(),
        key: key.to_string(),
        total_size,
        part_size,
        parts: parts.into_iter().map(|p| (p.number, p)).collect::<BTreeMap<_, _>>(),
    })
}

/// Committed parts must line up with the ranges planned for this source.
fn check_committed_parts(session: &UploadSession, ranges: &[PartRange]) -> Result<()> {
    for part in session.parts.values() {
        let Some(range) = ranges.iter().find(|r| r.number == part.number) else {
            return Err(Error::consistency(format!(
                "upload {} has part {} but the source only spans {} parts",
                session.upload_id,
                part.number,
                ranges.len()
            )));
        };
        if part.size != range.len {
            return Err(Error::consistency(format!(
                "upload {} part {} is {} bytes, expected {}",
                session.upload_id, part.number, part.size, range.len
            )));
        }
    }
    Ok(())
}

async fn digest_range(
    source: &dyn UploadSource,
    offset: u64,
    len: u64,
    kind: ChecksumKind,
) -> Result<ChecksumSummary> {
    let stream = source.read_range(offset, len).await?;
    let (summary, seen) = StreamingHasher::digest_stream(kind, stream).await?;
    if seen != len {
        return Err(Error::consistency(format!(
            "source yielded {seen} bytes for the {len} byte range at offset {offset}"
        )));
    }
    Ok(summary)
}

async fn range_payload(
    source: &dyn UploadSource,
    offset: u64,
    len: u64,
    checksum: ChecksumSummary,
) -> Result<Payload> {
    let stream = source.read_range(offset, len).await?;
    let body: BodyStream = Box::pin(stream.map(|chunk| chunk.map_err(io::Error::other)));
    Ok(Payload::Stream {
        body,
        length: len,
        checksum,
    })
}

pub(crate) async fn initiate_upload(
    client: &Client,
    bucket: &str,
    key: &str,
    headers: HeaderMap,
) -> Result<InitiateMultipartUploadOutput> {
    let resp = client
        .dispatch(
            RequestSpec::new(Method::POST)
                .object(bucket, key)
                .query("uploads", "")
                .headers(headers),
            Payload::Empty,
            StatusCode::OK,
        )
        .await?;
    let body = resp.text().await?;
    util::xml::parse_initiate_multipart_upload(&body)
}

/// The per-part primitive used by file and stream uploads alike.
pub(crate) async fn send_part(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    part_number: u32,
    size: u64,
    payload: Payload,
) -> Result<PartRecord> {
    let (_, headers) = client
        .dispatch_drained(
            RequestSpec::new(Method::PUT)
                .object(bucket, key)
                .query("partNumber", part_number.to_string())
                .query("uploadId", upload_id),
            payload,
            StatusCode::OK,
        )
        .await?;
    let etag = util::headers::etag(&headers).ok_or_else(|| {
        Error::consistency(format!("upload of part {part_number} returned no etag"))
    })?;

    #[cfg(feature = "tracing")]
    tracing::debug!(part = part_number, size, "uploaded part");
    Ok(PartRecord {
        number: part_number,
        etag,
        size,
    })
}

pub(crate) async fn complete_upload(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    parts: &[PartRecord],
) -> Result<CompleteMultipartUploadOutput> {
    let body = util::xml::encode_complete_multipart_upload(parts)?;
    let resp = client
        .dispatch(
            RequestSpec::new(Method::POST)
                .object(bucket, key)
                .query("uploadId", upload_id),
            Payload::Bytes(body),
            StatusCode::OK,
        )
        .await?;
    let text = resp.text().await?;
    let out = util::xml::parse_complete_multipart_upload(&text)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(upload_id, parts = parts.len(), "completed multipart upload");
    Ok(out)
}

pub(crate) async fn list_parts(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
) -> Result<Vec<PartRecord>> {
    let mut parts = Vec::new();
    let mut marker: Option<u32> = None;
    loop {
        let mut spec = RequestSpec::new(Method::GET)
            .object(bucket, key)
            .query("uploadId", upload_id);
        if let Some(marker) = marker {
            spec = spec.query("part-number-marker", marker.to_string());
        }
        let body = client.dispatch(spec, Payload::Empty, StatusCode::OK).await?.text().await?;
        let page = util::xml::parse_list_parts(&body)?;
        parts.extend(page.parts);

        match page.next_part_number_marker {
            Some(next) if page.is_truncated && Some(next) != marker => marker = Some(next),
            _ => break,
        }
    }
    Ok(parts)
}

pub(crate) async fn find_upload_id(client: &Client, bucket: &str, key: &str) -> Result<Option<String>> {
    let mut pager = ListIncompleteUploadsRequest {
        client: client.clone(),
        bucket: bucket.to_string(),
        prefix: Some(key.to_string()),
        recursive: true,
        include_size: false,
    }
    .pager();

    let mut latest: Option<IncompleteUpload> = None;
    while let Some(page) = pager.next_page().await? {
        for upload in page.uploads.into_iter().filter(|u| u.key == key) {
            let newer = match &latest {
                None => true,
                Some(current) => upload.initiated >= current.initiated,
            };
            if newer {
                latest = Some(upload);
            }
        }
    }
    Ok(latest.map(|u| u.upload_id))
}

pub struct InitiateUploadRequest {
    client: Client,
    bucket: String,
    key: String,
    content_type: Option<String>,
    metadata: Vec<(String, String)>,
}

impl InitiateUploadRequest {
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub async fn send(self) -> Result<InitiateMultipartUploadOutput> {
        let headers = object_headers(self.content_type.as_deref(), &self.metadata)?;
        initiate_upload(&self.client, &self.bucket, &self.key, headers).await
    }
}

pub struct UploadPartRequest {
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
    part_number: u32,
    body: Bytes,
}

impl UploadPartRequest {
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub async fn send(self) -> Result<PartRecord> {
        if !(1..=util::part::MAX_PART_COUNT).contains(&u64::from(self.part_number)) {
            return Err(Error::validation(format!(
                "part number must be between 1 and {}",
                util::part::MAX_PART_COUNT
            )));
        }
        let size = self.body.len() as u64;
        send_part(
            &self.client,
            &self.bucket,
            &self.key,
            &self.upload_id,
            self.part_number,
            size,
            Payload::Bytes(self.body),
        )
        .await
    }
}

pub struct CompleteUploadRequest {
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
    parts: Vec<PartRecord>,
}

impl CompleteUploadRequest {
    pub fn part(mut self, part: PartRecord) -> Self {
        self.parts.push(part);
        self
    }

    pub fn parts<I>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = PartRecord>,
    {
        self.parts.extend(iter);
        self
    }

    pub async fn send(mut self) -> Result<CompleteMultipartUploadOutput> {
        self.parts.sort_by_key(|p| p.number);
        complete_upload(&self.client, &self.bucket, &self.key, &self.upload_id, &self.parts).await
    }
}

pub struct AbortUploadRequest {
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
}

impl AbortUploadRequest {
    pub async fn send(self) -> Result<()> {
        self.client
            .dispatch_drained(
                RequestSpec::new(Method::DELETE)
                    .object(&self.bucket, &self.key)
                    .query("uploadId", self.upload_id.as_str()),
                Payload::Empty,
                StatusCode::NO_CONTENT,
            )
            .await?;
        #[cfg(feature = "tracing")]
        tracing::debug!(upload_id = %self.upload_id, "aborted multipart upload");
        Ok(())
    }
}

pub struct ListIncompleteUploadsRequest {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    recursive: bool,
    include_size: bool,
}

impl ListIncompleteUploadsRequest {
    pub fn prefix(mut self, value: impl Into<String>) -> Self {
        self.prefix = Some(value.into());
        self
    }

    /// When `false`, keys below the next `/` are grouped into prefixes.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Fills [`IncompleteUpload::size`] with the summed size of the
    /// committed parts, at the cost of one listing per upload. On by default.
    pub fn include_size(mut self, include_size: bool) -> Self {
        self.include_size = include_size;
        self
    }

    pub fn pager(self) -> IncompleteUploadsPager {
        IncompleteUploadsPager {
            request: self,
            key_marker: None,
            upload_id_marker: None,
            done: false,
        }
    }
}

pub struct IncompleteUploadsPager {
    request: ListIncompleteUploadsRequest,
    key_marker: Option<String>,
    upload_id_marker: Option<String>,
    done: bool,
}

impl IncompleteUploadsPager {
    pub async fn next_page(&mut self) -> Result<Option<ListMultipartUploadsOutput>> {
        if self.done {
            return Ok(None);
        }
        let req = &self.request;
        if let Some(prefix) = &req.prefix {
            util::validate::prefix(prefix)?;
        }

        let mut spec = RequestSpec::new(Method::GET)
            .bucket(&req.bucket)
            .query("uploads", "")
            .query("max-uploads", MAX_UPLOADS_PER_PAGE.to_string())
            .query("prefix", req.prefix.clone().unwrap_or_default());
        if !req.recursive {
            spec = spec.query("delimiter", "/");
        }
        if let Some(marker) = &self.key_marker {
            spec = spec.query("key-marker", marker.as_str());
        }
        if let Some(marker) = &self.upload_id_marker {
            spec = spec.query("upload-id-marker", marker.as_str());
        }

        let body = req
            .client
            .dispatch(spec, Payload::Empty, StatusCode::OK)
            .await?
            .text()
            .await?;
        let mut page = util::xml::parse_list_multipart_uploads(&body)?;

        if req.include_size {
            for upload in &mut page.uploads {
                let parts = list_parts(&req.client, &req.bucket, &upload.key, &upload.upload_id).await?;
                upload.size = parts.iter().map(|p| p.size).sum();
            }
        }

        self.key_marker = page.next_key_marker.clone();
        self.upload_id_marker = page.next_upload_id_marker.clone();
        if !page.is_truncated || (self.key_marker.is_none() && self.upload_id_marker.is_none()) {
            self.done = true;
        }
        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(parts: &[(u32, u64)]) -> UploadSession {
        UploadSession {
            upload_id: "u1".to_string(),
            bucket: "bucket".to_string(),
            key: "key".to_string(),
            total_size: Some(12),
            part_size: 5,
            parts: parts
                .iter()
                .map(|&(number, size)| {
                    (
                        number,
                        PartRecord {
                            number,
                            etag: "e".to_string(),
                            size,
                        },
                    )
                })
                .collect(),
        }
    }

    fn ranges() -> Vec<PartRange> {
        vec![
            PartRange { number: 1, offset: 0, len: 5 },
            PartRange { number: 2, offset: 5, len: 5 },
            PartRange { number: 3, offset: 10, len: 2 },
        ]
    }

    #[test]
    fn committed_parts_matching_plan_are_accepted() {
        assert!(check_committed_parts(&session_with(&[(1, 5), (3, 2)]), &ranges()).is_ok());
    }

    #[test]
    fn committed_part_beyond_plan_is_inconsistent() {
        let err = check_committed_parts(&session_with(&[(4, 5)]), &ranges()).unwrap_err();
        assert!(matches!(err, Error::Consistency { .. }));
    }

    #[test]
    fn committed_part_with_wrong_size_is_inconsistent() {
        let err = check_committed_parts(&session_with(&[(2, 4)]), &ranges()).unwrap_err();
        assert!(matches!(err, Error::Consistency { .. }));
    }

    #[tokio::test]
    async fn bytes_source_reads_ranges() {
        let source = BytesSource::new(&b"hello world"[..]);
        let summary = digest_range(&source, 6, 5, ChecksumKind::Md5).await.unwrap();
        assert_eq!(
            summary,
            StreamingHasher::digest(ChecksumKind::Md5, b"world")
        );
    }

    #[tokio::test]
    async fn short_range_is_inconsistent() {
        let source = BytesSource::new(&b"abc"[..]);
        let err = digest_range(&source, 0, 10, ChecksumKind::Md5).await.unwrap_err();
        assert!(matches!(err, Error::Consistency { .. }));
    }

    #[tokio::test]
    async fn file_source_reads_ranges() {
        use std::io::Write as _;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        let source = FileSource::open(file.path()).await.unwrap();
        assert_eq!(source.size(), 10);

        let summary = digest_range(&source, 3, 4, ChecksumKind::Sha256).await.unwrap();
        assert_eq!(summary, StreamingHasher::digest(ChecksumKind::Sha256, b"3456"));
    }
}
