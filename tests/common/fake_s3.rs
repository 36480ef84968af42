//! Minimal in-memory S3 for driving transfers end to end.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use sha2::{Digest as _, Sha256};

use s3_transfer::{ChecksumKind, Error, HttpRequest, HttpResponse, StreamingHasher, Transport};

/// A request as the fake server saw it.
#[derive(Clone, Debug)]
pub(crate) struct Seen {
    pub(crate) method: Method,
    pub(crate) bucket: String,
    pub(crate) key: Option<String>,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) body_len: usize,
}

impl Seen {
    pub(crate) fn has_query(&self, name: &str) -> bool {
        self.query.iter().any(|(k, _)| k == name)
    }

    pub(crate) fn is_part_upload(&self) -> bool {
        self.method == Method::PUT && self.has_query("partNumber")
    }
}

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    content_type: Option<String>,
}

struct Upload {
    id: String,
    bucket: String,
    key: String,
    initiated: u32,
    content_type: Option<String>,
    parts: BTreeMap<u32, Bytes>,
}

#[derive(Default)]
struct State {
    objects: HashMap<(String, String), StoredObject>,
    uploads: Vec<Upload>,
    next_id: u32,
    clock: u32,
    fail_part_once: Option<u32>,
    parts_page_size: Option<usize>,
    log: Vec<Seen>,
}

#[derive(Default)]
pub(crate) struct FakeS3 {
    state: Mutex<State>,
}

impl FakeS3 {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next upload of `part_number` answers 500.
    pub(crate) fn fail_part_once(&self, part_number: u32) {
        self.state.lock().unwrap().fail_part_once = Some(part_number);
    }

    /// Caps list-parts pages so paging gets exercised.
    pub(crate) fn paginate_parts(&self, page_size: usize) {
        self.state.lock().unwrap().parts_page_size = Some(page_size);
    }

    pub(crate) fn put_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let data = data.into();
        let etag = md5_hex(&data);
        self.state.lock().unwrap().objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                etag,
                content_type: None,
            },
        );
    }

    pub(crate) fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    pub(crate) fn object_content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|o| o.content_type.clone())
    }

    /// Upload ids of incomplete uploads, oldest first.
    pub(crate) fn incomplete_uploads(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .uploads
            .iter()
            .map(|u| u.id.clone())
            .collect()
    }

    pub(crate) fn committed_parts(&self, upload_id: &str) -> Vec<u32> {
        self.state
            .lock()
            .unwrap()
            .uploads
            .iter()
            .find(|u| u.id == upload_id)
            .map(|u| u.parts.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Commits a part directly, as an earlier run would have.
    pub(crate) fn commit_part(&self, upload_id: &str, number: u32, data: impl Into<Bytes>) {
        let mut state = self.state.lock().unwrap();
        if let Some(upload) = state.uploads.iter_mut().find(|u| u.id == upload_id) {
            upload.parts.insert(number, data.into());
        }
    }

    /// Starts an upload directly, as an earlier run would have.
    pub(crate) fn start_upload(&self, bucket: &str, key: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.initiate(bucket, key, None)
    }

    pub(crate) fn seen(&self) -> Vec<Seen> {
        self.state.lock().unwrap().log.clone()
    }

    pub(crate) fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }
}

impl State {
    fn initiate(&mut self, bucket: &str, key: &str, content_type: Option<String>) -> String {
        self.next_id += 1;
        self.clock += 1;
        let id = format!("upload-{}", self.next_id);
        self.uploads.push(Upload {
            id: id.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            initiated: self.clock,
            content_type,
            parts: BTreeMap::new(),
        });
        id
    }
}

#[async_trait]
impl Transport for FakeS3 {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let body = body.collect().await?;

        let path = url.path().trim_start_matches('/').to_string();
        let (bucket, key) = match path.split_once('/') {
            Some((bucket, key)) if !key.is_empty() => (bucket.to_string(), Some(key.to_string())),
            Some((bucket, _)) => (bucket.to_string(), None),
            None => (path.clone(), None),
        };
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut state = self.state.lock().unwrap();
        state.log.push(Seen {
            method: method.clone(),
            bucket: bucket.clone(),
            key: key.clone(),
            query: query.clone(),
            headers: headers.clone(),
            body_len: body.len(),
        });

        if let Some(err) = verify_payload(&headers, &body) {
            return Ok(err);
        }

        let param = |name: &str| {
            query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let response = match (method.clone(), key) {
            (Method::GET, None) if param("location").is_some() => xml(
                StatusCode::OK,
                "<LocationConstraint xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\"/>".to_string(),
            ),
            (Method::GET, None) if param("uploads").is_some() => {
                let prefix = param("prefix").unwrap_or_default();
                let mut out = String::from("<ListMultipartUploadsResult><IsTruncated>false</IsTruncated>");
                for upload in state
                    .uploads
                    .iter()
                    .filter(|u| u.bucket == bucket && u.key.starts_with(&prefix))
                {
                    out.push_str(&format!(
                        "<Upload><Key>{}</Key><UploadId>{}</UploadId>\
                         <Initiated>2024-01-01T00:00:{:02}.000Z</Initiated></Upload>",
                        upload.key, upload.id, upload.initiated
                    ));
                }
                out.push_str("</ListMultipartUploadsResult>");
                xml(StatusCode::OK, out)
            }
            (Method::GET, None) if param("list-type").as_deref() == Some("2") => {
                list_objects_v2(&state, &bucket, &param)
            }
            (Method::POST, Some(key)) if param("uploads").is_some() => {
                let id = state.initiate(&bucket, &key, content_type);
                xml(
                    StatusCode::OK,
                    format!(
                        "<InitiateMultipartUploadResult><Bucket>{bucket}</Bucket><Key>{key}</Key>\
                         <UploadId>{id}</UploadId></InitiateMultipartUploadResult>"
                    ),
                )
            }
            (Method::PUT, Some(_)) if param("partNumber").is_some() => {
                let number: u32 = param("partNumber").unwrap().parse().unwrap();
                let id = param("uploadId").unwrap_or_default();
                if state.fail_part_once == Some(number) {
                    state.fail_part_once = None;
                    error(StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
                } else if let Some(upload) = state.uploads.iter_mut().find(|u| u.id == id) {
                    let etag = md5_hex(&body);
                    upload.parts.insert(number, body.clone());
                    with_etag(StatusCode::OK, &etag)
                } else {
                    error(StatusCode::NOT_FOUND, "NoSuchUpload")
                }
            }
            (Method::GET, Some(_)) if param("uploadId").is_some() => {
                let id = param("uploadId").unwrap_or_default();
                let marker: u32 = param("part-number-marker")
                    .map(|m| m.parse().unwrap())
                    .unwrap_or(0);
                let page_size = state.parts_page_size.unwrap_or(usize::MAX);
                match state.uploads.iter().find(|u| u.id == id) {
                    Some(upload) => {
                        let remaining: Vec<_> = upload.parts.range(marker + 1..).collect();
                        let page = &remaining[..remaining.len().min(page_size)];
                        let truncated = remaining.len() > page.len();
                        let mut out = format!(
                            "<ListPartsResult><IsTruncated>{truncated}</IsTruncated>"
                        );
                        if let Some((last, _)) = page.last() {
                            out.push_str(&format!(
                                "<NextPartNumberMarker>{last}</NextPartNumberMarker>"
                            ));
                        }
                        for (number, data) in page {
                            out.push_str(&format!(
                                "<Part><PartNumber>{number}</PartNumber><ETag>\"{}\"</ETag>\
                                 <Size>{}</Size></Part>",
                                md5_hex(data),
                                data.len()
                            ));
                        }
                        out.push_str("</ListPartsResult>");
                        xml(StatusCode::OK, out)
                    }
                    None => error(StatusCode::NOT_FOUND, "NoSuchUpload"),
                }
            }
            (Method::POST, Some(key)) if param("uploadId").is_some() => {
                let id = param("uploadId").unwrap_or_default();
                let listed = listed_part_numbers(&body);
                match state.uploads.iter().position(|u| u.id == id) {
                    Some(idx) if listed.iter().all(|n| state.uploads[idx].parts.contains_key(n)) => {
                        let upload = state.uploads.remove(idx);
                        let mut data = Vec::new();
                        for n in &listed {
                            data.extend_from_slice(&upload.parts[n]);
                        }
                        let etag = format!("{}-{}", md5_hex(&data), listed.len());
                        state.objects.insert(
                            (bucket.clone(), key.clone()),
                            StoredObject {
                                data: Bytes::from(data),
                                etag: etag.clone(),
                                content_type: upload.content_type,
                            },
                        );
                        xml(
                            StatusCode::OK,
                            format!(
                                "<CompleteMultipartUploadResult><Bucket>{bucket}</Bucket>\
                                 <Key>{key}</Key><ETag>\"{etag}\"</ETag></CompleteMultipartUploadResult>"
                            ),
                        )
                    }
                    Some(_) => xml(
                        StatusCode::OK,
                        "<Error><Code>InvalidPart</Code><Message>missing part</Message></Error>"
                            .to_string(),
                    ),
                    None => error(StatusCode::NOT_FOUND, "NoSuchUpload"),
                }
            }
            (Method::DELETE, Some(_)) if param("uploadId").is_some() => {
                let id = param("uploadId").unwrap_or_default();
                state.uploads.retain(|u| u.id != id);
                HttpResponse::from_bytes(StatusCode::NO_CONTENT, HeaderMap::new(), Bytes::new())
            }
            (Method::PUT, Some(key)) if headers.contains_key("x-amz-copy-source") => {
                copy_object(&mut state, &bucket, key, &headers, content_type)
            }
            (Method::PUT, Some(key)) => {
                let etag = md5_hex(&body);
                state.objects.insert(
                    (bucket.clone(), key),
                    StoredObject {
                        data: body.clone(),
                        etag: etag.clone(),
                        content_type,
                    },
                );
                with_etag(StatusCode::OK, &etag)
            }
            (Method::GET, Some(key)) | (Method::HEAD, Some(key)) => {
                match state.objects.get(&(bucket.clone(), key)).cloned() {
                    Some(object) => read_object(&method, &headers, &object),
                    None if method == Method::HEAD => HttpResponse::from_bytes(
                        StatusCode::NOT_FOUND,
                        HeaderMap::new(),
                        Bytes::new(),
                    ),
                    None => error(StatusCode::NOT_FOUND, "NoSuchKey"),
                }
            }
            (Method::DELETE, Some(key)) => {
                state.objects.remove(&(bucket.clone(), key));
                HttpResponse::from_bytes(StatusCode::NO_CONTENT, HeaderMap::new(), Bytes::new())
            }
            _ => error(StatusCode::NOT_IMPLEMENTED, "NotImplemented"),
        };
        Ok(response)
    }
}

/// Keys are returned in order; the continuation token is the last key sent.
fn list_objects_v2(
    state: &State,
    bucket: &str,
    param: &dyn Fn(&str) -> Option<String>,
) -> HttpResponse {
    let prefix = param("prefix").unwrap_or_default();
    let delimiter = param("delimiter").filter(|d| !d.is_empty());
    let max_keys: usize = param("max-keys").map(|m| m.parse().unwrap()).unwrap_or(1000);
    let after = param("continuation-token").or_else(|| param("start-after"));

    let mut keys: Vec<&String> = state
        .objects
        .keys()
        .filter(|(b, k)| b == bucket && k.starts_with(&prefix))
        .map(|(_, k)| k)
        .filter(|k| after.as_ref().is_none_or(|a| k.as_str() > a.as_str()))
        .filter(|k| match (&after, &delimiter) {
            (Some(a), Some(d)) if a.ends_with(d.as_str()) => !k.starts_with(a.as_str()),
            _ => true,
        })
        .collect();
    keys.sort();

    // Entries are either keys or common prefixes, each counting once.
    let mut entries: Vec<(String, bool)> = Vec::new();
    for key in keys {
        let rest = &key[prefix.len()..];
        match delimiter.as_deref().and_then(|d| rest.find(d).map(|i| i + d.len())) {
            Some(end) => {
                let common = format!("{prefix}{}", &rest[..end]);
                if entries.last().map(|(e, _)| e) != Some(&common) {
                    entries.push((common, true));
                }
            }
            None => entries.push((key.clone(), false)),
        }
    }
    let truncated = entries.len() > max_keys;
    entries.truncate(max_keys);

    let mut out = format!("<ListBucketResult><Name>{bucket}</Name><IsTruncated>{truncated}</IsTruncated>");
    if truncated && let Some((last, _)) = entries.last() {
        out.push_str(&format!("<NextContinuationToken>{last}</NextContinuationToken>"));
    }
    for (entry, is_prefix) in &entries {
        if *is_prefix {
            out.push_str(&format!("<CommonPrefixes><Prefix>{entry}</Prefix></CommonPrefixes>"));
        } else {
            let object = &state.objects[&(bucket.to_string(), entry.clone())];
            out.push_str(&format!(
                "<Contents><Key>{entry}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified>\
                 <ETag>\"{}\"</ETag><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
                object.etag,
                object.data.len()
            ));
        }
    }
    out.push_str("</ListBucketResult>");
    xml(StatusCode::OK, out)
}

fn copy_object(
    state: &mut State,
    bucket: &str,
    key: String,
    headers: &HeaderMap,
    content_type: Option<String>,
) -> HttpResponse {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let source = header("x-amz-copy-source").unwrap_or_default();
    let Some((src_bucket, src_key)) = source.trim_start_matches('/').split_once('/') else {
        return error(StatusCode::BAD_REQUEST, "InvalidArgument");
    };
    let Some(object) = state
        .objects
        .get(&(src_bucket.to_string(), src_key.to_string()))
        .cloned()
    else {
        return error(StatusCode::NOT_FOUND, "NoSuchKey");
    };

    let matches = header("x-amz-copy-source-if-match").is_none_or(|e| e.trim_matches('"') == object.etag);
    let differs = header("x-amz-copy-source-if-none-match").is_none_or(|e| e.trim_matches('"') != object.etag);
    if !matches || !differs {
        return error(StatusCode::PRECONDITION_FAILED, "PreconditionFailed");
    }

    let replace = header("x-amz-metadata-directive").as_deref() == Some("REPLACE");
    let copied = StoredObject {
        content_type: if replace { content_type } else { object.content_type.clone() },
        ..object
    };
    let etag = copied.etag.clone();
    state.objects.insert((bucket.to_string(), key), copied);
    xml(
        StatusCode::OK,
        format!(
            "<CopyObjectResult><LastModified>2024-01-01T00:00:00.000Z</LastModified>\
             <ETag>\"{etag}\"</ETag></CopyObjectResult>"
        ),
    )
}

fn read_object(method: &Method, headers: &HeaderMap, object: &StoredObject) -> HttpResponse {
    let total = object.data.len();
    let range = headers
        .get(http::header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .map(|spec| {
            let (start, end) = spec.split_once('-').unwrap();
            let start: usize = start.parse().unwrap();
            let end: usize = if end.is_empty() {
                total - 1
            } else {
                end.parse::<usize>().unwrap().min(total - 1)
            };
            (start, end)
        });

    let (status, body) = match range {
        Some((start, _)) if start >= total => {
            return error(StatusCode::RANGE_NOT_SATISFIABLE, "InvalidRange");
        }
        Some((start, end)) => (StatusCode::PARTIAL_CONTENT, object.data.slice(start..=end)),
        None => (StatusCode::OK, object.data.clone()),
    };

    let mut out = HeaderMap::new();
    out.insert(http::header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    out.insert(
        http::header::ETAG,
        HeaderValue::from_str(&format!("\"{}\"", object.etag)).unwrap(),
    );
    if let Some(ct) = &object.content_type {
        out.insert(http::header::CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
    }
    if let Some((start, end)) = range {
        out.insert(
            http::header::CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {start}-{end}/{total}")).unwrap(),
        );
    }
    let body = if *method == Method::HEAD { Bytes::new() } else { body };
    HttpResponse::from_bytes(status, out, body)
}

/// Rejects bodies whose signed hash or `Content-MD5` does not match.
fn verify_payload(headers: &HeaderMap, body: &Bytes) -> Option<HttpResponse> {
    if let Some(hash) = headers
        .get("x-amz-content-sha256")
        .and_then(|v| v.to_str().ok())
        && hash != "UNSIGNED-PAYLOAD"
        && hash != hex::encode(Sha256::digest(body))
    {
        return Some(error(StatusCode::BAD_REQUEST, "XAmzContentSHA256Mismatch"));
    }
    if let Some(md5) = headers.get("content-md5").and_then(|v| v.to_str().ok()) {
        let actual = StreamingHasher::digest(ChecksumKind::Md5, body).md5.unwrap();
        if md5 != actual {
            return Some(error(StatusCode::BAD_REQUEST, "BadDigest"));
        }
    }
    if let Some(len) = headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        && len != body.len()
    {
        return Some(error(StatusCode::BAD_REQUEST, "IncompleteBody"));
    }
    None
}

fn listed_part_numbers(body: &[u8]) -> Vec<u32> {
    let text = String::from_utf8_lossy(body);
    text.split("<PartNumber>")
        .skip(1)
        .filter_map(|rest| rest.split("</PartNumber>").next()?.parse().ok())
        .collect()
}

pub(crate) fn md5_hex(data: &[u8]) -> String {
    StreamingHasher::digest(ChecksumKind::Md5, data)
        .md5_hex()
        .unwrap()
}

fn xml(status: StatusCode, body: String) -> HttpResponse {
    let mut headers = HeaderMap::new();
    headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/xml"));
    HttpResponse::from_bytes(status, headers, body)
}

fn with_etag(status: StatusCode, etag: &str) -> HttpResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::ETAG,
        HeaderValue::from_str(&format!("\"{etag}\"")).unwrap(),
    );
    HttpResponse::from_bytes(status, headers, Bytes::new())
}

fn error(status: StatusCode, code: &str) -> HttpResponse {
    xml(
        status,
        format!("<Error><Code>{code}</Code><Message>{code}</Message><RequestId>fake</RequestId></Error>"),
    )
}

