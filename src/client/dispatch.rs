use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use time::OffsetDateTime;

use crate::{
    auth::{AddressingStyle, Region},
    client::{Client, async_client::PayloadMode},
    error::{Error, Result},
    region,
    transport::{BodyStream, HttpRequest, HttpResponse, RequestBody},
    types::{ChecksumSummary, PresignedRequest},
    util::{
        self,
        hash::{ChecksumKind, StreamingHasher},
        signing::{SigningScope, UNSIGNED_PAYLOAD},
        url::ResolvedUrl,
    },
};

const ERROR_SNIPPET_LIMIT: usize = 4096;

/// One service call before addressing and signing.
pub(crate) struct RequestSpec<'a> {
    method: Method,
    bucket: Option<&'a str>,
    key: Option<&'a str>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    region: Option<Region>,
    path_style: bool,
}

impl<'a> RequestSpec<'a> {
    pub(crate) fn new(method: Method) -> Self {
        Self {
            method,
            bucket: None,
            key: None,
            query: Vec::new(),
            headers: HeaderMap::new(),
            region: None,
            path_style: false,
        }
    }

    pub(crate) fn bucket(mut self, bucket: &'a str) -> Self {
        self.bucket = Some(bucket);
        self
    }

    pub(crate) fn object(mut self, bucket: &'a str, key: &'a str) -> Self {
        self.bucket = Some(bucket);
        self.key = Some(key);
        self
    }

    pub(crate) fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub(crate) fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub(crate) fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Signs for `region` instead of the bucket's resolved one.
    pub(crate) fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub(crate) fn path_style(mut self) -> Self {
        self.path_style = true;
        self
    }
}

/// Request body together with whatever digest the signing mode needs.
pub(crate) enum Payload {
    Empty,
    Bytes(Bytes),
    /// A piped body; `checksum` must carry the digest of the client's
    /// [`PayloadMode`].
    Stream {
        body: BodyStream,
        length: u64,
        checksum: ChecksumSummary,
    },
}

impl Client {
    /// Sends `spec` and returns the live response when its status is
    /// `expected`.
    pub(crate) async fn dispatch(
        &self,
        spec: RequestSpec<'_>,
        payload: Payload,
        expected: StatusCode,
    ) -> Result<HttpResponse> {
        if let Some(bucket) = spec.bucket {
            util::validate::bucket_name(bucket)?;
        }
        if let Some(key) = spec.key {
            util::validate::object_name(key)?;
        }

        #[cfg(feature = "tracing")]
        let span = tracing::info_span!(
            "s3.request",
            method = %spec.method,
            bucket = spec.bucket.unwrap_or(""),
            key = spec.key.unwrap_or(""),
            host = self.inner().endpoint.host_str().unwrap_or(""),
        );

        let fut = async {
            let region = self.request_region(&spec).await?;
            self.exchange(spec, payload, expected, &region).await
        };
        #[cfg(feature = "tracing")]
        let fut = tracing::Instrument::instrument(fut, span);
        fut.await
    }

    /// Like [`Client::dispatch`] but reads the body to its end, so the pooled
    /// connection is released, and returns only the response head.
    pub(crate) async fn dispatch_drained(
        &self,
        spec: RequestSpec<'_>,
        payload: Payload,
        expected: StatusCode,
    ) -> Result<(StatusCode, HeaderMap)> {
        self.dispatch(spec, payload, expected).await?.drain().await
    }

    /// Addresses, signs for `region` and sends one request. Does not consult
    /// the region resolver, so the resolver itself can call it.
    pub(crate) async fn exchange(
        &self,
        spec: RequestSpec<'_>,
        payload: Payload,
        expected: StatusCode,
        region: &Region,
    ) -> Result<HttpResponse> {
        let inner = self.inner();
        let RequestSpec {
            method,
            bucket,
            key,
            query,
            mut headers,
            path_style,
            ..
        } = spec;

        let style = if path_style {
            AddressingStyle::Path
        } else {
            inner.addressing
        };
        let resolved = util::url::resolve_url(
            &inner.endpoint,
            bucket,
            key,
            &query,
            style,
            region.as_str(),
        )?;

        headers.insert(http::header::USER_AGENT, inner.user_agent.clone());
        let body = self.prepare_body(&method, &resolved, &mut headers, payload, region)?;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            headers = %util::redact::loggable_headers(&headers),
            "sending request"
        );

        let request = HttpRequest {
            method,
            url: resolved.url,
            headers,
            body,
        };

        let response = match inner.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                if let Some(bucket) = bucket {
                    inner.regions.invalidate(bucket);
                }
                return Err(err);
            }
        };

        if response.status == expected {
            return Ok(response);
        }

        if let Some(bucket) = bucket {
            inner.regions.invalidate(bucket);
        }
        Err(response_error(response).await)
    }

    /// Builds a query-authenticated URL for one object.
    pub(crate) async fn presign(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        expires_in: Duration,
        query: Vec<(String, String)>,
        headers: HeaderMap,
    ) -> Result<PresignedRequest> {
        util::validate::bucket_name(bucket)?;
        util::validate::object_name(key)?;
        let credentials = self
            .inner()
            .auth
            .credentials()
            .ok_or_else(|| Error::validation("presigned requests require credentials"))?;

        let region = self.bucket_region(bucket).await?;
        let resolved = util::url::resolve_url(
            &self.inner().endpoint,
            Some(bucket),
            Some(key),
            &[],
            self.inner().addressing,
            region.as_str(),
        )?;

        let scope = SigningScope::new(credentials, &region, OffsetDateTime::now_utc());
        util::signing::presign_url(scope, method, resolved, expires_in, &query, &headers)
    }

    /// Region the signature of `bucket`'s requests is scoped to.
    ///
    /// A statically configured region wins; otherwise the bucket location is
    /// looked up once and cached for the lifetime of the client.
    pub async fn bucket_region(&self, bucket: &str) -> Result<Region> {
        util::validate::bucket_name(bucket)?;
        region::resolve(self, bucket).await
    }

    async fn request_region(&self, spec: &RequestSpec<'_>) -> Result<Region> {
        if let Some(region) = &spec.region {
            return Ok(region.clone());
        }
        match spec.bucket {
            Some(bucket) => region::resolve(self, bucket).await,
            None => Ok(self.default_region()),
        }
    }

    fn prepare_body(
        &self,
        method: &Method,
        resolved: &ResolvedUrl,
        headers: &mut HeaderMap,
        payload: Payload,
        region: &Region,
    ) -> Result<RequestBody> {
        let mode = self.payload_mode();

        let (body, summary) = match payload {
            Payload::Empty => (RequestBody::Empty, None),
            Payload::Bytes(bytes) if bytes.is_empty() => (RequestBody::Empty, None),
            Payload::Bytes(bytes) => {
                let summary = StreamingHasher::digest(mode.checksum_kind(), &bytes);
                (RequestBody::Bytes(bytes), Some(summary))
            }
            Payload::Stream {
                body,
                length,
                checksum,
            } => (
                RequestBody::Stream {
                    stream: body,
                    length,
                },
                Some(checksum),
            ),
        };

        if !body.is_empty() || matches!(*method, Method::PUT | Method::POST) {
            headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        if mode != PayloadMode::Sha256
            && let Some(md5) = summary.as_ref().and_then(|s| s.md5.as_deref())
        {
            util::headers::insert(headers, HeaderName::from_static("content-md5"), md5)?;
        }

        let Some(credentials) = self.inner().auth.credentials() else {
            return Ok(body);
        };

        let payload_hash = match mode {
            PayloadMode::Sha256 => match summary {
                None => util::hash::sha256_hex(&[]),
                Some(ChecksumSummary {
                    sha256: Some(sha256),
                    ..
                }) => sha256,
                Some(_) => {
                    return Err(Error::signing(format!(
                        "payload digest must be {:?} for signed payloads",
                        ChecksumKind::Sha256
                    )));
                }
            },
            PayloadMode::Anonymous | PayloadMode::UnsignedWithMd5 => UNSIGNED_PAYLOAD.to_string(),
        };

        let scope = SigningScope::new(credentials, region, OffsetDateTime::now_utc());
        util::signing::sign_request(scope, method, resolved, headers, &payload_hash)?;
        Ok(body)
    }
}

/// Turns an unexpected response into [`Error::Protocol`].
async fn response_error(response: HttpResponse) -> Error {
    let status = response.status;
    let headers = response.headers.clone();
    let header_request_id = util::headers::header_string(&headers, "x-amz-request-id");
    let header_host_id = util::headers::header_string(&headers, "x-amz-id-2");
    let header_region = util::headers::header_string(&headers, "x-amz-bucket-region");

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => return err,
    };
    let parsed = util::xml::parse_error(&body).unwrap_or_default();

    Error::Protocol {
        status,
        code: parsed
            .code
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| status_code_name(status).to_string()),
        message: parsed.message,
        request_id: parsed.request_id.or(header_request_id),
        host_id: parsed.host_id.or(header_host_id),
        region: parsed.region.or(header_region),
        body_snippet: (!body.is_empty()).then(|| truncate_snippet(&body, ERROR_SNIPPET_LIMIT)),
    }
}

/// Error code for responses that carry no error document.
fn status_code_name(status: StatusCode) -> &'static str {
    match status.as_u16() {
        301 => "MovedPermanently",
        307 => "TemporaryRedirect",
        403 => "AccessDenied",
        404 => "NotFound",
        405 | 501 => "MethodNotAllowed",
        _ => "UnknownError",
    }
}

fn truncate_snippet(body: &str, max_len: usize) -> String {
    if body.len() <= max_len {
        return body.to_string();
    }
    let mut cut = max_len;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &body[..cut])
}
