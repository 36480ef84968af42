use std::time::Duration;

#[cfg(feature = "metrics")]
use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt as _;

#[cfg(feature = "metrics")]
use http::{Method, StatusCode};

use crate::{
    error::{Error, Result},
    transport::{HttpRequest, HttpResponse, RequestBody, Transport},
};

/// [`Transport`] over a pooled `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().pool_idle_timeout(Duration::from_secs(90));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::transport("failed to build HTTP client", Some(Box::new(e))))?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        #[cfg(feature = "metrics")]
        metrics::counter!("s3_http_requests_total", "method" => method_label(&method)).increment(1);
        #[cfg(feature = "metrics")]
        let label = method_label(&method);
        #[cfg(feature = "metrics")]
        let start = Instant::now();

        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!(
            "s3.http",
            method = %method,
            host = url.host_str().unwrap_or(""),
            path = url.path(),
            body_len = body.len(),
        );

        let mut req = self.client.request(method, url).headers(headers);
        req = match body {
            RequestBody::Empty => req,
            RequestBody::Bytes(b) => req.body(b),
            RequestBody::Stream { stream, .. } => req.body(reqwest::Body::wrap_stream(stream)),
        };

        let sent = req.send();
        #[cfg(feature = "tracing")]
        let sent = tracing::Instrument::instrument(sent, span);

        match sent.await {
            Ok(resp) => {
                #[cfg(feature = "metrics")]
                {
                    metrics::counter!(
                        "s3_http_responses_total",
                        "method" => label,
                        "class" => status_class(resp.status()),
                    )
                    .increment(1);
                    metrics::histogram!("s3_http_request_duration_seconds", "method" => label)
                        .record(start.elapsed().as_secs_f64());
                }

                let status = resp.status();
                let headers = resp.headers().clone();
                let body = resp.bytes_stream().map(|item| {
                    item.map_err(|e| Error::transport("response body stream failed", Some(Box::new(e))))
                });
                Ok(HttpResponse::new(status, headers, Box::pin(body)))
            }
            Err(err) => {
                #[cfg(feature = "metrics")]
                metrics::counter!("s3_http_errors_total", "method" => label).increment(1);
                Err(Error::transport("request failed", Some(Box::new(err))))
            }
        }
    }
}

#[cfg(feature = "metrics")]
fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

#[cfg(feature = "metrics")]
fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::PUT => "PUT",
        Method::HEAD => "HEAD",
        Method::DELETE => "DELETE",
        Method::POST => "POST",
        _ => "OTHER",
    }
}
