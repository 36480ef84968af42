use http::{
    HeaderMap, HeaderValue,
    header::{AsHeaderName, HeaderName},
};

use crate::error::{Error, Result};

pub(crate) fn header_string<N>(headers: &HeaderMap, name: N) -> Option<String>
where
    N: AsHeaderName,
{
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub(crate) fn header_u64<N>(headers: &HeaderMap, name: N) -> Option<u64>
where
    N: AsHeaderName,
{
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// `ETag` with surrounding quotes removed.
pub(crate) fn etag(headers: &HeaderMap) -> Option<String> {
    header_string(headers, http::header::ETAG)
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// Inserts a caller-supplied value, rejecting bytes HTTP cannot carry.
pub(crate) fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<()> {
    let parsed = HeaderValue::from_str(value)
        .map_err(|_| Error::validation(format!("invalid value for header {name}")))?;
    headers.insert(name, parsed);
    Ok(())
}

/// `x-amz-meta-<key>` for user metadata.
pub(crate) fn metadata_name(key: &str) -> Result<HeaderName> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::validation("metadata key must not be empty"));
    }
    HeaderName::from_bytes(format!("x-amz-meta-{}", key.to_ascii_lowercase()).as_bytes())
        .map_err(|_| Error::validation(format!("invalid metadata key {key:?}")))
}
