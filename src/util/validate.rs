use std::net::IpAddr;

use crate::error::{Error, Result};

/// Accepts legacy path-style names (upper case, `_`) as well as DNS-safe ones.
pub(crate) fn bucket_name(bucket: &str) -> Result<()> {
    let invalid = |why: &str| Err(Error::validation(format!("invalid bucket name {bucket:?}: {why}")));

    if !(3..=63).contains(&bucket.len()) {
        return invalid("length must be between 3 and 63");
    }
    if !bucket
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
    {
        return invalid("only letters, digits, '.', '-' and '_' are allowed");
    }
    if bucket.starts_with(['.', '-']) || bucket.ends_with(['.', '-']) {
        return invalid("must start and end with a letter or digit");
    }
    if bucket.contains("..") {
        return invalid("must not contain '..'");
    }
    if bucket.parse::<IpAddr>().is_ok() {
        return invalid("must not be an IP address");
    }
    Ok(())
}

pub(crate) fn object_name(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::validation("object name must not be empty"));
    }
    if key.len() > 1024 {
        return Err(Error::validation(
            "object name must be at most 1024 bytes long",
        ));
    }
    // URL normalisation would drop these segments from the request path.
    if key.split('/').any(|segment| matches!(segment, "." | "..")) {
        return Err(Error::validation(format!(
            "object name {key:?} must not contain '.' or '..' path segments"
        )));
    }
    Ok(())
}

pub(crate) fn prefix(prefix: &str) -> Result<()> {
    if prefix.len() > 1024 {
        return Err(Error::validation("prefix must be at most 1024 bytes long"));
    }
    Ok(())
}
