use http::HeaderMap;

/// Keeps at most the first and last four characters of a secret.
pub(crate) fn redact_value(value: &str) -> String {
    let chars: Vec<char> = value.trim().chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Replaces the signature inside an `Authorization` value or a presigned
/// query string.
pub(crate) fn redact_signature(value: &str) -> String {
    const MARKER: &str = "Signature=";

    let mut out = value.to_string();
    if let Some(start) = out.find(MARKER).map(|idx| idx + MARKER.len()) {
        let end = out[start..]
            .find(|c: char| c == '&' || c == ',' || c.is_whitespace())
            .map_or(out.len(), |len| start + len);
        out.replace_range(start..end, "**REDACTED**");
    }
    out
}

/// Header dump for trace logs with credentials masked.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
pub(crate) fn loggable_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            let shown = match name.as_str() {
                "authorization" => redact_signature(value),
                "x-amz-security-token" => redact_value(value),
                _ => value.to_string(),
            };
            format!("{name}: {shown}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
