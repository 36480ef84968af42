//! URI encoding rules used by canonical requests.
//!
//! Only RFC 3986 unreserved characters pass through; everything else is
//! written as upper-case `%XX`, byte by byte over the UTF-8 form.

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

fn passes_through(byte: u8, keep_slash: bool) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b'-' | b'_' | b'.' | b'~')
        || (keep_slash && byte == b'/')
}

fn uri_encode(input: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 2);
    for &byte in input.as_bytes() {
        if passes_through(byte, keep_slash) {
            out.push(char::from(byte));
        } else {
            out.push('%');
            out.push(char::from(HEX_UPPER[usize::from(byte >> 4)]));
            out.push(char::from(HEX_UPPER[usize::from(byte & 0x0f)]));
        }
    }
    out
}

/// Encodes a query-string name or value. Slashes are escaped.
pub(crate) fn encode_component(input: &str) -> String {
    uri_encode(input, false)
}

/// Encodes a request path. Slashes separate segments and are kept.
pub(crate) fn encode_path(input: &str) -> String {
    uri_encode(input, true)
}

/// Builds the canonical query string: every pair encoded, then ordered by
/// name and value.
pub(crate) fn canonical_query_string(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(name, value)| (encode_component(name), encode_component(value)))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
