use std::net::IpAddr;

use url::Url;

use crate::{auth::AddressingStyle, error::Error, util::encode};

const AMAZON_GLOBAL_HOST: &str = "s3.amazonaws.com";

/// A request target together with the pieces the signer needs.
pub(crate) struct ResolvedUrl {
    pub(crate) url: Url,
    pub(crate) canonical_uri: String,
    pub(crate) canonical_query_string: String,
}

/// Maps `(bucket, key, query)` onto the endpoint.
///
/// `region` only matters for the Amazon global endpoint, which is swapped for
/// its regional host outside `us-east-1`.
pub(crate) fn resolve_url(
    endpoint: &Url,
    bucket: Option<&str>,
    key: Option<&str>,
    query: &[(String, String)],
    style: AddressingStyle,
    region: &str,
) -> Result<ResolvedUrl, Error> {
    let endpoint_host = endpoint
        .host_str()
        .ok_or_else(|| Error::validation("endpoint must include host"))?;
    let host = regional_host(endpoint_host, region);

    let canonical_query_string = encode::canonical_query_string(query);
    let mut url = endpoint.clone();
    url.set_query((!canonical_query_string.is_empty()).then_some(canonical_query_string.as_str()));

    let (final_host, raw_path) = match bucket {
        None => (host, "/".to_string()),
        Some(bucket) => match effective_style(endpoint.scheme(), &host, bucket, style) {
            AddressingStyle::VirtualHosted => {
                if !is_dns_compatible_bucket(bucket) {
                    return Err(Error::validation(format!(
                        "bucket {bucket:?} cannot be addressed virtual-hosted style"
                    )));
                }
                (format!("{bucket}.{host}"), format!("/{}", key.unwrap_or("")))
            }
            _ => match key {
                Some(key) => (host, format!("/{bucket}/{key}")),
                None => (host, format!("/{bucket}")),
            },
        },
    };

    let canonical_uri = encode::encode_path(&raw_path);
    url.set_host(Some(&final_host))
        .map_err(|_| Error::validation(format!("invalid request host {final_host:?}")))?;
    url.set_path(&canonical_uri);
    if url.path() != canonical_uri {
        return Err(Error::validation(format!(
            "request path {raw_path:?} is not preserved by the URL"
        )));
    }

    Ok(ResolvedUrl {
        url,
        canonical_uri,
        canonical_query_string,
    })
}

fn regional_host(host: &str, region: &str) -> String {
    if host == AMAZON_GLOBAL_HOST && !region.is_empty() && region != "us-east-1" {
        return format!("s3.{region}.amazonaws.com");
    }
    host.to_string()
}

fn effective_style(scheme: &str, host: &str, bucket: &str, style: AddressingStyle) -> AddressingStyle {
    match style {
        AddressingStyle::Auto => {
            let bare_host = host.trim_start_matches('[').trim_end_matches(']');
            let path_only = host == "localhost"
                || bare_host.parse::<IpAddr>().is_ok()
                || (scheme == "https" && bucket.contains('.'))
                || !is_dns_compatible_bucket(bucket);
            if path_only {
                AddressingStyle::Path
            } else {
                AddressingStyle::VirtualHosted
            }
        }
        explicit => explicit,
    }
}

/// Lower-case letters, digits, `-` and `.`, 3 to 63 bytes, alphanumeric at
/// both ends, no `..`, and not shaped like an IP address.
pub(crate) fn is_dns_compatible_bucket(bucket: &str) -> bool {
    let bytes = bucket.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    (3..=63).contains(&bytes.len())
        && bytes
            .iter()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.'))
        && first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && !bucket.contains("..")
        && !bucket.contains(".-")
        && !bucket.contains("-.")
        && bucket.parse::<IpAddr>().is_err()
}
