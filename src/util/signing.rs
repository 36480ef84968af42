use hmac::{Hmac, Mac as _};
use http::{HeaderMap, HeaderValue, Method};
use sha2::Sha256;
use time::OffsetDateTime;

use crate::{
    auth::{Credentials, Region},
    error::{Error, Result},
    types::PresignedRequest,
    util::{encode, hash::sha256_hex, url::ResolvedUrl},
};

type HmacSha256 = Hmac<Sha256>;

pub(crate) const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub(crate) const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
pub(crate) const MAX_PRESIGN_EXPIRY_SECS: u64 = 604_800;
const SERVICE: &str = "s3";

/// Everything a signature is scoped to besides the request itself.
#[derive(Clone, Copy)]
pub(crate) struct SigningScope<'a> {
    pub(crate) credentials: &'a Credentials,
    pub(crate) region: &'a Region,
    pub(crate) now: OffsetDateTime,
}

impl<'a> SigningScope<'a> {
    pub(crate) fn new(credentials: &'a Credentials, region: &'a Region, now: OffsetDateTime) -> Self {
        Self {
            credentials,
            region,
            now,
        }
    }

    pub(crate) fn amz_date(&self) -> String {
        amz_datetime(self.now)
    }

    /// `<date>/<region>/s3/aws4_request`
    pub(crate) fn credential_scope(&self) -> String {
        format!(
            "{}/{}/{SERVICE}/aws4_request",
            date_stamp(self.now),
            self.region.as_str()
        )
    }

    /// `<access key>/<scope>`, as carried by presigned URLs and POST forms.
    pub(crate) fn credential(&self) -> String {
        format!(
            "{}/{}",
            self.credentials.access_key_id,
            self.credential_scope()
        )
    }

    fn signing_key(&self) -> Result<Vec<u8>> {
        let seed = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(seed.as_bytes(), date_stamp(self.now).as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_str().as_bytes())?;
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
        hmac_sha256(&k_service, b"aws4_request")
    }

    fn sign(&self, string_to_sign: &str) -> Result<String> {
        let key = self.signing_key()?;
        Ok(hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?))
    }

    fn string_to_sign(&self, canonical_request: &str) -> String {
        format!(
            "{ALGORITHM}\n{}\n{}\n{}",
            self.amz_date(),
            self.credential_scope(),
            sha256_hex(canonical_request.as_bytes())
        )
    }
}

/// Adds `x-amz-date`, `x-amz-content-sha256`, the session token, `host` and
/// finally `Authorization` to `headers`.
pub(crate) fn sign_request(
    scope: SigningScope<'_>,
    method: &Method,
    resolved: &ResolvedUrl,
    headers: &mut HeaderMap,
    payload_hash: &str,
) -> Result<()> {
    headers.insert("x-amz-date", header_value(&scope.amz_date(), "x-amz-date")?);
    headers.insert(
        "x-amz-content-sha256",
        header_value(payload_hash, "x-amz-content-sha256")?,
    );
    if let Some(token) = &scope.credentials.session_token {
        headers.insert(
            "x-amz-security-token",
            header_value(token, "x-amz-security-token")?,
        );
    }
    headers.insert(http::header::HOST, host_header(&resolved.url)?);

    let signed = SignedHeaders::from_map(headers);
    let canonical = canonical_request(
        method,
        &resolved.canonical_uri,
        &resolved.canonical_query_string,
        &signed,
        payload_hash,
    );
    let signature = scope.sign(&scope.string_to_sign(&canonical))?;

    let authorization = format!(
        "{ALGORITHM} Credential={}, SignedHeaders={}, Signature={signature}",
        scope.credential(),
        signed.names
    );
    headers.insert(
        http::header::AUTHORIZATION,
        header_value(&authorization, "authorization")?,
    );
    Ok(())
}

/// Builds a query-string authenticated URL valid for `expires_in`.
///
/// `headers` are signed but not embedded; whoever uses the URL must send them
/// unchanged.
pub(crate) fn presign_url(
    scope: SigningScope<'_>,
    method: Method,
    mut resolved: ResolvedUrl,
    expires_in: std::time::Duration,
    extra_query: &[(String, String)],
    headers: &HeaderMap,
) -> Result<PresignedRequest> {
    let expires = expires_in.as_secs();
    if !(1..=MAX_PRESIGN_EXPIRY_SECS).contains(&expires) {
        return Err(Error::validation(format!(
            "presigned URL expiry must be between 1 and {MAX_PRESIGN_EXPIRY_SECS} seconds, got {expires}"
        )));
    }

    let mut to_sign = headers.clone();
    to_sign.insert(http::header::HOST, host_header(&resolved.url)?);
    let signed = SignedHeaders::from_map(&to_sign);

    let mut query = extra_query.to_vec();
    query.push(("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()));
    query.push(("X-Amz-Credential".to_string(), scope.credential()));
    query.push(("X-Amz-Date".to_string(), scope.amz_date()));
    query.push(("X-Amz-Expires".to_string(), expires.to_string()));
    query.push(("X-Amz-SignedHeaders".to_string(), signed.names.clone()));
    if let Some(token) = &scope.credentials.session_token {
        query.push(("X-Amz-Security-Token".to_string(), token.clone()));
    }
    resolved.canonical_query_string = encode::canonical_query_string(&query);

    let canonical = canonical_request(
        &method,
        &resolved.canonical_uri,
        &resolved.canonical_query_string,
        &signed,
        UNSIGNED_PAYLOAD,
    );
    let signature = scope.sign(&scope.string_to_sign(&canonical))?;

    query.push(("X-Amz-Signature".to_string(), signature));
    resolved
        .url
        .set_query(Some(&encode::canonical_query_string(&query)));

    Ok(PresignedRequest {
        method,
        url: resolved.url,
        headers: headers.clone(),
    })
}

/// Signs a base64-encoded POST policy document.
pub(crate) fn post_policy_signature(scope: SigningScope<'_>, policy_base64: &str) -> Result<String> {
    scope.sign(policy_base64)
}

struct SignedHeaders {
    canonical: String,
    names: String,
}

impl SignedHeaders {
    fn from_map(headers: &HeaderMap) -> Self {
        let mut entries: Vec<(String, String)> = headers
            .iter()
            .filter(|(name, _)| is_signed_header(name.as_str()))
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_ascii_lowercase(), collapse_whitespace(value)))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical = entries
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect::<String>();
        let names = entries
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        Self { canonical, names }
    }
}

/// Headers covered by the signature. `user-agent` and `content-length` are
/// never among them.
fn is_signed_header(name: &str) -> bool {
    matches!(
        name,
        "host"
            | "content-type"
            | "content-md5"
            | "range"
            | "if-match"
            | "if-none-match"
            | "if-modified-since"
            | "if-unmodified-since"
    ) || name.starts_with("x-amz-")
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn canonical_request(
    method: &Method,
    canonical_uri: &str,
    canonical_query: &str,
    signed: &SignedHeaders,
    payload_hash: &str,
) -> String {
    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{}\n{}\n{payload_hash}",
        signed.canonical, signed.names
    )
}

fn host_header(url: &url::Url) -> Result<HeaderValue> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::validation("endpoint must include host"))?;
    // `Url::port` is `None` for the scheme's default port.
    let value = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    header_value(&value, "host")
}

fn header_value(value: &str, name: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::signing(format!("invalid {name} header value")))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| Error::signing("invalid HMAC key"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn date_stamp(now: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day()
    )
}

fn amz_datetime(now: OffsetDateTime) -> String {
    format!(
        "{}T{:02}{:02}{:02}Z",
        date_stamp(now),
        now.hour(),
        now.minute(),
        now.second()
    )
}
