use std::fmt;

use crate::error::Error;

/// Region used to scope request signatures.
pub(crate) const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Region(String);

impl Region {
    pub fn new(value: impl Into<String>) -> Result<Self, Error> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("region must not be empty"));
        }
        if trimmed.len() != value.len() {
            return Ok(Self(trimmed.to_string()));
        }
        Ok(Self(value))
    }

    /// The region assumed when nothing else is known, `us-east-1`.
    pub fn us_east_1() -> Self {
        Self(DEFAULT_REGION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Region").field(&self.0).finish()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Region {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Static access key pair, optionally carrying a session token.
///
/// The session token is sent as `x-amz-security-token` and signed like any
/// other header, but never feeds the signing key.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, Error> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();

        if access_key_id.trim().is_empty() {
            return Err(Error::validation("access_key_id must not be empty"));
        }
        if secret_access_key.trim().is_empty() {
            return Err(Error::validation("secret_access_key must not be empty"));
        }

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: None,
        })
    }

    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Result<Self, Error> {
        let session_token = session_token.into();
        if session_token.trim().is_empty() {
            return Err(Error::validation("session_token must not be empty"));
        }
        self.session_token = Some(session_token);
        Ok(self)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field(
                "access_key_id",
                &crate::util::redact::redact_value(&self.access_key_id),
            )
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self
                    .session_token
                    .as_deref()
                    .map(crate::util::redact::redact_value),
            )
            .finish()
    }
}

/// How requests are authenticated. `Anonymous` disables signing entirely.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum Auth {
    Anonymous,
    Static(Credentials),
}

impl Auth {
    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
    /// `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Result<Self, Error> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| Error::validation("missing AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| Error::validation("missing AWS_SECRET_ACCESS_KEY"))?;

        let mut creds = Credentials::new(access_key_id, secret_access_key)?;
        if let Ok(token) = std::env::var("AWS_SESSION_TOKEN")
            && !token.trim().is_empty()
        {
            creds = creds.with_session_token(token)?;
        }

        Ok(Self::Static(creds))
    }

    /// Builds static credentials, falling back to anonymous access when
    /// either half of the key pair is empty.
    pub fn from_keys(access_key_id: &str, secret_access_key: &str) -> Self {
        match Credentials::new(access_key_id, secret_access_key) {
            Ok(creds) => Self::Static(creds),
            Err(_) => Self::Anonymous,
        }
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Anonymous => None,
            Self::Static(creds) => Some(creds),
        }
    }
}

/// Bucket addressing mode.
///
/// `Auto` picks virtual-hosted style (`bucket.host/key`) when the bucket name
/// is DNS-safe and the endpoint allows it, otherwise path style
/// (`host/bucket/key`).
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressingStyle {
    Auto,
    Path,
    VirtualHosted,
}
