use std::{error::Error as StdError, fmt};

use http::StatusCode;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for transfers, signing and service responses.
///
/// Validation errors are raised before any network activity. Every other
/// variant is passed to the caller as-is: nothing here is retried silently.
#[non_exhaustive]
pub enum Error {
    /// Malformed input or configuration, rejected before any I/O.
    Validation { message: String },

    /// A header or field could not be constructed while signing.
    Signing { message: String },

    /// The service answered with an unexpected status.
    Protocol {
        status: StatusCode,
        code: String,
        message: Option<String>,
        request_id: Option<String>,
        host_id: Option<String>,
        region: Option<String>,
        body_snippet: Option<String>,
    },

    /// Socket or stream failure (HTTP client, IO, TLS).
    Transport {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },

    /// Transferred data disagrees with what was expected: a size mismatch,
    /// an upload session that cannot belong to the source, or a completion
    /// call that reported success on the wire but failed logically.
    Consistency { message: String },

    /// A response body could not be decoded.
    Decode {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { message } => f
                .debug_struct("Validation")
                .field("message", message)
                .finish(),
            Self::Signing { message } => {
                f.debug_struct("Signing").field("message", message).finish()
            }
            Self::Protocol {
                status,
                code,
                message,
                request_id,
                host_id,
                region,
                body_snippet,
            } => f
                .debug_struct("Protocol")
                .field("status", status)
                .field("code", code)
                .field("message", message)
                .field("request_id", request_id)
                .field("host_id", host_id)
                .field("region", region)
                .field("body_snippet", body_snippet)
                .finish(),
            Self::Transport { message, source } => f
                .debug_struct("Transport")
                .field("message", message)
                .field("source", source)
                .finish(),
            Self::Consistency { message } => f
                .debug_struct("Consistency")
                .field("message", message)
                .finish(),
            Self::Decode { message, source } => f
                .debug_struct("Decode")
                .field("message", message)
                .field("source", source)
                .finish(),
        }
    }
}

impl Error {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a signing error.
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a transport error with optional source.
    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source,
        }
    }

    /// Creates a consistency error.
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// Creates a decode error with optional source.
    pub fn decode(
        message: impl Into<String>,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self::Decode {
            message: message.into(),
            source,
        }
    }

    /// Returns the HTTP status of a protocol error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the provider error code of a protocol error, e.g. `NoSuchKey`.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Protocol { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns the request id if reported by the service.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Protocol { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// Returns the region the service pointed at, if any.
    pub fn region_hint(&self) -> Option<&str> {
        match self {
            Self::Protocol { region, .. } => region.as_deref().filter(|r| !r.is_empty()),
            _ => None,
        }
    }
}

fn optional_field(label: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => format!(" {label}={v}"),
        _ => String::new(),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { message } => write!(f, "validation error: {message}"),
            Self::Signing { message } => write!(f, "signing error: {message}"),
            Self::Protocol {
                status,
                code,
                message,
                request_id,
                ..
            } => {
                let request_id = optional_field("request_id", request_id.as_deref());
                let msg = match message.as_deref() {
                    Some(m) if !m.is_empty() => format!(" ({m})"),
                    _ => String::new(),
                };
                write!(f, "protocol error: {status} code={code}{request_id}{msg}")
            }
            Self::Transport { message, .. } => write!(f, "transport error: {message}"),
            Self::Consistency { message } => write!(f, "consistency error: {message}"),
            Self::Decode { message, .. } => write!(f, "decode error: {message}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport { source, .. } | Self::Decode { source, .. } => {
                source.as_deref().map(|e| e as &(dyn StdError + 'static))
            }
            _ => None,
        }
    }
}
