//! Resumable transfers and SigV4 authentication for S3-compatible storage.
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn demo() -> Result<(), s3_transfer::Error> {
//! use s3_transfer::{Auth, Client, api::FileSource};
//!
//! let client = Client::builder("https://s3.example.com")?
//!     .auth(Auth::from_env()?)
//!     .build()?;
//!
//! // Large files go through a multipart upload that picks up where an
//! // interrupted run left off.
//! let source = FileSource::open("backup.tar").await?;
//! let out = client
//!     .uploads()
//!     .upload("my-bucket", "backups/backup.tar", source)
//!     .send()
//!     .await?;
//! println!("{} bytes in {} parts", out.size, out.parts.len());
//!
//! let url = client
//!     .objects()
//!     .presign_get("my-bucket", "backups/backup.tar")
//!     .build()
//!     .await?;
//! println!("{}", url.url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Design
//!
//! Every request flows through one dispatcher that resolves the bucket
//! region (cached per client), addresses and signs the request, and sends it
//! through a [`Transport`]. Nothing is retried behind the caller's back.

#[cfg(all(
    feature = "rustls",
    feature = "native-tls",
    not(feature = "allow-both-tls")
))]
compile_error!("Enable only one of: rustls, native-tls.");

/// Service entry points and request builders.
pub mod api;
/// Shared request/response types.
pub mod types;

mod auth;
mod client;
mod error;
mod region;
mod transport;
mod util;

pub use auth::{AddressingStyle, Auth, Credentials, Region};
pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};
pub use transport::{BodyStream, HttpRequest, HttpResponse, RequestBody, ReqwestTransport, Transport};
pub use util::{
    hash::{ChecksumKind, StreamingHasher},
    part::{MAX_OBJECT_SIZE, MAX_PART_COUNT, MAX_PART_SIZE, MIN_PART_SIZE, PartPlanner, PartRange},
};
