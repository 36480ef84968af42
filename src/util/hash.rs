use base64::Engine as _;
use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt as _;
use md5::{Digest as _, Md5};
use sha2::Sha256;

use crate::{error::Result, types::ChecksumSummary};

/// Which digest a [`StreamingHasher`] computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumKind {
    /// MD5, reported base64-encoded. Used for `Content-MD5` and part resume
    /// checks.
    Md5,
    /// SHA256, reported hex-encoded. Used as the signed payload hash.
    Sha256,
}

enum DigestState {
    Md5(Md5),
    Sha256(Sha256),
}

/// Incremental digest over a byte stream.
///
/// Only digest state is retained; chunks are dropped as soon as they are
/// absorbed. [`StreamingHasher::finish`] consumes the hasher, so a summary is
/// produced exactly once.
pub struct StreamingHasher {
    state: DigestState,
    bytes_hashed: u64,
}

impl StreamingHasher {
    pub fn new(kind: ChecksumKind) -> Self {
        let state = match kind {
            ChecksumKind::Md5 => DigestState::Md5(Md5::new()),
            ChecksumKind::Sha256 => DigestState::Sha256(Sha256::new()),
        };
        Self {
            state,
            bytes_hashed: 0,
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        match &mut self.state {
            DigestState::Md5(h) => h.update(chunk),
            DigestState::Sha256(h) => h.update(chunk),
        }
        self.bytes_hashed += chunk.len() as u64;
    }

    /// Number of bytes absorbed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed
    }

    pub fn finish(self) -> ChecksumSummary {
        match self.state {
            DigestState::Md5(h) => ChecksumSummary {
                md5: Some(base64::engine::general_purpose::STANDARD.encode(h.finalize())),
                sha256: None,
            },
            DigestState::Sha256(h) => ChecksumSummary {
                md5: None,
                sha256: Some(hex::encode(h.finalize())),
            },
        }
    }

    /// Drains `stream` through a new hasher and returns the summary together
    /// with the number of bytes seen.
    pub async fn digest_stream<S>(kind: ChecksumKind, stream: S) -> Result<(ChecksumSummary, u64)>
    where
        S: Stream<Item = Result<Bytes>>,
    {
        let mut hasher = Self::new(kind);
        let mut stream = std::pin::pin!(stream);
        while let Some(chunk) = stream.next().await {
            hasher.update(&chunk?);
        }
        let seen = hasher.bytes_hashed();
        Ok((hasher.finish(), seen))
    }

    /// One-shot digest of an in-memory buffer.
    pub fn digest(kind: ChecksumKind, bytes: &[u8]) -> ChecksumSummary {
        let mut hasher = Self::new(kind);
        hasher.update(bytes);
        hasher.finish()
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Etags are quoted on the wire; single-part etags are plain MD5 hex.
pub(crate) fn normalize_etag(etag: &str) -> String {
    etag.trim()
        .trim_start_matches('"')
        .trim_end_matches('"')
        .to_ascii_lowercase()
}
