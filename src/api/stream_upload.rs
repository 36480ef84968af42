//! Uploads from a stream whose length is unknown or only hinted.

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt as _;

use crate::{
    api::{
        UploadsService,
        objects::{object_headers, put_object},
        uploads::{complete_upload, open_session, send_part},
    },
    client::{Client, dispatch::Payload},
    error::{Error, Result},
    types::{ByteStream, UploadOutput},
    util::{
        self,
        hash::{ChecksumKind, StreamingHasher, normalize_etag},
        part::{MAX_OBJECT_SIZE, MAX_PART_COUNT},
    },
};

impl UploadsService {
    /// Uploads everything `stream` yields. Blocks of one part size are pulled
    /// one at a time, so at most one block is held in memory.
    pub fn upload_stream<S>(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        stream: S,
    ) -> UploadStreamRequest
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        UploadStreamRequest {
            client: self.client().clone(),
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            metadata: Vec::new(),
            size_hint: None,
            stream: Box::pin(stream),
        }
    }
}

pub struct UploadStreamRequest {
    client: Client,
    bucket: String,
    key: String,
    content_type: Option<String>,
    metadata: Vec<(String, String)>,
    size_hint: Option<u64>,
    stream: ByteStream,
}

impl UploadStreamRequest {
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Expected total length. Picks a smaller part size than the worst case;
    /// a stream that outgrows the hint fails once it exceeds the part limit.
    pub fn size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    pub async fn send(self) -> Result<UploadOutput> {
        util::validate::bucket_name(&self.bucket)?;
        util::validate::object_name(&self.key)?;

        let planner = self.client.part_planner();
        let block_size = match self.size_hint {
            Some(size) => planner.part_size(size)?,
            None => planner.worst_case_part_size()?,
        };
        let headers = object_headers(self.content_type.as_deref(), &self.metadata)?;
        let mut chunker = BlockChunker::new(self.stream, block_size)?;

        let first = chunker.next_block().await?.unwrap_or_default();
        if (first.len() as u64) < block_size {
            let size = first.len() as u64;
            #[cfg(feature = "tracing")]
            tracing::debug!(bucket = %self.bucket, key = %self.key, size, "stream fits one request");
            let out = put_object(&self.client, &self.bucket, &self.key, headers, Payload::Bytes(first)).await?;
            return Ok(UploadOutput {
                etag: out.etag,
                size,
                upload_id: None,
                parts: Vec::new(),
                reused_parts: 0,
            });
        }

        let mut session = open_session(
            &self.client,
            &self.bucket,
            &self.key,
            headers,
            None,
            block_size,
        )
        .await?;

        let mut manifest = Vec::new();
        let mut reused = 0;
        let mut total = 0u64;
        let mut number = 0u32;
        let mut next = Some(first);

        while let Some(block) = next {
            number += 1;
            if u64::from(number) > MAX_PART_COUNT {
                return Err(Error::validation(format!(
                    "stream needs more than {MAX_PART_COUNT} parts of {block_size} bytes"
                )));
            }
            let len = block.len() as u64;
            total += len;
            if total > MAX_OBJECT_SIZE {
                return Err(Error::validation(format!(
                    "stream exceeds the maximum object size of {MAX_OBJECT_SIZE} bytes"
                )));
            }

            let reusable = session.parts.get(&number).filter(|part| {
                part.size == len
                    && StreamingHasher::digest(ChecksumKind::Md5, &block).md5_hex().as_deref()
                        == Some(normalize_etag(&part.etag).as_str())
            });
            let record = match reusable {
                Some(part) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(part = number, "part already committed, skipping");
                    reused += 1;
                    part.clone()
                }
                None => {
                    let record = send_part(
                        &self.client,
                        &self.bucket,
                        &self.key,
                        &session.upload_id,
                        number,
                        len,
                        Payload::Bytes(block),
                    )
                    .await?;
                    session.parts.insert(number, record.clone());
                    record
                }
            };
            manifest.push(record);
            next = chunker.next_block().await?;
        }

        let done = complete_upload(
            &self.client,
            &self.bucket,
            &self.key,
            &session.upload_id,
            &manifest,
        )
        .await?;
        Ok(UploadOutput {
            etag: done.etag,
            size: total,
            upload_id: Some(session.upload_id),
            parts: manifest,
            reused_parts: reused,
        })
    }
}

/// Regroups an arbitrary chunk stream into blocks of exactly `block_size`
/// bytes; only the final block may be shorter.
pub(crate) struct BlockChunker {
    stream: ByteStream,
    block_size: usize,
    pending: BytesMut,
    finished: bool,
}

impl BlockChunker {
    pub(crate) fn new(stream: ByteStream, block_size: u64) -> Result<Self> {
        let block_size = usize::try_from(block_size)
            .map_err(|_| Error::validation("part size does not fit in memory"))?;
        if block_size == 0 {
            return Err(Error::validation("part size must be positive"));
        }
        Ok(Self {
            stream,
            block_size,
            pending: BytesMut::new(),
            finished: false,
        })
    }

    /// Next block, or `None` once the source is exhausted. Reads from the
    /// source only until one block is filled.
    pub(crate) async fn next_block(&mut self) -> Result<Option<Bytes>> {
        while !self.finished && self.pending.len() < self.block_size {
            match self.stream.next().await {
                Some(chunk) => self.pending.extend_from_slice(&chunk?),
                None => self.finished = true,
            }
        }
        if self.pending.is_empty() {
            return Ok(None);
        }
        let take = self.pending.len().min(self.block_size);
        Ok(Some(self.pending.split_to(take).freeze()))
    }
}
