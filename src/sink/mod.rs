//! Record sink and chunked uploader.
//!
//! The sink owns the single open [`Chunk`]. For every accepted record it:
//! 1. encodes the record as a MessagePack map (falling back to decimal
//!    strings for integers beyond 64 bits),
//! 2. flushes and uploads the open chunk if it is already over its byte or
//!    record bound,
//! 3. appends the encoded bytes to the open chunk.
//!
//! Uploads are synchronous and retried with exponential backoff, so records
//! reach the remote table in acceptance order and a record is never split
//! across chunks.

pub mod chunk;
pub mod retry;
pub mod writer;

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::value::Record;
use chunk::{Chunk, ClosedChunk, EncodeError, encode_record};
use retry::{Exhausted, RetryConfig, retry_with_backoff};
use std::time::Duration;
use writer::{ContentFormat, RemoteTableWriter, WriterError, WriterErrorKind};

/// Chunking and retry settings for a [`RecordSink`].
#[derive(Debug, Clone, Copy)]
pub struct SinkOptions {
    pub chunk_size: usize,
    pub chunk_records: Option<usize>,
    pub spill_threshold: usize,
    pub retry: RetryConfig,
}

impl From<&IngestConfig> for SinkOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_records: config.chunk_records,
            spill_threshold: config.spill_threshold,
            retry: config.retry,
        }
    }
}

/// What the sink did during one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkReport {
    /// Records written into chunks.
    pub records: u64,
    /// Chunks uploaded successfully.
    pub chunks: u64,
    /// Compressed bytes uploaded successfully.
    pub bytes_uploaded: u64,
    /// Time reported by the writer across all successful uploads.
    pub upload_time: Duration,
    /// Whether any record needed the bignum fallback.
    pub bignum_fallback: bool,
    /// Number of records that needed the bignum fallback.
    pub bignum_records: u64,
}

/// Serializes records into size-bounded chunks and uploads them.
pub struct RecordSink<'w, W: RemoteTableWriter + ?Sized> {
    writer: &'w W,
    options: SinkOptions,
    current: Option<Chunk>,
    scratch: Vec<u8>,
    report: SinkReport,
}

impl<'w, W: RemoteTableWriter + ?Sized> RecordSink<'w, W> {
    pub fn new(writer: &'w W, options: SinkOptions) -> Self {
        Self {
            writer,
            options,
            current: None,
            scratch: Vec::with_capacity(1024),
            report: SinkReport::default(),
        }
    }

    /// Report of the work done so far.
    pub fn report(&self) -> &SinkReport {
        &self.report
    }

    /// Accept one record.
    ///
    /// # Errors
    /// [`IngestError::UploadExhausted`] if flushing the previous chunk failed
    /// past the retry budget, [`IngestError::Encode`] if the record cannot be
    /// serialized, or [`IngestError::Io`] if the chunk spool cannot be
    /// written.
    pub fn push(&mut self, record: &Record) -> Result<()> {
        self.encode(record)?;

        if self.current.as_ref().is_some_and(|c| self.is_full(c)) {
            self.flush()?;
        }
        let first = self.report.records;
        let spill = self.options.spill_threshold;
        let chunk = self.current.get_or_insert_with(|| Chunk::new(first, spill));
        chunk.append(&self.scratch)?;
        self.report.records += 1;
        Ok(())
    }

    /// Upload the last chunk and return the report.
    ///
    /// # Errors
    /// [`IngestError::EmptyInput`] if no record was ever pushed, plus the
    /// errors of [`push`](Self::push).
    pub fn finish(mut self) -> Result<SinkReport> {
        if self.current.as_ref().is_some_and(|c| !c.is_empty()) {
            self.flush()?;
        }
        if self.report.records == 0 {
            return Err(IngestError::EmptyInput);
        }
        Ok(self.report)
    }

    fn is_full(&self, chunk: &Chunk) -> bool {
        chunk.uncompressed_len() > self.options.chunk_size as u64
            || self
                .options
                .chunk_records
                .is_some_and(|limit| chunk.records() >= limit as u64)
    }

    /// Encode into the scratch buffer, retrying once with bignums
    /// stringified.
    fn encode(&mut self, record: &Record) -> Result<()> {
        match encode_record(record, &mut self.scratch) {
            Ok(()) => Ok(()),
            Err(EncodeError::IntegerOutOfRange(n)) => {
                tracing::debug!(value = %n, "integer exceeds 64 bits; storing as string");
                let mut fallback = record.clone();
                fallback.stringify_bignums();
                encode_record(&fallback, &mut self.scratch)?;
                self.report.bignum_fallback = true;
                self.report.bignum_records += 1;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&mut self) -> Result<()> {
        let Some(chunk) = self.current.take() else {
            return Ok(());
        };
        let closed = chunk.finish()?;
        self.upload(closed)
    }

    fn upload(&mut self, mut closed: ClosedChunk) -> Result<()> {
        let len = closed.len();
        let writer = self.writer;
        let outcome = retry_with_backoff(&self.options.retry, |_attempt| {
            let body = closed.rewound_body().map_err(|e| {
                WriterError::new(WriterErrorKind::Local, format!("cannot re-read chunk: {e}"))
            })?;
            writer.upload(ContentFormat::MsgpackGzip, body, len)
        });
        match outcome {
            Ok(elapsed) => {
                tracing::debug!(
                    first_record = closed.first_record(),
                    records = closed.records(),
                    uncompressed = closed.uncompressed_len(),
                    compressed = len,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "chunk uploaded"
                );
                self.report.chunks += 1;
                self.report.bytes_uploaded += len;
                self.report.upload_time += elapsed;
                Ok(())
            }
            Err(Exhausted {
                attempts,
                last_error,
            }) => Err(IngestError::UploadExhausted {
                first_record: closed.first_record(),
                last_record: closed.last_record(),
                attempts,
                source: last_error,
            }),
        }
    }
}
