//! In-memory remote table writers and temporary input files.

use super::decode_chunk_records;
use crate::sink::writer::{ContentFormat, RemoteTableWriter, WriterError};
use crate::value::Record;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// One body received by a mock writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedChunk {
    pub format: ContentFormat,
    pub body: Vec<u8>,
}

/// Accepts every upload and keeps the bodies in memory.
#[derive(Debug, Default)]
pub struct MemoryTableWriter {
    uploads: Mutex<Vec<UploadedChunk>>,
}

impl MemoryTableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bodies received so far, in upload order.
    pub fn chunks(&self) -> Vec<UploadedChunk> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every uploaded record, decoded, across all chunks.
    ///
    /// # Errors
    /// Returns an error if a chunk does not decode.
    pub fn records(&self) -> anyhow::Result<Vec<Record>> {
        let mut records = Vec::new();
        for chunk in self.chunks() {
            records.extend(decode_chunk_records(&chunk.body)?);
        }
        Ok(records)
    }
}

impl RemoteTableWriter for MemoryTableWriter {
    fn upload(
        &self,
        format: ContentFormat,
        body: &mut dyn Read,
        len: u64,
    ) -> Result<Duration, WriterError> {
        let started = Instant::now();
        let mut buf = Vec::with_capacity(len as usize);
        body.read_to_end(&mut buf)
            .map_err(|e| WriterError::network(format!("read body: {e}")))?;
        if buf.len() as u64 != len {
            return Err(WriterError::service(format!(
                "declared {len} bytes, received {}",
                buf.len()
            )));
        }
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(UploadedChunk { format, body: buf });
        Ok(started.elapsed())
    }
}

/// Fails the first `failures` upload attempts, then behaves like
/// [`MemoryTableWriter`].
#[derive(Debug, Default)]
pub struct FlakyTableWriter {
    inner: MemoryTableWriter,
    failures: u32,
    attempts: AtomicU32,
}

impl FlakyTableWriter {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    /// A writer that never succeeds.
    pub fn always_failing() -> Self {
        Self::new(u32::MAX)
    }

    /// Upload attempts seen, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryTableWriter {
        &self.inner
    }
}

impl RemoteTableWriter for FlakyTableWriter {
    fn upload(
        &self,
        format: ContentFormat,
        body: &mut dyn Read,
        len: u64,
    ) -> Result<Duration, WriterError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(WriterError::network(format!(
                "simulated outage on attempt {attempt}"
            )));
        }
        self.inner.upload(format, body, len)
    }
}

/// A temporary directory holding input files for a test.
pub struct TempInputs {
    dir: TempDir,
}

impl TempInputs {
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `name` inside the directory.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}
