//! The remote table writer seam.
//!
//! The pipeline never talks to the network itself. Each finished chunk is
//! handed to a [`RemoteTableWriter`], typically a thin wrapper around the
//! service's HTTP client. Uploads are at-least-once: a chunk may be sent
//! again after a failed attempt, and deduplication is the service's job.

use std::error::Error;
use std::fmt;
use std::io::Read;
use std::time::Duration;

/// Content format tag sent with each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    /// Gzip-compressed stream of MessagePack maps.
    MsgpackGzip,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::MsgpackGzip => "msgpack.gz",
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a writer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterErrorKind {
    /// Connection, DNS or timeout trouble.
    Network,
    /// The service answered with an error.
    Service,
    /// The chunk could not be re-read locally for another attempt.
    Local,
}

/// Error returned by a [`RemoteTableWriter`].
#[derive(Debug, Clone)]
pub struct WriterError {
    pub kind: WriterErrorKind,
    pub message: String,
}

impl WriterError {
    pub fn new(kind: WriterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(WriterErrorKind::Network, message)
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(WriterErrorKind::Service, message)
    }
}

impl fmt::Display for WriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for WriterError {}

/// Uploads one compressed chunk to the remote append-only table.
///
/// Implementations must be `Sync` so several files can be ingested against
/// one writer from different threads.
pub trait RemoteTableWriter: Sync {
    /// Upload `len` bytes read from `body`, returning the time the call took.
    ///
    /// # Errors
    /// Any [`WriterError`]; the sink retries every failure.
    fn upload(
        &self,
        format: ContentFormat,
        body: &mut dyn Read,
        len: u64,
    ) -> Result<Duration, WriterError>;
}

impl<W: RemoteTableWriter + ?Sized> RemoteTableWriter for &W {
    fn upload(
        &self,
        format: ContentFormat,
        body: &mut dyn Read,
        len: u64,
    ) -> Result<Duration, WriterError> {
        (**self).upload(format, body, len)
    }
}
