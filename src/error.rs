//! Error taxonomy for the ingestion pipeline.
//!
//! Two kinds of failure exist:
//! - [`ParseError`] describes one rejected input unit. It is routed to an
//!   [`ErrorSink`](crate::ErrorSink) and the pipeline moves on.
//! - [`IngestError`] ends the run for the current input.

use crate::sink::chunk::EncodeError;
use crate::sink::writer::WriterError;
use serde::{Deserialize, Serialize};

/// Result alias used throughout the crate.
pub type Result<T, E = IngestError> = std::result::Result<T, E>;

/// Fatal errors surfaced by [`ingest`](crate::ingest).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Invalid or missing pipeline configuration. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Stream-level corruption (bad gzip framing, MessagePack desync).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The whole input produced zero accepted records.
    #[error("no records were accepted from the input")]
    EmptyInput,

    /// A chunk could not be uploaded within the retry budget.
    #[error(
        "upload of records {first_record}..={last_record} failed after {attempts} attempts: {source}"
    )]
    UploadExhausted {
        first_record: u64,
        last_record: u64,
        attempts: u32,
        #[source]
        source: WriterError,
    },

    /// An accepted record could not be serialized for upload.
    #[error("record encoding failed: {0}")]
    Encode(#[from] EncodeError),

    /// Local I/O failure (opening input, spooling a chunk).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }
}

/// A single rejected input unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{reason}: {raw}")]
pub struct ParseError {
    /// Why the unit was rejected.
    pub reason: String,
    /// The raw line, or the record rendered as JSON.
    pub raw: String,
}

impl ParseError {
    pub fn new(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

/// Why a pulled unit did not become a record.
#[derive(Debug)]
pub enum Reject {
    /// Skip this unit, report it, keep pulling.
    Skip(ParseError),
    /// Stop the run.
    Fatal(IngestError),
}

impl From<ParseError> for Reject {
    fn from(e: ParseError) -> Self {
        Reject::Skip(e)
    }
}

impl From<IngestError> for Reject {
    fn from(e: IngestError) -> Self {
        Reject::Fatal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_displays_reason_then_raw() {
        let e = ParseError::new("column count mismatch: expected 2, got 1", "[\"a\"]");
        assert_eq!(e.to_string(), "column count mismatch: expected 2, got 1: [\"a\"]");
        let _: &dyn std::error::Error = &e;
    }
}
