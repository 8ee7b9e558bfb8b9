//! Testing utilities for ingestion runs.
//!
//! This module lets tests drive a full pipeline without a real remote table:
//!
//! - **Mock writers**: [`MemoryTableWriter`] keeps every uploaded chunk in
//!   memory; [`FlakyTableWriter`] fails a set number of attempts first
//! - **Chunk decoding**: [`decode_chunk`] turns an uploaded `msgpack.gz` body
//!   back into values
//! - **Fixtures**: sample inputs, gzip helpers and a zero-delay retry policy
//!
//! # Quick Start
//!
//! ```
//! use ironload::testing::*;
//! use ironload::{ErrorCollector, Format, IngestConfig, ingest};
//! use std::io::Cursor;
//!
//! # fn main() -> anyhow::Result<()> {
//! let writer = MemoryTableWriter::new();
//! let config = IngestConfig::new(Format::Csv)
//!     .with_columns(["name", "n"])
//!     .with_time_value(1000);
//! let mut errors = ErrorCollector::new();
//!
//! let report = ingest(Cursor::new(b"a,1\nb,2\n".to_vec()), &config, &mut errors, &writer)?;
//! assert_eq!(report.accepted, 2);
//! assert_eq!(writer.records()?.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod mock_io;

pub use fixtures::*;
pub use mock_io::*;

use crate::value::{Record, Value};
use anyhow::{Context, Result, bail};
use flate2::read::MultiGzDecoder;
use std::io::{Cursor, Read};

/// Decompress and decode one uploaded chunk body.
///
/// # Errors
/// Returns an error if the body is not gzip or holds a truncated value.
pub fn decode_chunk(body: &[u8]) -> Result<Vec<rmpv::Value>> {
    let mut raw = Vec::new();
    MultiGzDecoder::new(body)
        .read_to_end(&mut raw)
        .context("gunzip chunk")?;
    let mut cursor = Cursor::new(raw.as_slice());
    let mut values = Vec::new();
    while (cursor.position() as usize) < raw.len() {
        let value = rmpv::decode::read_value(&mut cursor)
            .with_context(|| format!("decode value #{}", values.len()))?;
        values.push(value);
    }
    Ok(values)
}

/// Decode a chunk body into records; every value must be a map.
///
/// # Errors
/// Returns an error if decoding fails or a value is not a map.
pub fn decode_chunk_records(body: &[u8]) -> Result<Vec<Record>> {
    decode_chunk(body)?
        .into_iter()
        .map(|value| match Value::from_msgpack(value) {
            Value::Map(record) => Ok(record),
            other => bail!("chunk value is not a map: {other}"),
        })
        .collect()
}
