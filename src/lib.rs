//! # Ironload
//!
//! A **bulk loader** that streams delimited text, JSON lines, MessagePack and
//! common log formats into an append-only remote table.
//!
//! Every input runs through the same pull-based pipeline:
//!
//! ```text
//! decompress -> lines -> parse -> bind -> coerce -> time -> sink
//! ```
//!
//! The sink serializes accepted records as MessagePack, packs them into
//! gzip-compressed chunks of bounded size and uploads each chunk through a
//! [`RemoteTableWriter`], retrying with exponential backoff.
//!
//! ## Key Features
//!
//! - **Streaming** - one record in flight; chunks spill to disk when large
//! - **Formats** - csv, tsv, JSON lines, MessagePack, Apache and syslog
//! - **Compression** - gzip auto-detection; zstd, bzip2 and xz behind features
//! - **Type coercion** - null/true/false patterns and exact integer parsing
//! - **Time assignment** - from a column (with or without a format) or fixed
//! - **Skip, don't stop** - bad lines go to an [`ErrorSink`], the run goes on
//! - **Multi-file runs** - sequential or on a rayon pool (`parallel-io`)
//!
//! ## Quick Start
//!
//! ```
//! use ironload::testing::MemoryTableWriter;
//! use ironload::{Format, IngestConfig, LogErrorSink, ingest};
//! use std::io::Cursor;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = IngestConfig::new(Format::Json);
//! let writer = MemoryTableWriter::new();
//! let input = Cursor::new(br#"{"time":1577836800,"user":"alice"}"#.to_vec());
//!
//! let report = ingest(input, &config, &mut LogErrorSink::new(), &writer)?;
//! assert_eq!(report.accepted, 1);
//! assert_eq!(report.chunks, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! A unit that cannot be parsed, bound or timed is a [`ParseError`]: it is
//! reported and skipped. Anything that ends the run is an [`IngestError`].
//!
//! ## Feature Flags
//!
//! - `compression-zstd`, `compression-bzip2`, `compression-xz` - extra input
//!   decoders (all on by default)
//! - `parallel-io` - [`ingest_files_par`] (on by default)

pub mod config;
pub mod error;
pub mod error_sink;
pub mod filters;
pub mod ingest;
pub mod io;
pub mod parse;
pub mod pipeline;
pub mod sink;
pub mod testing;
pub mod value;

pub use config::{Format, IngestConfig, TimeMode};
pub use error::{IngestError, ParseError, Reject};
pub use error_sink::{ErrorCollector, ErrorSink, LogErrorSink};
pub use ingest::{FileOutcome, IngestReport, ingest, ingest_files, ingest_path};
pub use io::compression::{CompressionMode, DecompressionCodec, register_codec};
pub use io::glob::expand_inputs;
pub use pipeline::{StageSpec, describe, plan};
pub use sink::retry::RetryConfig;
pub use sink::writer::{ContentFormat, RemoteTableWriter, WriterError, WriterErrorKind};
pub use value::{Record, Value};

#[cfg(feature = "parallel-io")]
pub use ingest::ingest_files_par;
