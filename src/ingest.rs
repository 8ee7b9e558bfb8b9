//! Run drivers: pull records through the pipeline into the sink.

use crate::config::IngestConfig;
use crate::error::{IngestError, Reject, Result};
use crate::error_sink::{ErrorCollector, ErrorSink};
use crate::pipeline::{assemble, describe, plan};
use crate::sink::writer::RemoteTableWriter;
use crate::sink::{RecordSink, SinkOptions, SinkReport};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What one run accomplished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Records serialized into chunks.
    pub accepted: u64,
    /// Input units reported to the error sink.
    pub skipped: u64,
    /// Chunks uploaded.
    pub chunks: u64,
    /// Compressed bytes uploaded.
    pub bytes_uploaded: u64,
    /// Writer-reported upload time, summed.
    pub upload_time: Duration,
    /// Whether any integer beyond 64 bits was stored as a decimal string.
    pub bignum_fallback: bool,
    pub bignum_records: u64,
}

impl IngestReport {
    fn new(sink: SinkReport, skipped: u64) -> Self {
        Self {
            accepted: sink.records,
            skipped,
            chunks: sink.chunks,
            bytes_uploaded: sink.bytes_uploaded,
            upload_time: sink.upload_time,
            bignum_fallback: sink.bignum_fallback,
            bignum_records: sink.bignum_records,
        }
    }
}

/// Ingest one input stream.
///
/// Skipped units go to `errors`; accepted records are uploaded through
/// `writer` in acceptance order. If the stream fails part way, the records
/// accepted so far are still flushed before the failure is returned.
///
/// # Errors
/// - [`IngestError::Configuration`] before any input is read.
/// - [`IngestError::MalformedInput`] on stream corruption.
/// - [`IngestError::EmptyInput`] if no record was accepted.
/// - [`IngestError::UploadExhausted`] if a chunk could not be uploaded.
/// - [`IngestError::Encode`] if an accepted record cannot be serialized.
pub fn ingest<R, W>(
    input: R,
    config: &IngestConfig,
    errors: &mut dyn ErrorSink,
    writer: &W,
) -> Result<IngestReport>
where
    R: Read + 'static,
    W: RemoteTableWriter + ?Sized,
{
    let stages = plan(config)?;
    tracing::debug!(stages = ?describe(&stages), format = %config.format, "pipeline planned");
    let stream = assemble(input, &stages)?;
    tracing::trace!(filters = ?stream.filter_names(), "pipeline assembled");

    let mut sink = RecordSink::new(writer, SinkOptions::from(config));
    let mut skipped = 0u64;
    let mut stream_error = None;
    for item in stream {
        match item {
            Ok(record) => sink.push(&record)?,
            Err(Reject::Skip(e)) => {
                skipped += 1;
                errors.report(&e.reason, &e.raw);
            }
            Err(Reject::Fatal(e)) => {
                stream_error = Some(e);
                break;
            }
        }
    }

    if let Some(stream_error) = stream_error {
        return match sink.finish() {
            Ok(_) | Err(IngestError::EmptyInput) => Err(stream_error),
            Err(upload_error) => {
                tracing::warn!(error = %stream_error, "input ended early before final upload failed");
                Err(upload_error)
            }
        };
    }

    let report = IngestReport::new(sink.finish()?, skipped);
    if report.bignum_fallback {
        tracing::warn!(
            records = report.bignum_records,
            "integers outside the 64-bit range were stored as decimal strings"
        );
    }
    Ok(report)
}

/// Open `path` and ingest it.
///
/// # Errors
/// As [`ingest`], plus [`IngestError::Io`] if the file cannot be opened.
pub fn ingest_path<W>(
    path: impl AsRef<Path>,
    config: &IngestConfig,
    errors: &mut dyn ErrorSink,
    writer: &W,
) -> Result<IngestReport>
where
    W: RemoteTableWriter + ?Sized,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    let report = ingest(file, config, errors, writer)?;
    tracing::info!(
        path = %path.display(),
        accepted = report.accepted,
        skipped = report.skipped,
        chunks = report.chunks,
        bytes = report.bytes_uploaded,
        "ingested file"
    );
    Ok(report)
}

/// Result of ingesting one file of a multi-file run.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<IngestReport>,
    /// Units skipped in this file.
    pub errors: ErrorCollector,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

fn ingest_one<W>(path: &Path, config: &IngestConfig, writer: &W) -> FileOutcome
where
    W: RemoteTableWriter + ?Sized,
{
    let mut errors = ErrorCollector::new();
    let result = ingest_path(path, config, &mut errors, writer);
    if let Err(e) = &result {
        tracing::warn!(path = %path.display(), error = %e, "file failed; continuing with the next one");
    }
    FileOutcome {
        path: path.to_path_buf(),
        result,
        errors,
    }
}

/// Ingest files one after another. A failed file does not stop the run.
pub fn ingest_files<P, W>(paths: &[P], config: &IngestConfig, writer: &W) -> Vec<FileOutcome>
where
    P: AsRef<Path>,
    W: RemoteTableWriter + ?Sized,
{
    paths
        .iter()
        .map(|p| ingest_one(p.as_ref(), config, writer))
        .collect()
}

/// Ingest files on a dedicated thread pool, one pipeline per file.
///
/// * `threads`: if `None`, defaults to `num_cpus::get()`, clamped to `[1,n]`.
///
/// Outcomes are returned in input order.
///
/// # Errors
/// Returns an error only if the thread pool cannot be built.
///
/// # Feature
/// Requires the `parallel-io` feature.
#[cfg(feature = "parallel-io")]
pub fn ingest_files_par<P, W>(
    paths: &[P],
    config: &IngestConfig,
    writer: &W,
    threads: Option<usize>,
) -> anyhow::Result<Vec<FileOutcome>>
where
    P: AsRef<Path> + Sync,
    W: RemoteTableWriter + ?Sized,
{
    use anyhow::Context;
    use rayon::prelude::*;

    let n = paths.len().max(1);
    let threads = threads.unwrap_or_else(num_cpus::get).clamp(1, n);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("build ingest thread pool")?;
    Ok(pool.install(|| {
        paths
            .par_iter()
            .map(|p| ingest_one(p.as_ref(), config, writer))
            .collect()
    }))
}
