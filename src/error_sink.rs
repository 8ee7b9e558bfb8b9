//! Destinations for skipped input units.
//!
//! The pipeline never stops on a [`ParseError`]; it hands the reason and raw
//! text to an [`ErrorSink`] and moves on. Reporting cannot fail.
//!
//! ```
//! use ironload::{ErrorCollector, ErrorSink};
//!
//! let mut collector = ErrorCollector::with_limit(1);
//! collector.report("column count mismatch: expected 2, got 1", r#"["a"]"#);
//! collector.report("invalid json format: EOF", "{");
//! assert_eq!(collector.error_count(), 2);
//! assert_eq!(collector.errors().len(), 1);
//! ```

use crate::error::ParseError;
use std::path::Path;
use std::{fmt, io};

/// Errors kept by [`ErrorCollector::new`].
pub const DEFAULT_ERROR_LIMIT: usize = 1000;

/// Receives one report per skipped input unit.
pub trait ErrorSink {
    fn report(&mut self, reason: &str, raw: &str);
}

impl<F: FnMut(&str, &str)> ErrorSink for F {
    fn report(&mut self, reason: &str, raw: &str) {
        self(reason, raw);
    }
}

/// Keeps the first `limit` errors and counts all of them.
#[derive(Debug, Clone)]
pub struct ErrorCollector {
    errors: Vec<ParseError>,
    total: u64,
    limit: usize,
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::with_limit(DEFAULT_ERROR_LIMIT)
    }
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            errors: Vec::new(),
            total: 0,
            limit,
        }
    }

    /// Total number of reports, including those beyond the limit.
    pub fn error_count(&self) -> u64 {
        self.total
    }

    /// The retained errors, in report order.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Whether some reports were counted but not kept.
    pub fn is_truncated(&self) -> bool {
        self.total > self.errors.len() as u64
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.total = 0;
    }

    /// Print the retained errors to stderr.
    pub fn print_errors(&self) {
        for (idx, error) in self.errors.iter().enumerate() {
            eprintln!("Error #{}: {}", idx + 1, error);
        }
        if self.is_truncated() {
            eprintln!("... {} more not shown", self.total - self.errors.len() as u64);
        }
    }

    /// Export the retained errors as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.errors)
    }

    /// Write the retained errors to a file as JSON.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = self.to_json().map_err(io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl ErrorSink for ErrorCollector {
    fn report(&mut self, reason: &str, raw: &str) {
        self.total += 1;
        if self.errors.len() < self.limit {
            self.errors.push(ParseError::new(reason, raw));
        }
    }
}

impl fmt::Display for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorCollector({} errors)", self.total)
    }
}

/// Logs every report as a `tracing` warning.
#[derive(Debug, Clone, Default)]
pub struct LogErrorSink {
    source: Option<String>,
    reported: u64,
}

impl LogErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag each warning with the input it came from.
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            reported: 0,
        }
    }

    pub fn reported(&self) -> u64 {
        self.reported
    }
}

impl ErrorSink for LogErrorSink {
    fn report(&mut self, reason: &str, raw: &str) {
        self.reported += 1;
        match &self.source {
            Some(source) => tracing::warn!(source = %source, reason, raw, "skipped input unit"),
            None => tracing::warn!(reason, raw, "skipped input unit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_counts_past_its_limit() {
        let mut c = ErrorCollector::with_limit(2);
        for i in 0..5 {
            c.report("bad", &i.to_string());
        }
        assert_eq!(c.error_count(), 5);
        assert_eq!(c.errors().len(), 2);
        assert_eq!(c.errors()[1].raw, "1");
        assert!(c.is_truncated());
        assert_eq!(c.to_string(), "ErrorCollector(5 errors)");

        c.clear();
        assert_eq!(c.error_count(), 0);
        assert!(!c.is_truncated());
    }

    #[test]
    fn collector_exports_json() {
        let mut c = ErrorCollector::new();
        c.report("invalid json format: EOF", "{");
        let json: serde_json::Value = serde_json::from_str(&c.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["reason"], "invalid json format: EOF");
        assert_eq!(json[0]["raw"], "{");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.json");
        c.write_to_file(&path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("invalid json"));
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |reason: &str, raw: &str| seen.push(format!("{reason}|{raw}"));
            let sink: &mut dyn ErrorSink = &mut sink;
            sink.report("r", "x");
        }
        assert_eq!(seen, ["r|x"]);
    }

    #[test]
    fn log_sink_counts_reports() {
        let mut sink = LogErrorSink::for_source("a.csv");
        sink.report("r", "x");
        assert_eq!(sink.reported(), 1);
    }
}
