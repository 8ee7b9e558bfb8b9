//! Pipeline configuration.
//!
//! [`IngestConfig`] can be built in code with the `with_*` methods or loaded
//! from JSON. [`IngestConfig::validate`] checks everything that can be checked
//! before any input is read; planning the pipeline calls it again.
//!
//! ```
//! use ironload::{Format, IngestConfig};
//!
//! let config = IngestConfig::new(Format::Csv)
//!     .with_columns(["name", "num"])
//!     .with_time_value(1000);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{IngestError, Result};
use crate::io::compression::CompressionMode;
use crate::io::lines::resolve_encoding;
use crate::sink::retry::RetryConfig;
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default uncompressed chunk threshold: 16 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Chunks are kept in memory up to this many compressed bytes before spilling
/// to a temporary file.
pub const DEFAULT_SPILL_THRESHOLD: usize = 8 * 1024 * 1024;

pub const DEFAULT_NULL_PATTERN: &str = r"(?i)^(?:nil|-|\\N)?$";
pub const DEFAULT_TRUE_PATTERN: &str = r"(?i)^true$";
pub const DEFAULT_FALSE_PATTERN: &str = r"(?i)^false$";

/// Column that receives the canonical timestamp.
pub const TIME_KEY: &str = "time";

/// Input record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Csv,
    Tsv,
    Json,
    Msgpack,
    Apache,
    Syslog,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Tsv => "tsv",
            Format::Json => "json",
            Format::Msgpack => "msgpack",
            Format::Apache => "apache",
            Format::Syslog => "syslog",
        }
    }

    /// Formats whose parser yields positional fields that need column names.
    pub fn is_positional(&self) -> bool {
        matches!(self, Format::Csv | Format::Tsv)
    }

    /// Delimiter regex used when none is configured.
    pub fn default_delimiter(&self) -> &'static str {
        match self {
            Format::Csv => ",",
            Format::Tsv => "\t",
            _ => "\t|,",
        }
    }

    /// Timestamp layout of formats that carry a well-known time column.
    pub fn builtin_time_format(&self) -> Option<&'static str> {
        match self {
            Format::Apache => Some("%d/%b/%Y:%H:%M:%S %z"),
            Format::Syslog => Some("%b %d %H:%M:%S"),
            _ => None,
        }
    }

    /// Guess the format from a file name, looking through a compression
    /// suffix (`events.jsonl.gz` is JSON).
    pub fn from_path(path: impl AsRef<Path>) -> Option<Format> {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();
        let name = [".gz", ".gzip", ".zst", ".bz2", ".xz"]
            .iter()
            .find_map(|ext| name.strip_suffix(ext))
            .unwrap_or(&name);
        let ext = name.rsplit_once('.')?.1;
        match ext {
            "csv" => Some(Format::Csv),
            "tsv" | "tab" => Some(Format::Tsv),
            "json" | "jsonl" | "ndjson" => Some(Format::Json),
            "msgpack" | "mpk" => Some(Format::Msgpack),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            "json" | "jsonl" => Ok(Format::Json),
            "msgpack" => Ok(Format::Msgpack),
            "apache" => Ok(Format::Apache),
            "syslog" => Ok(Format::Syslog),
            other => Err(IngestError::config(format!("unsupported format '{other}'"))),
        }
    }
}

/// How each record obtains its `time` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeMode {
    /// Parse the named column, optionally with a strftime-style format.
    Column { name: String, format: Option<String> },
    /// Stamp every record with the same epoch seconds.
    Fixed(i64),
}

/// Everything the pipeline needs to know about one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub format: Format,
    /// Regex the delimited-text parser splits on.
    pub delimiter: Option<String>,
    /// Explicit column names for positional formats.
    pub columns: Option<Vec<String>>,
    /// Consume the first row as the column header.
    pub column_header: bool,
    pub null_pattern: String,
    pub true_pattern: String,
    pub false_pattern: String,
    /// Skip type coercion; every delimited field stays a string.
    pub all_string: bool,
    pub time_column: Option<String>,
    pub time_format: Option<String>,
    pub time_value: Option<i64>,
    /// Year assumed by time formats that carry none (syslog).
    pub reference_year: i32,
    pub encoding: String,
    pub compression: CompressionMode,
    /// Uncompressed bytes after which a chunk is flushed.
    pub chunk_size: usize,
    /// Optional record-count bound per chunk.
    pub chunk_records: Option<usize>,
    pub spill_threshold: usize,
    pub retry: RetryConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        use chrono::Datelike;
        Self {
            format: Format::default(),
            delimiter: None,
            columns: None,
            column_header: false,
            null_pattern: DEFAULT_NULL_PATTERN.to_string(),
            true_pattern: DEFAULT_TRUE_PATTERN.to_string(),
            false_pattern: DEFAULT_FALSE_PATTERN.to_string(),
            all_string: false,
            time_column: None,
            time_format: None,
            time_value: None,
            reference_year: chrono::Utc::now().year(),
            encoding: "utf-8".to_string(),
            compression: CompressionMode::Auto,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_records: None,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            retry: RetryConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Configuration whose format is guessed from the file name.
    ///
    /// # Errors
    /// [`IngestError::Configuration`] if the extension is not recognised.
    pub fn for_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path).ok_or_else(|| {
            IngestError::config(format!("cannot guess the format of {}", path.display()))
        })?;
        Ok(Self::new(format))
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("parse ingest configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("load {}", path.display()))
    }

    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_column_header(mut self, header: bool) -> Self {
        self.column_header = header;
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, pattern: impl Into<String>) -> Self {
        self.delimiter = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn with_patterns(
        mut self,
        null: impl Into<String>,
        true_: impl Into<String>,
        false_: impl Into<String>,
    ) -> Self {
        self.null_pattern = null.into();
        self.true_pattern = true_.into();
        self.false_pattern = false_.into();
        self
    }

    #[must_use]
    pub fn with_all_string(mut self, all_string: bool) -> Self {
        self.all_string = all_string;
        self
    }

    #[must_use]
    pub fn with_time_column(mut self, name: impl Into<String>) -> Self {
        self.time_column = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn with_time_value(mut self, epoch_seconds: i64) -> Self {
        self.time_value = Some(epoch_seconds);
        self
    }

    #[must_use]
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = label.into();
        self
    }

    #[must_use]
    pub fn with_compression(mut self, mode: CompressionMode) -> Self {
        self.compression = mode;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    #[must_use]
    pub fn with_chunk_records(mut self, records: usize) -> Self {
        self.chunk_records = Some(records);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Delimiter regex in effect for this configuration.
    pub fn delimiter_pattern(&self) -> &str {
        self.delimiter
            .as_deref()
            .unwrap_or_else(|| self.format.default_delimiter())
    }

    /// Resolve the time assignment mode.
    ///
    /// # Errors
    /// [`IngestError::Configuration`] if both a time column and a fixed time
    /// value are configured, or the fixed value is negative.
    pub fn time_mode(&self) -> Result<TimeMode> {
        match (&self.time_column, self.time_value) {
            (Some(column), Some(_)) => Err(IngestError::config(format!(
                "time column '{column}' and a fixed time value are mutually exclusive"
            ))),
            (None, Some(_)) if self.time_format.is_some() => Err(IngestError::config(
                "a time format cannot be combined with a fixed time value",
            )),
            (None, Some(value)) if value < 0 => Err(IngestError::config(format!(
                "fixed time value {value} is negative"
            ))),
            (None, Some(value)) => Ok(TimeMode::Fixed(value)),
            (column, None) => Ok(TimeMode::Column {
                name: column.clone().unwrap_or_else(|| TIME_KEY.to_string()),
                format: self
                    .time_format
                    .clone()
                    .or_else(|| self.format.builtin_time_format().map(str::to_string)),
            }),
        }
    }

    /// Check the configuration without reading any input.
    ///
    /// # Errors
    /// [`IngestError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.format.is_positional() && self.columns.is_none() && !self.column_header {
            return Err(IngestError::config("column header or column list required"));
        }
        if let Some(columns) = &self.columns
            && columns.is_empty()
        {
            return Err(IngestError::config("column list is empty"));
        }
        compile_pattern("delimiter", self.delimiter_pattern())?;
        if !self.all_string {
            compile_pattern("null", &self.null_pattern)?;
            compile_pattern("true", &self.true_pattern)?;
            compile_pattern("false", &self.false_pattern)?;
        }
        resolve_encoding(&self.encoding)?;
        self.time_mode()?;
        if self.chunk_size == 0 {
            return Err(IngestError::config("chunk size must be positive"));
        }
        if self.chunk_records == Some(0) {
            return Err(IngestError::config("chunk record limit must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(IngestError::config("retry budget must allow one attempt"));
        }
        Ok(())
    }
}

/// Compile a user-supplied regex, reporting which option it came from.
pub(crate) fn compile_pattern(option: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| IngestError::config(format!("invalid {option} pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_path_sees_through_compression() {
        assert_eq!(Format::from_path("a/b/events.jsonl.gz"), Some(Format::Json));
        assert_eq!(Format::from_path("x.TSV"), Some(Format::Tsv));
        assert_eq!(Format::from_path("data.mpk.zst"), Some(Format::Msgpack));
        assert_eq!(Format::from_path("noext"), None);
        assert_eq!(Format::from_path("access.log"), None);
    }

    #[test]
    fn time_mode_conflicts_are_rejected() {
        let both = IngestConfig::new(Format::Json)
            .with_time_column("ts")
            .with_time_value(5);
        assert!(matches!(both.time_mode(), Err(IngestError::Configuration(_))));

        let negative = IngestConfig::new(Format::Json).with_time_value(-1);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn time_mode_defaults_to_time_column() {
        let json = IngestConfig::new(Format::Json);
        assert_eq!(
            json.time_mode().unwrap(),
            TimeMode::Column { name: "time".into(), format: None }
        );
        let apache = IngestConfig::new(Format::Apache);
        assert_eq!(
            apache.time_mode().unwrap(),
            TimeMode::Column {
                name: "time".into(),
                format: Some("%d/%b/%Y:%H:%M:%S %z".into())
            }
        );
    }

    #[test]
    fn positional_formats_need_columns() {
        let err = IngestConfig::new(Format::Csv).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: column header or column list required"
        );
        assert!(IngestConfig::new(Format::Tsv).with_column_header(true).validate().is_ok());
    }

    #[test]
    fn json_config_uses_defaults_for_missing_fields() {
        let config = IngestConfig::from_json_str(
            r#"{"format":"csv","columns":["a","b"],"time_value":10,"compression":"gzip"}"#,
        )
        .unwrap();
        assert_eq!(config.format, Format::Csv);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.compression, CompressionMode::Gzip);
        assert!(IngestConfig::from_json_str(r#"{"format":"xml"}"#).is_err());
        assert!(IngestConfig::from_json_str(r#"{"bogus":1}"#).is_err());
    }
}
