//! Time assignment: gives every record a non-negative `time` in epoch
//! seconds.
//!
//! Neither mode looks at the wall clock. Formats that carry no year (syslog's
//! `%b %d %H:%M:%S`) are parsed against a configured reference year.

use super::RecordFilter;
use crate::config::{TIME_KEY, TimeMode};
use crate::error::ParseError;
use crate::value::{Record, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Layouts with an explicit offset tried by the generic parser.
const OFFSET_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y/%m/%d %H:%M:%S %z",
    "%d/%b/%Y:%H:%M:%S %z",
];

/// Layouts without an offset; read as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S UTC",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Specifiers that already pin the year.
const YEAR_SPECIFIERS: &[&str] = &["%Y", "%y", "%G", "%g", "%s", "%+", "%c", "%D", "%F", "%x"];

/// An explicit strftime-style time format.
#[derive(Debug, Clone)]
pub struct TimeFormat {
    format: String,
    reference_year: Option<i32>,
}

impl TimeFormat {
    pub fn new(format: impl Into<String>, reference_year: i32) -> Self {
        let format = format.into();
        let has_year = YEAR_SPECIFIERS.iter().any(|spec| format.contains(spec));
        Self {
            format,
            reference_year: (!has_year).then_some(reference_year),
        }
    }

    /// Parse `value` (a string, or an integer read as text) with this format.
    pub fn parse(&self, value: &Value) -> Result<i64, String> {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Integer(n) => n.to_string(),
            other => return Err(format!("expected a string, found {}", other.type_name())),
        };
        let seconds = match self.reference_year {
            Some(year) => parse_with(&format!("{year} {text}"), &format!("%Y {}", self.format)),
            None => parse_with(&text, &self.format),
        }?;
        non_negative(seconds)
    }
}

fn parse_with(text: &str, format: &str) -> Result<i64, String> {
    if let Ok(dt) = DateTime::parse_from_str(text, format) {
        return Ok(dt.timestamp());
    }
    match NaiveDateTime::parse_from_str(text, format) {
        Ok(dt) => Ok(dt.and_utc().timestamp()),
        Err(naive_err) => NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| naive_err.to_string()),
    }
}

fn non_negative(seconds: i64) -> Result<i64, String> {
    if seconds < 0 {
        Err("time is before the Unix epoch".to_string())
    } else {
        Ok(seconds)
    }
}

/// Interpret a time value with no explicit format.
///
/// Integers are taken as epoch seconds, floats are truncated, and strings
/// are tried as digits, RFC 3339, RFC 2822 and a few common layouts.
pub fn parse_generic(value: &Value) -> Result<i64, String> {
    match value {
        Value::Integer(n) => {
            let seconds = i64::try_from(*n).map_err(|_| "integer out of range".to_string())?;
            non_negative(seconds)
        }
        Value::Float(x) if x.is_finite() && *x < i64::MAX as f64 => non_negative(x.trunc() as i64),
        Value::Float(_) => Err("float is not a finite timestamp".to_string()),
        Value::String(s) => parse_generic_str(s.trim()).and_then(non_negative),
        other => Err(format!("expected a timestamp, found {}", other.type_name())),
    }
}

fn parse_generic_str(s: &str) -> Result<i64, String> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().map_err(|e| e.to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.timestamp());
    }
    for layout in OFFSET_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(s, layout) {
            return Ok(dt.timestamp());
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
            return Ok(dt.and_utc().timestamp());
        }
    }
    for layout in DATE_LAYOUTS {
        if let Some(dt) = NaiveDate::parse_from_str(s, layout)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(dt.and_utc().timestamp());
        }
    }
    Err("unrecognized timestamp".to_string())
}

#[derive(Debug, Clone)]
enum Assign {
    Column {
        name: String,
        format: Option<TimeFormat>,
    },
    Fixed(i64),
}

/// Stamps or derives the `time` field of each record.
#[derive(Debug, Clone)]
pub struct TimeFilter {
    assign: Assign,
}

impl TimeFilter {
    pub fn new(mode: TimeMode, reference_year: i32) -> Self {
        let assign = match mode {
            TimeMode::Column { name, format } => Assign::Column {
                name,
                format: format.map(|f| TimeFormat::new(f, reference_year)),
            },
            TimeMode::Fixed(value) => Assign::Fixed(value),
        };
        Self { assign }
    }
}

impl RecordFilter for TimeFilter {
    fn name(&self) -> &'static str {
        "time"
    }

    fn apply(&self, mut record: Record) -> Result<Record, ParseError> {
        let seconds = match &self.assign {
            Assign::Fixed(value) => *value,
            Assign::Column { name, format } => {
                let Some(value) = record.get(name) else {
                    return Err(ParseError::new(
                        format!("time column '{name}' is missing"),
                        record.to_json_string(),
                    ));
                };
                let parsed = match format {
                    Some(format) => format.parse(value),
                    None => parse_generic(value),
                };
                match parsed {
                    Ok(seconds) => seconds,
                    Err(cause) => {
                        return Err(ParseError::new(
                            format!("invalid time format '{value}': {cause}"),
                            record.to_json_string(),
                        ));
                    }
                }
            }
        };
        record.insert(TIME_KEY, Value::Integer(i128::from(seconds)));
        Ok(record)
    }
}
