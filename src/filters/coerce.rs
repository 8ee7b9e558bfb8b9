//! Type coercion of string fields.
//!
//! Each top-level string field is matched against the null, true and false
//! patterns in that order. A string that matches none of them becomes an
//! integer only if printing the parsed integer gives back the exact same
//! string, so `"007"`, `"+5"` and `"1e5"` are left alone.

use super::RecordFilter;
use crate::config::compile_pattern;
use crate::error::{ParseError, Result};
use crate::value::{Record, Value};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct CoerceFilter {
    null: Regex,
    true_: Regex,
    false_: Regex,
}

impl CoerceFilter {
    /// # Errors
    /// [`IngestError::Configuration`](crate::IngestError::Configuration) if a
    /// pattern does not compile.
    pub fn new(null: &str, true_: &str, false_: &str) -> Result<Self> {
        Ok(Self {
            null: compile_pattern("null", null)?,
            true_: compile_pattern("true", true_)?,
            false_: compile_pattern("false", false_)?,
        })
    }

    /// Coerce a single string.
    pub fn coerce_str(&self, s: &str) -> Option<Value> {
        if self.null.is_match(s) {
            Some(Value::Null)
        } else if self.true_.is_match(s) {
            Some(Value::Bool(true))
        } else if self.false_.is_match(s) {
            Some(Value::Bool(false))
        } else {
            parse_exact_integer(s).map(Value::Integer)
        }
    }
}

/// Parse `s` as an integer only if it round-trips to the same text.
pub fn parse_exact_integer(s: &str) -> Option<i128> {
    let n: i128 = s.parse().ok()?;
    (n.to_string() == s).then_some(n)
}

impl RecordFilter for CoerceFilter {
    fn name(&self) -> &'static str {
        "coerce"
    }

    fn apply(&self, mut record: Record) -> std::result::Result<Record, ParseError> {
        for value in record.values_mut() {
            if let Value::String(s) = value
                && let Some(coerced) = self.coerce_str(s)
            {
                *value = coerced;
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_FALSE_PATTERN, DEFAULT_NULL_PATTERN, DEFAULT_TRUE_PATTERN};

    fn filter() -> CoerceFilter {
        CoerceFilter::new(DEFAULT_NULL_PATTERN, DEFAULT_TRUE_PATTERN, DEFAULT_FALSE_PATTERN)
            .unwrap()
    }

    #[test]
    fn integers_must_round_trip() {
        assert_eq!(parse_exact_integer("42"), Some(42));
        assert_eq!(parse_exact_integer("-7"), Some(-7));
        assert_eq!(parse_exact_integer("007"), None);
        assert_eq!(parse_exact_integer("1e5"), None);
        assert_eq!(parse_exact_integer("+5"), None);
        assert_eq!(parse_exact_integer("-0"), None);
        assert_eq!(parse_exact_integer(" 1"), None);
        assert_eq!(
            parse_exact_integer("1180591620717411303424"),
            Some(1i128 << 70)
        );
    }

    #[test]
    fn default_patterns() {
        let f = filter();
        for s in ["", "-", "nil", "NULL", "\\N"] {
            assert_eq!(f.coerce_str(s), Some(Value::Null), "{s:?}");
        }
        assert_eq!(f.coerce_str("TRUE"), Some(Value::Bool(true)));
        assert_eq!(f.coerce_str("false"), Some(Value::Bool(false)));
        assert_eq!(f.coerce_str("1.5"), None);
        assert_eq!(f.coerce_str("truthy"), None);
    }

    #[test]
    fn non_string_fields_pass_through() {
        let record: Record = [
            ("s".to_string(), Value::from("12")),
            ("f".to_string(), Value::Float(1.0)),
            ("a".to_string(), Value::Array(vec![Value::from("3")])),
        ]
        .into_iter()
        .collect();
        let out = filter().apply(record).unwrap();
        assert_eq!(out.get("s"), Some(&Value::Integer(12)));
        assert_eq!(out.get("f"), Some(&Value::Float(1.0)));
        assert_eq!(out.get("a"), Some(&Value::Array(vec![Value::from("3")])));
    }
}
