//! Delimited text (CSV / TSV).
//!
//! Lines are split on a delimiter regex and nothing else: there is no quoting
//! or escaping, so a delimiter inside a quoted field still splits it.

use super::{LineParser, Row};
use crate::config::compile_pattern;
use crate::error::{ParseError, Result};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct DelimitedParser {
    delimiter: Regex,
}

impl DelimitedParser {
    /// # Errors
    /// [`IngestError::Configuration`](crate::IngestError::Configuration) if
    /// the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            delimiter: compile_pattern("delimiter", pattern)?,
        })
    }
}

impl LineParser for DelimitedParser {
    fn parse(&self, line: &str) -> std::result::Result<Row, ParseError> {
        Ok(Row::Fields(
            self.delimiter.split(line).map(str::to_string).collect(),
        ))
    }
}
