//! Record parsers.
//!
//! Line-oriented formats implement [`LineParser`] and turn one text line into
//! a [`Row`]. MessagePack is self-delimiting and reads the byte stream
//! directly through [`msgpack::MsgpackSource`].

pub mod delimited;
pub mod jsonl;
pub mod msgpack;
pub mod regex_log;

use crate::error::ParseError;
use crate::value::{Record, Value};

/// What a parser produces for one input unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// Positional text fields (delimited text).
    Fields(Vec<String>),
    /// Positional typed values (MessagePack arrays).
    Values(Vec<Value>),
    /// Already named fields.
    Record(Record),
}

impl Row {
    /// Compact JSON rendering used as the raw text of row-level errors.
    pub fn to_json_string(&self) -> String {
        let rendered = match self {
            Row::Fields(f) => serde_json::to_string(f),
            Row::Values(v) => serde_json::to_string(v),
            Row::Record(r) => serde_json::to_string(r),
        };
        rendered.unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Parses one line of text.
pub trait LineParser {
    fn parse(&self, line: &str) -> Result<Row, ParseError>;
}
