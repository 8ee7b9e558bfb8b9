//! JSON lines: one JSON object per line.

use super::{LineParser, Row};
use crate::error::ParseError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLineParser;

impl LineParser for JsonLineParser {
    fn parse(&self, line: &str) -> Result<Row, ParseError> {
        let json: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| ParseError::new(format!("invalid json format: {e}"), line))?;
        match Value::from_json(json) {
            Value::Map(record) => Ok(Row::Record(record)),
            _ => Err(ParseError::new(
                "invalid json format: expected a JSON object",
                line,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_becomes_record_with_nested_values() {
        let Row::Record(r) = JsonLineParser.parse(r#"{"k":"v","n":{"a":[1,2]}}"#).unwrap() else {
            panic!("expected record");
        };
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["k", "n"]);
        assert!(matches!(r.get("n"), Some(Value::Map(_))));
    }

    #[test]
    fn malformed_and_non_object_lines_are_rejected() {
        let err = JsonLineParser.parse("{not json").unwrap_err();
        assert!(err.reason.starts_with("invalid json format: "));
        assert_eq!(err.raw, "{not json");

        let err = JsonLineParser.parse("[1,2]").unwrap_err();
        assert_eq!(err.reason, "invalid json format: expected a JSON object");
    }
}
