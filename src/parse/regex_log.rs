//! Log formats parsed with a fixed regular expression.
//!
//! Each named capture group becomes a column in group order. Groups that did
//! not participate in the match, and fields logged as `-`, become null.

use super::{LineParser, Row};
use crate::error::ParseError;
use crate::value::{Record, Value};
use regex::Regex;
use std::sync::LazyLock;

/// Apache common/combined access log.
static APACHE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^(?P<host>[^ ]*) [^ ]* (?P<user>[^ ]*) \[(?P<time>[^\]]*)\] "#,
        r#""(?P<method>\S+)(?: +(?P<path>[^ ]*) +\S*)?" "#,
        r#"(?P<code>[^ ]*) (?P<size>[^ ]*)"#,
        r#"(?: "(?P<referer>[^"]*)" "(?P<agent>[^"]*)")?$"#,
    ))
    .expect("apache log pattern is valid")
});

/// BSD syslog (RFC 3164) as written by most syslog daemons.
static SYSLOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<time>[^ ]* +[^ ]* [^ ]*) (?P<host>[^ ]*) ",
        r"(?P<ident>[a-zA-Z0-9_/.\-]*)(?:\[(?P<pid>[0-9]+)\])?",
        r"(?:[^:]*:)? *(?P<message>.*)$",
    ))
    .expect("syslog pattern is valid")
});

#[derive(Debug, Clone)]
pub struct RegexLogParser {
    name: &'static str,
    pattern: &'static Regex,
}

impl RegexLogParser {
    pub fn apache() -> Self {
        Self {
            name: "apache",
            pattern: &APACHE,
        }
    }

    pub fn syslog() -> Self {
        Self {
            name: "syslog",
            pattern: &SYSLOG,
        }
    }
}

impl LineParser for RegexLogParser {
    fn parse(&self, line: &str) -> Result<Row, ParseError> {
        let caps = self
            .pattern
            .captures(line)
            .ok_or_else(|| ParseError::new(format!("invalid {} log format", self.name), line))?;
        let mut record = Record::with_capacity(self.pattern.captures_len());
        for name in self.pattern.capture_names().flatten() {
            let value = match caps.name(name).map(|m| m.as_str()) {
                None | Some("-") => Value::Null,
                Some(text) => Value::String(text.to_string()),
            };
            record.insert(name, value);
        }
        Ok(Row::Record(record))
    }
}
