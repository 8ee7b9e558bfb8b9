//! MessagePack stream: one top-level value per pull.
//!
//! The stream is self-delimiting, so it is read directly rather than split
//! into lines. A decode error leaves the reader at an unknown offset; there is
//! no resynchronisation and the rest of the stream is abandoned.

use super::Row;
use crate::error::{IngestError, ParseError, Reject};
use crate::value::Value;
use std::io::BufRead;

pub struct MsgpackSource<R> {
    reader: R,
    decoded: u64,
    done: bool,
}

impl<R: BufRead> MsgpackSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoded: 0,
            done: false,
        }
    }

    fn fatal(&mut self, message: String) -> Option<Result<Row, Reject>> {
        self.done = true;
        Some(Err(Reject::Fatal(IngestError::malformed(message))))
    }
}

impl<R: BufRead> Iterator for MsgpackSource<R> {
    type Item = Result<Row, Reject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.fill_buf().map(<[u8]>::is_empty) {
            Ok(true) => {
                self.done = true;
                return None;
            }
            Ok(false) => {}
            Err(e) => return self.fatal(format!("read failed after {} values: {e}", self.decoded)),
        }
        let value = match rmpv::decode::read_value(&mut self.reader) {
            Ok(value) => value,
            Err(e) => {
                return self.fatal(format!(
                    "msgpack decode failed after {} values: {e}",
                    self.decoded
                ));
            }
        };
        self.decoded += 1;
        Some(match Value::from_msgpack(value) {
            Value::Map(record) => Ok(Row::Record(record)),
            Value::Array(items) => Ok(Row::Values(items)),
            other => Err(Reject::Skip(ParseError::new(
                "invalid msgpack format: expected map or array",
                other.to_string(),
            ))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(values: &[rmpv::Value]) -> Vec<u8> {
        let mut buf = Vec::new();
        for v in values {
            rmpv::encode::write_value(&mut buf, v).unwrap();
        }
        buf
    }

    #[test]
    fn decodes_maps_arrays_and_stops_cleanly() {
        let bytes = encode(&[
            rmpv::Value::Map(vec![("a".into(), 1.into())]),
            rmpv::Value::Array(vec!["x".into(), 2.into()]),
        ]);
        let rows: Vec<_> = MsgpackSource::new(Cursor::new(bytes)).collect();
        assert_eq!(rows.len(), 2);
        assert!(matches!(rows[0], Ok(Row::Record(_))));
        assert!(matches!(&rows[1], Ok(Row::Values(v)) if v.len() == 2));
    }

    #[test]
    fn scalar_top_level_value_is_skipped() {
        let bytes = encode(&[42.into(), rmpv::Value::Map(vec![])]);
        let rows: Vec<_> = MsgpackSource::new(Cursor::new(bytes)).collect();
        assert!(matches!(rows[0], Err(Reject::Skip(_))));
        assert!(matches!(rows[1], Ok(Row::Record(_))));
    }

    #[test]
    fn truncated_value_is_fatal_and_ends_the_stream() {
        let mut bytes = encode(&[rmpv::Value::Map(vec![("key".into(), "value".into())])]);
        bytes.truncate(bytes.len() - 2);
        let mut source = MsgpackSource::new(Cursor::new(bytes));
        assert!(matches!(
            source.next(),
            Some(Err(Reject::Fatal(IngestError::MalformedInput(_))))
        ));
        assert!(source.next().is_none());
    }
}
