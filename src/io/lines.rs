//! Line source: splits a decompressed stream into text lines.
//!
//! Lines are split on the `\n` byte and decoded with an `encoding_rs`
//! encoding, so only ASCII-compatible encodings are accepted. Trailing `\n`
//! and `\r\n` are stripped and empty lines are skipped. A line holding only
//! whitespace is still a line: for delimited input it may be a row of empty
//! fields.

use crate::error::{IngestError, ParseError, Result};
use encoding_rs::Encoding;
use std::io::BufRead;

/// Resolve an encoding label (e.g. `"utf-8"`, `"latin1"`, `"shift_jis"`).
///
/// # Errors
/// [`IngestError::Configuration`] if the label is unknown or names an
/// encoding that cannot be split on newline bytes (UTF-16).
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| IngestError::config(format!("unknown encoding '{label}'")))?;
    if !encoding.is_ascii_compatible() {
        return Err(IngestError::config(format!(
            "encoding '{}' is not supported for line-oriented input",
            encoding.name()
        )));
    }
    Ok(encoding)
}

/// One decoded line and its 1-based position in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: u64,
    pub text: String,
}

/// What a pull from [`LineSource`] can produce besides a line.
#[derive(Debug)]
pub enum LineError {
    /// The bytes of this line are invalid in the configured encoding.
    Undecodable(ParseError),
    /// The underlying stream failed; nothing more can be read.
    Stream(IngestError),
}

/// Lazy, finite, non-restartable sequence of lines.
///
/// Iteration ends with `None` once the stream is exhausted. A stream failure
/// is yielded once, after which the source is fused.
pub struct LineSource<R> {
    reader: R,
    encoding: &'static Encoding,
    buf: Vec<u8>,
    line_no: u64,
    done: bool,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R, encoding: &'static Encoding) -> Self {
        Self {
            reader,
            encoding,
            buf: Vec::with_capacity(256),
            line_no: 0,
            done: false,
        }
    }

    fn strip_newline(buf: &mut Vec<u8>) {
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = std::result::Result<Line, LineError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_no += 1;
                    Self::strip_newline(&mut self.buf);
                    if self.buf.is_empty() {
                        continue;
                    }
                    let (text, had_errors) =
                        self.encoding.decode_without_bom_handling(&self.buf);
                    if had_errors {
                        return Some(Err(LineError::Undecodable(ParseError::new(
                            format!("invalid byte sequence for {}", self.encoding.name()),
                            text.into_owned(),
                        ))));
                    }
                    let text = text.into_owned();
                    return Some(Ok(Line {
                        number: self.line_no,
                        text,
                    }));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(LineError::Stream(IngestError::malformed(format!(
                        "read failed after line {}: {e}",
                        self.line_no
                    )))));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines(bytes: &[u8], label: &str) -> Vec<std::result::Result<Line, LineError>> {
        LineSource::new(Cursor::new(bytes.to_vec()), resolve_encoding(label).unwrap()).collect()
    }

    #[test]
    fn strips_newlines_and_skips_empty_lines() {
        let out: Vec<String> = lines(b"a,1\r\n\n\r\nb,2", "utf-8")
            .into_iter()
            .map(|l| l.unwrap().text)
            .collect();
        assert_eq!(out, vec!["a,1", "b,2"]);
    }

    #[test]
    fn whitespace_only_lines_are_kept() {
        let out: Vec<(u64, String)> = lines(b"\t\t\n \nx\n", "utf-8")
            .into_iter()
            .map(|l| l.map(|l| (l.number, l.text)).unwrap())
            .collect();
        assert_eq!(
            out,
            vec![(1, "\t\t".to_string()), (2, " ".to_string()), (3, "x".to_string())]
        );
    }

    #[test]
    fn line_numbers_count_skipped_lines() {
        let out: Vec<u64> = lines(b"a\n\nb\n", "utf-8")
            .into_iter()
            .map(|l| l.unwrap().number)
            .collect();
        assert_eq!(out, vec![1, 3]);
    }

    #[test]
    fn decodes_latin1() {
        let out = lines(b"caf\xe9\n", "latin1");
        assert_eq!(out[0].as_ref().unwrap().text, "café");
    }

    #[test]
    fn invalid_utf8_is_a_per_line_error() {
        let out = lines(b"ok\n\xff\xfe\nok2\n", "utf-8");
        assert_eq!(out.len(), 3);
        assert!(matches!(out[1], Err(LineError::Undecodable(_))));
        assert_eq!(out[2].as_ref().unwrap().text, "ok2");
    }

    #[test]
    fn utf16_is_rejected() {
        assert!(matches!(
            resolve_encoding("utf-16le"),
            Err(IngestError::Configuration(_))
        ));
        assert!(resolve_encoding("no-such-charset").is_err());
    }
}
