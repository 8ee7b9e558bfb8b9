//! Chunk buffers and the record encoding shared with the remote service.
//!
//! A [`Chunk`] streams MessagePack-encoded records through a gzip encoder into
//! a spooled temporary file: it stays in memory up to the spill threshold and
//! moves to disk beyond it. Finishing a chunk yields a [`ClosedChunk`] that
//! can be rewound and re-read for every upload attempt.

use crate::value::{Record, Value};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use tempfile::SpooledTempFile;

/// Why a record could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// An integer lies outside `[i64::MIN, u64::MAX]`.
    #[error("integer {0} exceeds 64 bits")]
    IntegerOutOfRange(i128),
    /// A container is too large for a MessagePack length prefix.
    #[error("container of {0} entries is too large")]
    TooLarge(usize),
    #[error("write failed: {0}")]
    Write(String),
}

fn write_err<E: fmt::Display>(e: E) -> EncodeError {
    EncodeError::Write(e.to_string())
}

fn len_u32(n: usize) -> Result<u32, EncodeError> {
    u32::try_from(n).map_err(|_| EncodeError::TooLarge(n))
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), EncodeError> {
    match value {
        Value::Null => rmp::encode::write_nil(buf).map_err(write_err),
        Value::Bool(b) => rmp::encode::write_bool(buf, *b).map_err(write_err),
        Value::Integer(n) => {
            if let Ok(u) = u64::try_from(*n) {
                rmp::encode::write_uint(buf, u).map(drop).map_err(write_err)
            } else if let Ok(i) = i64::try_from(*n) {
                rmp::encode::write_sint(buf, i).map(drop).map_err(write_err)
            } else {
                Err(EncodeError::IntegerOutOfRange(*n))
            }
        }
        Value::Float(x) => rmp::encode::write_f64(buf, *x).map_err(write_err),
        Value::String(s) => rmp::encode::write_str(buf, s).map_err(write_err),
        Value::Array(items) => {
            rmp::encode::write_array_len(buf, len_u32(items.len())?).map_err(write_err)?;
            items.iter().try_for_each(|item| encode_value(buf, item))
        }
        Value::Map(record) => encode_map(buf, record),
    }
}

fn encode_map(buf: &mut Vec<u8>, record: &Record) -> Result<(), EncodeError> {
    rmp::encode::write_map_len(buf, len_u32(record.len())?).map_err(write_err)?;
    for (key, value) in record.iter() {
        rmp::encode::write_str(buf, key).map_err(write_err)?;
        encode_value(buf, value)?;
    }
    Ok(())
}

/// Encode `record` as one MessagePack map, replacing the contents of `buf`.
///
/// On error `buf` holds a partial encoding and must not be used.
pub fn encode_record(record: &Record, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    buf.clear();
    encode_map(buf, record)
}

/// The open chunk owned by the record sink.
pub struct Chunk {
    encoder: GzEncoder<SpooledTempFile>,
    first_record: u64,
    records: u64,
    uncompressed: u64,
}

impl Chunk {
    /// Open an empty chunk whose first record has index `first_record`.
    pub fn new(first_record: u64, spill_threshold: usize) -> Self {
        Self {
            encoder: GzEncoder::new(SpooledTempFile::new(spill_threshold), Compression::default()),
            first_record,
            records: 0,
            uncompressed: 0,
        }
    }

    /// Append one encoded record.
    pub fn append(&mut self, encoded: &[u8]) -> io::Result<()> {
        self.encoder.write_all(encoded)?;
        self.records += 1;
        self.uncompressed += encoded.len() as u64;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn first_record(&self) -> u64 {
        self.first_record
    }

    /// Bytes appended so far, before compression.
    pub fn uncompressed_len(&self) -> u64 {
        self.uncompressed
    }

    /// Finalize compression and close the chunk.
    pub fn finish(self) -> io::Result<ClosedChunk> {
        let mut file = self.encoder.finish()?;
        let len = file.seek(SeekFrom::End(0))?;
        file.rewind()?;
        Ok(ClosedChunk {
            file,
            len,
            first_record: self.first_record,
            records: self.records,
            uncompressed: self.uncompressed,
        })
    }
}

/// A finalized chunk ready for upload.
pub struct ClosedChunk {
    file: SpooledTempFile,
    len: u64,
    first_record: u64,
    records: u64,
    uncompressed: u64,
}

impl ClosedChunk {
    /// Compressed length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn uncompressed_len(&self) -> u64 {
        self.uncompressed
    }

    pub fn first_record(&self) -> u64 {
        self.first_record
    }

    /// Index of the last record (inclusive).
    pub fn last_record(&self) -> u64 {
        (self.first_record + self.records).saturating_sub(1)
    }

    /// Seek back to the start and return the compressed body.
    pub fn rewound_body(&mut self) -> io::Result<&mut dyn Read> {
        self.file.rewind()?;
        Ok(&mut self.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use flate2::read::GzDecoder;

    #[test]
    fn integers_use_the_smallest_signedness_that_fits() {
        let mut buf = Vec::new();
        encode_record(&record! { "a" => u64::MAX, "b" => i64::MIN }, &mut buf).unwrap();
        let value = rmpv::decode::read_value(&mut buf.as_slice()).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map[0].1.as_u64(), Some(u64::MAX));
        assert_eq!(map[1].1.as_i64(), Some(i64::MIN));
    }

    #[test]
    fn out_of_range_integer_is_reported() {
        let mut buf = Vec::new();
        let r = record! { "big" => Value::Integer(1i128 << 70) };
        assert_eq!(
            encode_record(&r, &mut buf),
            Err(EncodeError::IntegerOutOfRange(1i128 << 70))
        );
    }

    #[test]
    fn encode_failure_is_its_own_ingest_error() {
        let err = crate::IngestError::from(EncodeError::TooLarge(1 << 33));
        assert!(matches!(err, crate::IngestError::Encode(EncodeError::TooLarge(_))));
        assert_eq!(
            err.to_string(),
            "record encoding failed: container of 8589934592 entries is too large"
        );
    }

    #[test]
    fn finished_chunk_is_gzip_of_appended_bytes() {
        let mut chunk = Chunk::new(7, 1024);
        chunk.append(b"abc").unwrap();
        chunk.append(b"def").unwrap();
        assert_eq!(chunk.uncompressed_len(), 6);
        let mut closed = chunk.finish().unwrap();
        assert_eq!(closed.first_record(), 7);
        assert_eq!(closed.last_record(), 8);

        for _ in 0..2 {
            let mut out = String::new();
            GzDecoder::new(closed.rewound_body().unwrap())
                .read_to_string(&mut out)
                .unwrap();
            assert_eq!(out, "abcdef");
        }
    }
}
