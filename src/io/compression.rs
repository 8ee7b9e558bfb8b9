//! Decompression stage.
//!
//! Wraps a raw byte stream with the decoder selected by a [`CompressionMode`].
//! In [`CompressionMode::Auto`] the first bytes of the stream are peeked
//! (without being consumed) and matched against the magic bytes of every
//! registered codec; a stream with no match passes through unchanged.
//!
//! ## Built-in codecs
//!
//! - **Gzip** via `flate2` (always available; concatenated members are read
//!   as one stream)
//! - **Zstd** via `zstd` (feature: `compression-zstd`)
//! - **Bzip2** via `bzip2` (feature: `compression-bzip2`)
//! - **Xz** via `xz2` (feature: `compression-xz`)
//!
//! Additional codecs can be plugged in with [`register_codec`]; they take
//! part in auto-detection.
//!
//! ## Corruption
//!
//! Once a decoder is selected, its first buffer is filled eagerly. A stream
//! that claims to be compressed but is not fails right here with
//! [`IngestError::MalformedInput`], before any record is produced.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

/// Buffer size for the decompressed stream.
const READ_BUFFER: usize = 64 * 1024;

static CODEC_REGISTRY: RwLock<Vec<Arc<dyn DecompressionCodec>>> = RwLock::new(Vec::new());

/// How the input stream is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Bytes are read as-is.
    Plain,
    /// Bytes are gzip-decoded.
    Gzip,
    /// Peek at the magic bytes and decide.
    #[default]
    Auto,
    #[cfg(feature = "compression-zstd")]
    Zstd,
    #[cfg(feature = "compression-bzip2")]
    Bzip2,
    #[cfg(feature = "compression-xz")]
    Xz,
}

impl CompressionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMode::Plain => "plain",
            CompressionMode::Gzip => "gzip",
            CompressionMode::Auto => "auto",
            #[cfg(feature = "compression-zstd")]
            CompressionMode::Zstd => "zstd",
            #[cfg(feature = "compression-bzip2")]
            CompressionMode::Bzip2 => "bzip2",
            #[cfg(feature = "compression-xz")]
            CompressionMode::Xz => "xz",
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionMode {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "none" | "text" => Ok(CompressionMode::Plain),
            "gzip" | "gz" => Ok(CompressionMode::Gzip),
            "auto" => Ok(CompressionMode::Auto),
            #[cfg(feature = "compression-zstd")]
            "zstd" | "zst" => Ok(CompressionMode::Zstd),
            #[cfg(feature = "compression-bzip2")]
            "bzip2" | "bz2" => Ok(CompressionMode::Bzip2),
            #[cfg(feature = "compression-xz")]
            "xz" => Ok(CompressionMode::Xz),
            other => Err(IngestError::config(format!(
                "unsupported compression mode '{other}'"
            ))),
        }
    }
}

/// A pluggable input decoder.
///
/// Implementations are stored in a process-wide registry and may be used from
/// several ingestion threads at once.
pub trait DecompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip").
    fn name(&self) -> &str;

    /// Signature matched against the start of the stream in auto mode.
    fn magic_bytes(&self) -> &[u8];

    /// Wrap a buffered reader with decompression.
    fn wrap_reader(&self, reader: Box<dyn BufRead>) -> std::io::Result<Box<dyn Read>>;
}

/// Register an additional codec for auto-detection.
pub fn register_codec(codec: Arc<dyn DecompressionCodec>) {
    CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(codec);
}

fn builtin_codecs() -> Vec<Arc<dyn DecompressionCodec>> {
    vec![
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
    ]
}

fn all_codecs() -> Vec<Arc<dyn DecompressionCodec>> {
    let mut codecs = builtin_codecs();
    codecs.extend(
        CODEC_REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned(),
    );
    codecs
}

fn codec_named(name: &str) -> Option<Arc<dyn DecompressionCodec>> {
    builtin_codecs().into_iter().find(|c| c.name() == name)
}

/// Match the buffered head of `reader` against registered magic bytes.
///
/// The reader is not advanced.
fn detect_from_magic<R: BufRead>(reader: &mut R) -> Result<Option<Arc<dyn DecompressionCodec>>> {
    let head = reader.fill_buf()?;
    if head.is_empty() {
        return Ok(None);
    }
    Ok(all_codecs().into_iter().find(|codec| {
        let magic = codec.magic_bytes();
        !magic.is_empty() && head.starts_with(magic)
    }))
}

/// Wrap `reader` with `codec` and fill the first buffer so header corruption
/// surfaces immediately.
fn decode_with(codec: &dyn DecompressionCodec, reader: Box<dyn BufRead>) -> Result<Box<dyn BufRead>> {
    let decoder = codec.wrap_reader(reader).map_err(|e| {
        IngestError::malformed(format!("cannot open {} stream: {e}", codec.name()))
    })?;
    let mut buffered = BufReader::with_capacity(READ_BUFFER, decoder);
    buffered
        .fill_buf()
        .map_err(|e| IngestError::malformed(format!("corrupt {} stream: {e}", codec.name())))?;
    Ok(Box::new(buffered))
}

/// Apply the decompression stage to a raw byte stream.
///
/// # Errors
/// - [`IngestError::MalformedInput`] if the stream does not decode with the
///   selected codec.
/// - [`IngestError::Io`] if the raw stream cannot be read while peeking.
pub fn open_decompressed<R: Read + 'static>(
    reader: R,
    mode: CompressionMode,
) -> Result<Box<dyn BufRead>> {
    let mut raw = BufReader::with_capacity(READ_BUFFER, reader);
    let codec = match mode {
        CompressionMode::Plain => None,
        CompressionMode::Auto => detect_from_magic(&mut raw)?,
        explicit => Some(codec_named(explicit.as_str()).ok_or_else(|| {
            IngestError::config(format!("compression mode '{explicit}' has no decoder"))
        })?),
    };
    match codec {
        Some(codec) => {
            tracing::debug!(codec = codec.name(), "decompressing input");
            decode_with(codec.as_ref(), Box::new(raw))
        }
        None => Ok(Box::new(raw)),
    }
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

struct GzipCodec;

impl DecompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn magic_bytes(&self) -> &[u8] {
        &[0x1f, 0x8b]
    }

    fn wrap_reader(&self, reader: Box<dyn BufRead>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(flate2::bufread::MultiGzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl DecompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn magic_bytes(&self) -> &[u8] {
        &[0x28, 0xb5, 0x2f, 0xfd]
    }

    fn wrap_reader(&self, reader: Box<dyn BufRead>) -> std::io::Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::with_buffer(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl DecompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    // "BZh": the two-byte "BZ" prefix alone collides with ordinary text.
    fn magic_bytes(&self) -> &[u8] {
        b"BZh"
    }

    fn wrap_reader(&self, reader: Box<dyn BufRead>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(bzip2::bufread::MultiBzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl DecompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn magic_bytes(&self) -> &[u8] {
        &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]
    }

    fn wrap_reader(&self, reader: Box<dyn BufRead>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(xz2::bufread::XzDecoder::new_multi_decoder(reader)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(bytes).unwrap();
        enc.finish().unwrap()
    }

    fn read_all(mut r: Box<dyn BufRead>) -> String {
        let mut s = String::new();
        r.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn auto_detects_gzip_magic() {
        let r = open_decompressed(Cursor::new(gzip(b"a,1\n")), CompressionMode::Auto).unwrap();
        assert_eq!(read_all(r), "a,1\n");
    }

    #[test]
    fn auto_passes_plain_text_through() {
        let r = open_decompressed(Cursor::new(b"\x1fplain".to_vec()), CompressionMode::Auto).unwrap();
        assert_eq!(read_all(r), "\x1fplain");
    }

    #[test]
    fn explicit_gzip_on_plain_text_is_malformed() {
        let err = open_decompressed(Cursor::new(b"a,1\nb,2\n".to_vec()), CompressionMode::Gzip)
            .err()
            .expect("plain text must not decode as gzip");
        assert!(matches!(err, IngestError::MalformedInput(_)), "{err}");
    }

    #[test]
    fn unknown_mode_is_configuration_error() {
        let err = "lz4".parse::<CompressionMode>().unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
        assert_eq!("GZ".parse::<CompressionMode>().unwrap(), CompressionMode::Gzip);
    }
}
