//! Input decompression as seen from a full run.

use ironload::testing::*;
use ironload::*;
use std::io::{BufRead, Cursor, Read};
use std::sync::Arc;

fn csv_config() -> IngestConfig {
    IngestConfig::new(Format::Csv)
        .with_columns(["name", "num"])
        .with_time_value(1000)
}

#[test]
fn test_plain_mode_does_not_sniff() {
    // Gzip bytes read as plain text: every line is garbage, nothing is accepted.
    let writer = MemoryTableWriter::new();
    let config = IngestConfig::new(Format::Json).with_compression(CompressionMode::Plain);
    let mut errors = ErrorCollector::new();

    let result = ingest(
        Cursor::new(gzip_bytes(SAMPLE_JSONL.as_bytes())),
        &config,
        &mut errors,
        &writer,
    );

    assert!(matches!(result, Err(IngestError::EmptyInput)));
    assert!(errors.error_count() > 0);
    assert_eq!(writer.chunk_count(), 0);
}

#[test]
fn test_concatenated_gzip_members() -> anyhow::Result<()> {
    let mut bytes = gzip_bytes(b"a,1\n");
    bytes.extend(gzip_bytes(b"b,2\n"));

    let writer = MemoryTableWriter::new();
    let report = ingest(Cursor::new(bytes), &csv_config(), &mut ErrorCollector::new(), &writer)?;

    assert_eq!(report.accepted, 2);
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn test_zstd_is_detected() -> anyhow::Result<()> {
    let bytes = zstd::encode_all(SAMPLE_CSV.as_bytes(), 0)?;

    let writer = MemoryTableWriter::new();
    let report = ingest(Cursor::new(bytes), &csv_config(), &mut ErrorCollector::new(), &writer)?;

    assert_eq!(report.accepted, 2);
    Ok(())
}

struct PrefixCodec;

impl DecompressionCodec for PrefixCodec {
    fn name(&self) -> &str {
        "prefix"
    }

    fn magic_bytes(&self) -> &[u8] {
        b"PFX1"
    }

    fn wrap_reader(&self, mut reader: Box<dyn BufRead>) -> std::io::Result<Box<dyn Read>> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        Ok(Box::new(reader))
    }
}

#[test]
fn test_registered_codec_is_used_by_auto_mode() -> anyhow::Result<()> {
    register_codec(Arc::new(PrefixCodec));

    let writer = MemoryTableWriter::new();
    let input = format!("PFX1{SAMPLE_CSV}");
    let report = ingest(
        Cursor::new(input.into_bytes()),
        &csv_config(),
        &mut ErrorCollector::new(),
        &writer,
    )?;

    assert_eq!(report.accepted, 2);
    assert_eq!(writer.records()?[0].get("name"), Some(&Value::from("a")));
    Ok(())
}

#[test]
fn test_unknown_mode_name_is_rejected() {
    let err = "lz4".parse::<CompressionMode>().unwrap_err();
    assert!(matches!(err, IngestError::Configuration(_)));
}
