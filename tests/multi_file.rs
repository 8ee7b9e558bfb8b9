//! Multi-file runs, input expansion and configuration files.

use ironload::testing::*;
use ironload::*;

#[test]
fn test_expand_inputs_sorts_and_dedups() -> anyhow::Result<()> {
    let inputs = TempInputs::new()?;
    let b = inputs.write("b.csv", SAMPLE_CSV)?;
    let a = inputs.write("a.csv", SAMPLE_CSV)?;
    inputs.write("notes.txt", "ignored")?;

    let pattern = format!("{}/*.csv", inputs.path().display());
    let literal = a.display().to_string();
    let files = expand_inputs(&[pattern.as_str(), literal.as_str()])?;

    assert_eq!(files, vec![a, b]);
    Ok(())
}

#[test]
fn test_expand_inputs_rejects_unmatched_argument() -> anyhow::Result<()> {
    let inputs = TempInputs::new()?;
    let pattern = format!("{}/*.jsonl", inputs.path().display());
    assert!(expand_inputs(&[pattern]).is_err());
    Ok(())
}

#[test]
fn test_ingest_files_continues_after_a_failed_file() -> anyhow::Result<()> {
    let inputs = TempInputs::new()?;
    let good = inputs.write("good.csv", SAMPLE_CSV)?;
    let empty = inputs.write("empty.csv", "\n\n")?;
    let missing = inputs.path().join("missing.csv");
    let partial = inputs.write("partial.csv", "c,3\nbroken\n")?;

    let writer = MemoryTableWriter::new();
    let config = IngestConfig::new(Format::Csv)
        .with_columns(["name", "num"])
        .with_time_value(1000);
    let outcomes = ingest_files(&[&good, &empty, &missing, &partial], &config, &writer);

    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0].result.as_ref().map(|r| r.accepted).ok(), Some(2));
    assert!(matches!(outcomes[1].result, Err(IngestError::EmptyInput)));
    assert!(matches!(outcomes[2].result, Err(IngestError::Io(_))));
    assert!(outcomes[3].is_ok());
    assert_eq!(outcomes[3].errors.error_count(), 1);
    assert_eq!(outcomes[3].path, partial);
    assert_eq!(writer.records()?.len(), 3);
    Ok(())
}

#[cfg(feature = "parallel-io")]
#[test]
fn test_ingest_files_par_keeps_input_order() -> anyhow::Result<()> {
    let inputs = TempInputs::new()?;
    let paths = (0..6)
        .map(|i| inputs.write(&format!("part{i}.jsonl"), format!("{{\"time\":{i}}}\n")))
        .collect::<std::io::Result<Vec<_>>>()?;

    let writer = MemoryTableWriter::new();
    let config = IngestConfig::new(Format::Json);
    let outcomes = ingest_files_par(&paths, &config, &writer, Some(3))?;

    assert_eq!(outcomes.len(), 6);
    for (outcome, path) in outcomes.iter().zip(&paths) {
        assert_eq!(&outcome.path, path);
        assert!(outcome.is_ok());
    }
    let mut times: Vec<_> = writer
        .records()?
        .iter()
        .filter_map(|r| r.get("time").and_then(Value::as_integer))
        .collect();
    times.sort_unstable();
    assert_eq!(times, [0, 1, 2, 3, 4, 5]);
    Ok(())
}

#[test]
fn test_format_is_guessed_from_the_path() -> anyhow::Result<()> {
    let inputs = TempInputs::new()?;
    let path = inputs.write("events.jsonl.gz", gzip_bytes(SAMPLE_JSONL.as_bytes()))?;

    let config = IngestConfig::for_path(&path)?.with_time_column("ts");
    assert_eq!(config.format, Format::Json);

    let writer = MemoryTableWriter::new();
    let report = ingest_path(&path, &config, &mut LogErrorSink::new(), &writer)?;
    assert_eq!(report.accepted, 2);

    assert!(IngestConfig::for_path("data.parquet").is_err());
    Ok(())
}

#[test]
fn test_config_loads_from_json_file() -> anyhow::Result<()> {
    let inputs = TempInputs::new()?;
    let path = inputs.write(
        "ingest.json",
        r#"{
            "format": "tsv",
            "columns": ["host", "bytes"],
            "time_value": 1700000000,
            "compression": "gzip",
            "chunk_size": 4096,
            "retry": { "max_attempts": 2 }
        }"#,
    )?;

    let config = IngestConfig::from_json_file(&path)?;

    assert_eq!(config.format, Format::Tsv);
    assert_eq!(config.columns.as_deref(), Some(&["host".to_string(), "bytes".to_string()][..]));
    assert_eq!(config.compression, CompressionMode::Gzip);
    assert_eq!(config.chunk_size, 4096);
    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.retry.initial_delay_ms, RetryConfig::default().initial_delay_ms);
    assert_eq!(config.time_mode()?, TimeMode::Fixed(1_700_000_000));
    Ok(())
}

#[test]
fn test_invalid_config_file_is_rejected() {
    assert!(IngestConfig::from_json_str(r#"{"format":"xml"}"#).is_err());
    assert!(IngestConfig::from_json_str(r#"{"format":"csv","delimeter":","}"#).is_err());
    assert!(IngestConfig::from_json_str(r#"{"format":"csv"}"#).is_err());
    assert!(IngestConfig::from_json_str(r#"{"format":"json","chunk_size":0}"#).is_err());
}
