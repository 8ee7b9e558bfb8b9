//! Type coercion through the public pipeline.

use ironload::filters::RecordFilter;
use ironload::filters::coerce::CoerceFilter;
use ironload::testing::*;
use ironload::*;
use std::io::Cursor;

fn default_filter() -> CoerceFilter {
    let config = IngestConfig::default();
    CoerceFilter::new(&config.null_pattern, &config.true_pattern, &config.false_pattern)
        .expect("default patterns compile")
}

#[test]
fn test_coercion_is_idempotent() -> anyhow::Result<()> {
    let filter = default_filter();
    let record = record! {
        "a" => "12",
        "b" => "007",
        "c" => "TRUE",
        "d" => "\\N",
        "e" => "1e5",
        "f" => 3.5,
        "g" => "-",
    };

    let once = filter.apply(record)?;
    let twice = filter.apply(once.clone())?;

    assert_eq!(once, twice);
    assert_eq!(once.get("a"), Some(&Value::Integer(12)));
    assert_eq!(once.get("b"), Some(&Value::from("007")));
    assert_eq!(once.get("c"), Some(&Value::Bool(true)));
    assert_eq!(once.get("d"), Some(&Value::Null));
    assert_eq!(once.get("e"), Some(&Value::from("1e5")));
    assert_eq!(once.get("g"), Some(&Value::Null));
    Ok(())
}

#[test]
fn test_custom_patterns_and_all_string() -> anyhow::Result<()> {
    let input = "yes,no,N/A,42\n";

    let writer = MemoryTableWriter::new();
    let config = IngestConfig::new(Format::Csv)
        .with_columns(["t", "f", "n", "i"])
        .with_patterns("^N/A$", "^yes$", "^no$")
        .with_time_value(0);
    ingest(Cursor::new(input.as_bytes().to_vec()), &config, &mut ErrorCollector::new(), &writer)?;
    assert_eq!(
        writer.records()?[0],
        record! { "t" => true, "f" => false, "n" => Value::Null, "i" => 42, "time" => 0 }
    );

    let writer = MemoryTableWriter::new();
    let config = config.with_all_string(true);
    ingest(Cursor::new(input.as_bytes().to_vec()), &config, &mut ErrorCollector::new(), &writer)?;
    assert_eq!(writer.records()?[0].get("i"), Some(&Value::from("42")));
    Ok(())
}

#[test]
fn test_json_strings_are_not_coerced() -> anyhow::Result<()> {
    let writer = MemoryTableWriter::new();
    let config = IngestConfig::new(Format::Json).with_time_value(0);

    ingest(
        Cursor::new(br#"{"zip":"02134","flag":"true","n":"5"}"#.to_vec()),
        &config,
        &mut ErrorCollector::new(),
        &writer,
    )?;

    let record = &writer.records()?[0];
    assert_eq!(record.get("flag"), Some(&Value::from("true")));
    assert_eq!(record.get("n"), Some(&Value::from("5")));
    Ok(())
}

#[test]
fn test_invalid_pattern_is_a_configuration_error() {
    let config = IngestConfig::new(Format::Csv)
        .with_columns(["a"])
        .with_patterns("(", "^t$", "^f$");
    let err = plan(&config).unwrap_err();
    assert!(matches!(err, IngestError::Configuration(ref m) if m.contains("null pattern")));
}
