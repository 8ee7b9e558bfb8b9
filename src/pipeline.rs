//! Pipeline planning and assembly.
//!
//! A run is described first as a list of [`StageSpec`]s derived from the
//! configuration ([`plan`]), then turned into one pull-based iterator
//! ([`assemble`]). Nothing is read from the input until the returned
//! [`RecordStream`] is polled, except the few bytes needed to sniff and
//! verify compression.

use crate::config::{Format, IngestConfig, TimeMode};
use crate::error::{IngestError, ParseError, Reject, Result};
use crate::filters::RecordFilter;
use crate::filters::coerce::CoerceFilter;
use crate::filters::schema::SchemaBinder;
use crate::filters::time::TimeFilter;
use crate::io::compression::{CompressionMode, open_decompressed};
use crate::io::lines::{LineError, LineSource, resolve_encoding};
use crate::parse::delimited::DelimitedParser;
use crate::parse::jsonl::JsonLineParser;
use crate::parse::msgpack::MsgpackSource;
use crate::parse::regex_log::RegexLogParser;
use crate::parse::{LineParser, Row};
use crate::value::Record;
use std::io::{BufRead, BufReader, Read};

// ============================================================================
// Stage descriptors
// ============================================================================

/// Which record parser a pipeline uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserSpec {
    Delimited { pattern: String },
    Json,
    Msgpack,
    Apache,
    Syslog,
}

impl ParserSpec {
    pub fn name(&self) -> &'static str {
        match self {
            ParserSpec::Delimited { .. } => "delimited",
            ParserSpec::Json => "json",
            ParserSpec::Msgpack => "msgpack",
            ParserSpec::Apache => "apache",
            ParserSpec::Syslog => "syslog",
        }
    }

    fn line_parser(&self) -> Result<Box<dyn LineParser>> {
        Ok(match self {
            ParserSpec::Delimited { pattern } => Box::new(DelimitedParser::new(pattern)?),
            ParserSpec::Json => Box::new(JsonLineParser),
            ParserSpec::Apache => Box::new(RegexLogParser::apache()),
            ParserSpec::Syslog => Box::new(RegexLogParser::syslog()),
            ParserSpec::Msgpack => {
                return Err(IngestError::config("msgpack is not a line-oriented format"));
            }
        })
    }
}

/// One stage of a planned pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum StageSpec {
    Decompress(CompressionMode),
    Lines {
        encoding: String,
    },
    Parse(ParserSpec),
    Bind {
        columns: Option<Vec<String>>,
        header: bool,
    },
    Coerce {
        null: String,
        true_: String,
        false_: String,
    },
    Time {
        mode: TimeMode,
        reference_year: i32,
    },
}

impl StageSpec {
    pub fn name(&self) -> &'static str {
        match self {
            StageSpec::Decompress(_) => "decompress",
            StageSpec::Lines { .. } => "lines",
            StageSpec::Parse(_) => "parse",
            StageSpec::Bind { .. } => "bind",
            StageSpec::Coerce { .. } => "coerce",
            StageSpec::Time { .. } => "time",
        }
    }
}

/// Derive the stage list for `config`.
///
/// # Errors
/// [`IngestError::Configuration`] if the configuration does not validate.
pub fn plan(config: &IngestConfig) -> Result<Vec<StageSpec>> {
    config.validate()?;

    let parser = match config.format {
        Format::Csv | Format::Tsv => ParserSpec::Delimited {
            pattern: config.delimiter_pattern().to_string(),
        },
        Format::Json => ParserSpec::Json,
        Format::Msgpack => ParserSpec::Msgpack,
        Format::Apache => ParserSpec::Apache,
        Format::Syslog => ParserSpec::Syslog,
    };

    let mut stages = vec![StageSpec::Decompress(config.compression)];
    if parser != ParserSpec::Msgpack {
        stages.push(StageSpec::Lines {
            encoding: config.encoding.clone(),
        });
    }
    stages.push(StageSpec::Parse(parser));

    let renames_arrays =
        config.format == Format::Msgpack && (config.columns.is_some() || config.column_header);
    if config.format.is_positional() || renames_arrays {
        stages.push(StageSpec::Bind {
            columns: config.columns.clone(),
            header: config.column_header,
        });
    }

    let text_fields = matches!(
        config.format,
        Format::Csv | Format::Tsv | Format::Apache | Format::Syslog
    );
    if text_fields && !config.all_string {
        stages.push(StageSpec::Coerce {
            null: config.null_pattern.clone(),
            true_: config.true_pattern.clone(),
            false_: config.false_pattern.clone(),
        });
    }

    stages.push(StageSpec::Time {
        mode: config.time_mode()?,
        reference_year: config.reference_year,
    });
    Ok(stages)
}

/// Stage names in order, for logging and tests.
pub fn describe(stages: &[StageSpec]) -> Vec<&'static str> {
    stages.iter().map(StageSpec::name).collect()
}

// ============================================================================
// Assembly
// ============================================================================

type RowIter = Box<dyn Iterator<Item = std::result::Result<Row, Reject>>>;

enum Source {
    Raw(Box<dyn Read>),
    Bytes(Box<dyn BufRead>),
    Lines(LineSource<Box<dyn BufRead>>),
    Rows(RowIter),
}

impl Source {
    fn into_bytes(self) -> Option<Box<dyn BufRead>> {
        match self {
            Source::Raw(raw) => Some(Box::new(BufReader::new(raw))),
            Source::Bytes(bytes) => Some(bytes),
            Source::Lines(_) | Source::Rows(_) => None,
        }
    }
}

fn out_of_order(stage: &StageSpec) -> IngestError {
    IngestError::config(format!("stage '{}' is out of order", stage.name()))
}

/// Build the record iterator for `stages` over `reader`.
///
/// # Errors
/// - [`IngestError::Configuration`] if the stages are not in a valid order or
///   a stage cannot be built.
/// - [`IngestError::MalformedInput`] if the input fails its compression check.
pub fn assemble<R: Read + 'static>(reader: R, stages: &[StageSpec]) -> Result<RecordStream> {
    let mut source = Source::Raw(Box::new(reader));
    let mut binder = None;
    let mut filters: Vec<Box<dyn RecordFilter>> = Vec::new();

    for stage in stages {
        source = match (stage, source) {
            (StageSpec::Decompress(mode), Source::Raw(raw)) => {
                Source::Bytes(open_decompressed(raw, *mode)?)
            }
            (StageSpec::Lines { encoding }, src) => {
                let encoding = resolve_encoding(encoding)?;
                let bytes = src.into_bytes().ok_or_else(|| out_of_order(stage))?;
                Source::Lines(LineSource::new(bytes, encoding))
            }
            (StageSpec::Parse(ParserSpec::Msgpack), src) => {
                let bytes = src.into_bytes().ok_or_else(|| out_of_order(stage))?;
                Source::Rows(Box::new(MsgpackSource::new(bytes)))
            }
            (StageSpec::Parse(spec), Source::Lines(lines)) => {
                let parser = spec.line_parser()?;
                Source::Rows(Box::new(lines.map(move |line| match line {
                    Ok(line) => parser.parse(&line.text).map_err(Reject::Skip),
                    Err(LineError::Undecodable(e)) => Err(Reject::Skip(e)),
                    Err(LineError::Stream(e)) => Err(Reject::Fatal(e)),
                })))
            }
            (StageSpec::Bind { columns, header }, rows @ Source::Rows(_))
                if binder.is_none() && filters.is_empty() =>
            {
                binder = Some(SchemaBinder::new(columns.clone(), *header)?);
                rows
            }
            (StageSpec::Coerce { null, true_, false_ }, rows @ Source::Rows(_)) => {
                filters.push(Box::new(CoerceFilter::new(null, true_, false_)?));
                rows
            }
            (
                StageSpec::Time {
                    mode,
                    reference_year,
                },
                rows @ Source::Rows(_),
            ) => {
                filters.push(Box::new(TimeFilter::new(mode.clone(), *reference_year)));
                rows
            }
            _ => return Err(out_of_order(stage)),
        };
    }

    let Source::Rows(rows) = source else {
        return Err(IngestError::config("pipeline has no parse stage"));
    };
    Ok(RecordStream {
        rows,
        binder,
        filters,
        done: false,
    })
}

/// The assembled pipeline: yields records, skippable rejects, and at most one
/// fatal error, after which it is exhausted.
pub struct RecordStream {
    rows: RowIter,
    binder: Option<SchemaBinder>,
    filters: Vec<Box<dyn RecordFilter>>,
    done: bool,
}

impl RecordStream {
    /// Names of the record filters in the order they run.
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    fn name_row(&mut self, row: Row) -> std::result::Result<Option<Record>, ParseError> {
        match (&mut self.binder, row) {
            (Some(binder), row) => binder.bind(row),
            (None, Row::Record(record)) => Ok(Some(record)),
            (None, positional) => Err(ParseError::new(
                "column header or column list required",
                positional.to_json_string(),
            )),
        }
    }
}

impl Iterator for RecordStream {
    type Item = std::result::Result<Record, Reject>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let row = match self.rows.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Ok(row)) => row,
                Some(Err(Reject::Fatal(e))) => {
                    self.done = true;
                    return Some(Err(Reject::Fatal(e)));
                }
                Some(Err(skip)) => return Some(Err(skip)),
            };
            let record = match self.name_row(row) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => return Some(Err(Reject::Skip(e))),
            };
            let filtered = self
                .filters
                .iter()
                .try_fold(record, |record, filter| filter.apply(record));
            return Some(filtered.map_err(Reject::Skip));
        }
        None
    }
}

impl std::iter::FusedIterator for RecordStream {}
