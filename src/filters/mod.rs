//! Record-level stages that run after parsing.
//!
//! The [`SchemaBinder`](schema::SchemaBinder) names positional rows; the
//! remaining stages implement [`RecordFilter`] and transform one named record
//! at a time.

pub mod coerce;
pub mod schema;
pub mod time;

use crate::error::ParseError;
use crate::value::Record;

/// A stage that transforms or rejects one record.
pub trait RecordFilter {
    /// Stage name shown in pipeline descriptions.
    fn name(&self) -> &'static str;

    /// Transform `record`, or reject it with a [`ParseError`].
    fn apply(&self, record: Record) -> Result<Record, ParseError>;
}
