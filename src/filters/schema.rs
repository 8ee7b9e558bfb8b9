//! Schema binder: zips column names onto positional rows.

use crate::error::{IngestError, ParseError, Result};
use crate::parse::Row;
use crate::value::{Record, Value};

#[derive(Debug, Clone)]
pub struct SchemaBinder {
    columns: Option<Vec<String>>,
    header_pending: bool,
}

impl SchemaBinder {
    /// Build a binder from an explicit column list and/or a header flag.
    ///
    /// When both are given the header row is consumed and discarded in favour
    /// of the explicit columns.
    ///
    /// # Errors
    /// [`IngestError::Configuration`] if neither is supplied.
    pub fn new(columns: Option<Vec<String>>, header: bool) -> Result<Self> {
        if columns.is_none() && !header {
            return Err(IngestError::config("column header or column list required"));
        }
        Ok(Self {
            columns,
            header_pending: header,
        })
    }

    /// Bind one row.
    ///
    /// Returns `Ok(None)` when the row was consumed as the header. Rows that
    /// already carry names pass through unchanged.
    pub fn bind(&mut self, row: Row) -> std::result::Result<Option<Record>, ParseError> {
        let values: Vec<Value> = match row {
            Row::Record(record) => return Ok(Some(record)),
            Row::Fields(fields) => fields.into_iter().map(Value::String).collect(),
            Row::Values(values) => values,
        };

        if self.header_pending {
            self.header_pending = false;
            if self.columns.is_none() {
                self.columns = Some(values.iter().map(Value::to_string).collect());
            }
            return Ok(None);
        }

        let Some(columns) = &self.columns else {
            return Err(ParseError::new(
                "column header or column list required",
                serde_json::to_string(&values).unwrap_or_default(),
            ));
        };
        if columns.len() != values.len() {
            return Err(ParseError::new(
                format!(
                    "column count mismatch: expected {}, got {}",
                    columns.len(),
                    values.len()
                ),
                serde_json::to_string(&values).unwrap_or_default(),
            ));
        }
        Ok(Some(columns.iter().cloned().zip(values).collect()))
    }
}
