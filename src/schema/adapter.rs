//! Adapter for converting event rows into [`Event`] values

use crate::error::ComputeError;
use crate::schema::event_row::EventRow;
use crate::types::Event;

/// Adapter for parsing and materializing event rows
pub struct EventRowAdapter;

impl EventRowAdapter {
    /// Parse a JSON string containing an array of rows
    pub fn parse_array(json: &str) -> Result<Vec<EventRow>, ComputeError> {
        let rows: Vec<EventRow> = serde_json::from_str(json)?;
        Ok(rows)
    }

    /// Parse NDJSON (newline-delimited JSON) containing one row per line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<EventRow>, ComputeError> {
        let mut rows = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<EventRow>(trimmed) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(rows)
    }

    /// Materialize every row, failing on the first malformed one
    pub fn to_events(rows: &[EventRow]) -> Result<Vec<Event>, ComputeError> {
        rows.iter().map(EventRow::to_event).collect()
    }

    /// Check every row and report the ones that would fail to materialize
    pub fn validate_rows(rows: &[EventRow]) -> Vec<RowValidation> {
        rows.iter()
            .enumerate()
            .filter_map(|(index, row)| {
                row.to_event().err().map(|error| RowValidation {
                    index,
                    user_identifier: row.user_identifier.clone(),
                    error: error.to_string(),
                })
            })
            .collect()
    }
}

/// A row that failed validation
#[derive(Debug, Clone)]
pub struct RowValidation {
    pub index: usize,
    pub user_identifier: Option<String>,
    pub error: String,
}
