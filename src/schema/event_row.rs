//! flowdelta.event_row.v1 schema definition
//!
//! The row shape produced by the event store's windowed query: one row per logged
//! action, timestamps as strings, the next-event link already computed upstream.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::{finite_or_zero, Event};

/// Current schema version
pub const SCHEMA_VERSION: &str = "flowdelta.event_row.v1";

/// Naive formats accepted besides RFC 3339; interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// One raw event row as delivered by the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventRow {
    #[serde(default, alias = "email", alias = "user_id")]
    pub user_identifier: Option<String>,
    #[serde(default, alias = "step")]
    pub step_label: Option<String>,
    #[serde(default, alias = "action")]
    pub action_label: Option<String>,
    /// Opaque payload
    #[serde(default)]
    pub detail: serde_json::Value,
    #[serde(default, alias = "ts", alias = "timestamp")]
    pub occurred_at: Option<String>,
    #[serde(default, alias = "next_ts")]
    pub next_occurred_at: Option<String>,
    /// Number or numeric string; anything else coerces to zero
    #[serde(default, alias = "dur_to_next_sec")]
    pub duration_to_next_seconds: Option<serde_json::Value>,
    #[serde(default, alias = "prev_step")]
    pub prev_step_label: Option<String>,
    #[serde(default, alias = "next_step")]
    pub next_step_label: Option<String>,
}

impl EventRow {
    /// Materialize the row into an [`Event`].
    ///
    /// A missing or unparseable `occurred_at`, or an unparseable `next_occurred_at`,
    /// fails with [`ComputeError::MalformedTimestamp`].
    pub fn to_event(&self) -> Result<Event, ComputeError> {
        let occurred_at = match self.occurred_at.as_deref() {
            Some(raw) => parse_timestamp("occurred_at", raw)?,
            None => return Err(ComputeError::malformed_timestamp("occurred_at", "")),
        };
        let next_occurred_at = self
            .next_occurred_at
            .as_deref()
            .map(|raw| parse_timestamp("next_occurred_at", raw))
            .transpose()?;

        Ok(Event {
            user_identifier: non_blank(&self.user_identifier),
            step_label: non_blank(&self.step_label),
            action_label: non_blank(&self.action_label),
            detail: self.detail.clone(),
            occurred_at,
            next_occurred_at,
            duration_to_next_seconds: self.duration_to_next_seconds.as_ref().map(coerce_number),
            prev_step_label: self.prev_step_label.clone(),
            next_step_label: self.next_step_label.clone(),
        })
    }
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        EventRow {
            user_identifier: event.user_identifier.clone(),
            step_label: event.step_label.clone(),
            action_label: event.action_label.clone(),
            detail: event.detail.clone(),
            occurred_at: Some(event.occurred_at.to_rfc3339()),
            next_occurred_at: event.next_occurred_at.map(|t| t.to_rfc3339()),
            duration_to_next_seconds: event
                .duration_to_next_seconds
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number),
            prev_step_label: event.prev_step_label.clone(),
            next_step_label: event.next_step_label.clone(),
        }
    }
}

/// Parse an ISO-ish timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD[ T]HH:MM[:SS[.fff]]` (UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, ComputeError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }

    Err(ComputeError::malformed_timestamp(field, raw))
}

/// Loose numeric read of a JSON value: numbers and numeric strings, else zero
fn coerce_number(value: &serde_json::Value) -> f64 {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    finite_or_zero(number)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|v| !v.trim().is_empty())
        .cloned()
}
