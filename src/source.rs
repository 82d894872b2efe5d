//! Event sources
//!
//! The engine never talks to the event store itself. An [`EventSource`] stands in for
//! it: given a variant and a query it returns that variant's materialized events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::thread;

use crate::error::ComputeError;
use crate::schema::EventRowAdapter;
use crate::types::{Event, Variant};

/// Already-parsed query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    /// Inclusive lower bound on `occurred_at`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `occurred_at`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    /// Exact-match user identifier; `"unknown"` selects events without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl EventQuery {
    /// Whether an event falls inside the query window and matches the user filter
    pub fn matches(&self, event: &Event) -> bool {
        if self.from.is_some_and(|from| event.occurred_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| event.occurred_at > to) {
            return false;
        }
        match &self.user {
            Some(user) => event.user() == user,
            None => true,
        }
    }
}

/// Supplier of one variant's events
pub trait EventSource {
    fn fetch(&self, variant: Variant, query: &EventQuery) -> Result<Vec<Event>, ComputeError>;
}

/// Fetch both variants concurrently and join the results.
///
/// Each side's failure is reported as [`ComputeError::UpstreamFailure`] tagged with
/// its variant; if either side fails the whole fetch fails. When both fail, the one
/// returned error carries both variants and both messages.
pub fn fetch_both<S>(
    source: &S,
    query: &EventQuery,
) -> Result<(Vec<Event>, Vec<Event>), ComputeError>
where
    S: EventSource + Sync + ?Sized,
{
    let (as_is, to_be) = thread::scope(|scope| {
        let as_is = scope.spawn(|| source.fetch(Variant::AsIs, query));
        let to_be = scope.spawn(|| source.fetch(Variant::ToBe, query));
        (join_fetch(Variant::AsIs, as_is), join_fetch(Variant::ToBe, to_be))
    });

    if let Err(e) = &as_is {
        log::warn!("{} fetch failed: {}", Variant::AsIs, e);
    }
    if let Err(e) = &to_be {
        log::warn!("{} fetch failed: {}", Variant::ToBe, e);
    }

    match (as_is, to_be) {
        (Ok(as_is), Ok(to_be)) => {
            log::debug!(
                "fetched {} as_is and {} to_be events",
                as_is.len(),
                to_be.len()
            );
            Ok((as_is, to_be))
        }
        (Err(as_is), Err(to_be)) => Err(ComputeError::UpstreamFailure {
            variant: format!("{},{}", Variant::AsIs, Variant::ToBe),
            message: format!("{}; {}", describe_failure(&as_is), describe_failure(&to_be)),
        }),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
    }
}

/// `variant: message` for an upstream failure, the plain error text otherwise
fn describe_failure(error: &ComputeError) -> String {
    match error {
        ComputeError::UpstreamFailure { variant, message } => format!("{}: {}", variant, message),
        other => other.to_string(),
    }
}

fn join_fetch(
    variant: Variant,
    handle: thread::ScopedJoinHandle<'_, Result<Vec<Event>, ComputeError>>,
) -> Result<Vec<Event>, ComputeError> {
    let result = handle.join().map_err(|_| ComputeError::UpstreamFailure {
        variant: variant.to_string(),
        message: "fetch worker panicked".to_string(),
    })?;

    result.map_err(|e| match e {
        ComputeError::UpstreamFailure { .. } => e,
        other => ComputeError::UpstreamFailure {
            variant: variant.to_string(),
            message: other.to_string(),
        },
    })
}

/// On-disk row format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFormat {
    /// Newline-delimited JSON (one row per line)
    #[default]
    Ndjson,
    /// JSON array of rows
    Json,
}

impl RowFormat {
    /// Guess the format from a file extension, defaulting to NDJSON
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => RowFormat::Json,
            _ => RowFormat::Ndjson,
        }
    }

    pub fn parse(&self, text: &str) -> Result<Vec<Event>, ComputeError> {
        let rows = match self {
            RowFormat::Ndjson => EventRowAdapter::parse_ndjson(text)?,
            RowFormat::Json => EventRowAdapter::parse_array(text)?,
        };
        EventRowAdapter::to_events(&rows)
    }
}

/// Event source backed by one file per variant
#[derive(Debug, Clone)]
pub struct FileEventSource {
    as_is: PathBuf,
    to_be: PathBuf,
    format: Option<RowFormat>,
}

impl FileEventSource {
    pub fn new(as_is: impl Into<PathBuf>, to_be: impl Into<PathBuf>) -> Self {
        Self {
            as_is: as_is.into(),
            to_be: to_be.into(),
            format: None,
        }
    }

    /// Force a row format instead of guessing from the extension
    pub fn with_format(mut self, format: RowFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn path(&self, variant: Variant) -> &PathBuf {
        match variant {
            Variant::AsIs => &self.as_is,
            Variant::ToBe => &self.to_be,
        }
    }
}

impl EventSource for FileEventSource {
    fn fetch(&self, variant: Variant, query: &EventQuery) -> Result<Vec<Event>, ComputeError> {
        let path = self.path(variant);
        let format = self.format.unwrap_or_else(|| RowFormat::from_path(path));
        let text = fs::read_to_string(path)?;

        let events: Vec<Event> = format
            .parse(&text)?
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();

        log::info!(
            "loaded {} {} events from {}",
            events.len(),
            variant,
            path.display()
        );
        Ok(events)
    }
}

/// Event source over events already held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    pub as_is: Vec<Event>,
    pub to_be: Vec<Event>,
}

impl EventSource for MemoryEventSource {
    fn fetch(&self, variant: Variant, query: &EventQuery) -> Result<Vec<Event>, ComputeError> {
        let events = match variant {
            Variant::AsIs => &self.as_is,
            Variant::ToBe => &self.to_be,
        };
        Ok(events.iter().filter(|e| query.matches(e)).cloned().collect())
    }
}
