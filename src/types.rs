//! Core data types
//!
//! This module defines the event records that enter the engine and the derived
//! aggregates (user summaries, phase rows, timeline segments) that leave it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::backtrack::BacktrackPolicy;
use crate::source::EventQuery;
use crate::summary::TotalDurationPolicy;

/// Identifier used for events whose actor is not recorded
pub const UNKNOWN_USER: &str = "unknown";

/// Label used for events whose step is not recorded
pub const UNLABELED_STEP: &str = "Other";

/// Which side of the comparison a set of events belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Baseline process
    AsIs,
    /// Redesigned process
    ToBe,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::AsIs => "as_is",
            Variant::ToBe => "to_be",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged user action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Actor identifier, `None` when the telemetry did not record one
    pub user_identifier: Option<String>,
    /// Workflow step the action belongs to
    pub step_label: Option<String>,
    /// Specific action taken
    pub action_label: Option<String>,
    /// Opaque payload, passed through unmodified
    #[serde(default)]
    pub detail: serde_json::Value,
    /// When the action happened
    pub occurred_at: DateTime<Utc>,
    /// When the same user's next action happened
    pub next_occurred_at: Option<DateTime<Utc>>,
    /// Seconds until the same user's next action
    pub duration_to_next_seconds: Option<f64>,
    pub prev_step_label: Option<String>,
    pub next_step_label: Option<String>,
}

impl Event {
    /// Create an event with only a timestamp set
    pub fn at(occurred_at: DateTime<Utc>) -> Self {
        Event {
            user_identifier: None,
            step_label: None,
            action_label: None,
            detail: serde_json::Value::Null,
            occurred_at,
            next_occurred_at: None,
            duration_to_next_seconds: None,
            prev_step_label: None,
            next_step_label: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user_identifier = Some(user.into());
        self
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step_label = Some(step.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action_label = Some(action.into());
        self
    }

    /// Set the next-event link (`next_occurred_at` and the derived duration)
    pub fn followed_at(mut self, next: DateTime<Utc>) -> Self {
        self.duration_to_next_seconds = Some(seconds_between(self.occurred_at, next));
        self.next_occurred_at = Some(next);
        self
    }

    /// Actor identifier, defaulting to [`UNKNOWN_USER`]
    pub fn user(&self) -> &str {
        self.user_identifier.as_deref().unwrap_or(UNKNOWN_USER)
    }

    /// Step label, defaulting to [`UNLABELED_STEP`]
    pub fn step(&self) -> &str {
        self.step_label.as_deref().unwrap_or(UNLABELED_STEP)
    }

    /// Seconds until the next event, coerced to a usable number.
    ///
    /// Missing and non-finite values read as zero. Elapsed time cannot be negative,
    /// so negative values also read as zero.
    pub fn duration_seconds(&self) -> f64 {
        finite_or_zero(self.duration_to_next_seconds).max(0.0)
    }
}

/// Coerce an optional number to a finite value, defaulting to zero.
///
/// This is the single recoverable default used wherever a duration is read;
/// sparse telemetry must not fail a whole batch.
pub fn finite_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Signed seconds from `start` to `end` with millisecond precision
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

/// Per-user aggregate for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User identifier (taken from the first event after sorting)
    pub user: String,
    /// Total elapsed minutes, as defined by the active [`TotalDurationPolicy`]
    pub total_min: f64,
    /// Number of events in the group
    pub event_count: u32,
    /// Number of adjacent event pairs whose step label differs
    pub transitions: u32,
    /// Revisits counted by the active [`BacktrackPolicy`]
    pub backtracks: u32,
    /// Average seconds spent per step label
    pub step_avg_sec: BTreeMap<String, f64>,
}

/// One phase of the merged As-Is / To-Be comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRow {
    pub phase: String,
    /// Average minutes per As-Is event in this phase
    pub asis_avg_min: f64,
    /// Total As-Is minutes in this phase
    pub asis_total_min: f64,
    /// Average minutes per To-Be event in this phase
    pub tobe_avg_min: f64,
    /// Total To-Be minutes in this phase
    pub tobe_total_min: f64,
}

/// A single event rendered as a span on a user's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    pub user: String,
    pub step: String,
    pub phase: String,
    pub start: DateTime<Utc>,
    /// Start of the next event, or `start` for a user's last event
    pub end: DateTime<Utc>,
    pub duration_min: f64,
}

/// Segments keyed by user identifier
pub type Timelines = BTreeMap<String, Vec<TimelineSegment>>;

/// Producer metadata attached to every comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique identifier of this run (UUID)
    pub instance_id: String,
}

/// Policies that were active when a comparison was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePolicies {
    pub backtrack: BacktrackPolicy,
    pub total_duration: TotalDurationPolicy,
}

/// Full result of comparing the two variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub producer: Producer,
    /// When this comparison was computed
    pub computed_at: DateTime<Utc>,
    pub policies: ActivePolicies,
    /// User filter applied before grouping, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_filter: Option<String>,
    /// Query the events were fetched with, when they came from an [`EventSource`]
    ///
    /// [`EventSource`]: crate::source::EventSource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<EventQuery>,
    pub as_is_summaries: Vec<UserSummary>,
    pub to_be_summaries: Vec<UserSummary>,
    pub phase_rows: Vec<PhaseRow>,
    pub as_is_timeline: Timelines,
    pub to_be_timeline: Timelines,
}
