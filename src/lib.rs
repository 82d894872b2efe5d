//! Flowdelta - Compute engine comparing As-Is and To-Be process telemetry
//!
//! Flowdelta turns two logs of user-interaction events, one from the baseline process
//! and one from its redesign, into comparable metrics through a deterministic pipeline:
//! row adaptation → per-user summarization → phase aggregation → timeline building.
//!
//! ## Modules
//!
//! - **Core**: phase classification, backtrack detection, user summaries, phase rows,
//!   timelines and the comparison engine tying them together
//! - **Schema**: the raw event row format and its adapter
//! - **Sources**: the seam standing in for the event store

pub mod aggregate;
pub mod backtrack;
pub mod config;
pub mod error;
pub mod phase;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod summary;
pub mod timeline;
pub mod types;

pub use backtrack::BacktrackPolicy;
pub use config::EngineConfig;
pub use error::ComputeError;
pub use phase::{PhaseClassifier, PhaseTable};
pub use pipeline::{compare_json, ComparisonEngine};
pub use source::{fetch_both, EventQuery, EventSource, FileEventSource};
pub use summary::{TotalDurationPolicy, UserSummarizer};
pub use types::{Comparison, Event, PhaseRow, TimelineSegment, UserSummary, Variant};

// Schema exports
pub use schema::{EventRow, EventRowAdapter, SCHEMA_VERSION};

/// Flowdelta version embedded in every comparison
pub const FLOWDELTA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for comparison payloads
pub const PRODUCER_NAME: &str = "flowdelta";
