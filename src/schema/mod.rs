//! flowdelta.event_row.v1 schema
//!
//! This module defines the row shape delivered by the event store and the adapter
//! that turns rows into typed events.

mod adapter;
mod event_row;

pub use adapter::*;
pub use event_row::*;
