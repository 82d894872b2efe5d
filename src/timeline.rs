//! Timeline construction
//!
//! Turns each user's events into ordered segments for visualization.

use crate::phase::PhaseClassifier;
use crate::summary::{group_by_user, sorted_by_time};
use crate::types::{seconds_between, Event, TimelineSegment, Timelines};

/// Builder for per-user segment lists
pub struct TimelineBuilder<'a> {
    classifier: &'a PhaseClassifier,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(classifier: &'a PhaseClassifier) -> Self {
        Self { classifier }
    }

    /// Build one chronologically ordered segment list per user
    pub fn build(&self, events: &[Event]) -> Timelines {
        group_by_user(events)
            .into_iter()
            .map(|(user, group)| {
                let segments = sorted_by_time(&group)
                    .iter()
                    .map(|event| self.segment(event))
                    .collect();
                (user, segments)
            })
            .collect()
    }

    /// A segment ends where the user's next event starts. The last event of a user
    /// has no successor and becomes a zero-length segment.
    fn segment(&self, event: &Event) -> TimelineSegment {
        let start = event.occurred_at;
        let end = event.next_occurred_at.unwrap_or(start);

        TimelineSegment {
            user: event.user().to_string(),
            step: event.step().to_string(),
            phase: self
                .classifier
                .classify(event.step_label.as_deref(), event.action_label.as_deref())
                .to_string(),
            start,
            end,
            duration_min: seconds_between(start, end) / 60.0,
        }
    }
}
