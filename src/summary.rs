//! Per-user summarization
//!
//! Groups one variant's events by user, sorts each group chronologically and derives
//! elapsed time, per-step average durations and backtrack counts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::backtrack::BacktrackPolicy;
use crate::error::ComputeError;
use crate::types::{seconds_between, Event, UserSummary};

/// Definition of a user's total task duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TotalDurationPolicy {
    /// Time between the first and the last event
    #[default]
    Span,
    /// Sum of every event's `duration_to_next_seconds`
    SumOfSteps,
}

impl TotalDurationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TotalDurationPolicy::Span => "span",
            TotalDurationPolicy::SumOfSteps => "sum-of-steps",
        }
    }

    /// Total seconds over one user's chronologically sorted, non-empty events
    fn total_seconds(&self, sorted: &[Event]) -> f64 {
        match self {
            TotalDurationPolicy::Span => match (sorted.first(), sorted.last()) {
                (Some(first), Some(last)) => seconds_between(first.occurred_at, last.occurred_at),
                _ => 0.0,
            },
            TotalDurationPolicy::SumOfSteps => sorted.iter().map(Event::duration_seconds).sum(),
        }
    }
}

impl std::str::FromStr for TotalDurationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "span" => Ok(TotalDurationPolicy::Span),
            "sum-of-steps" => Ok(TotalDurationPolicy::SumOfSteps),
            other => Err(format!("unknown total duration policy: {}", other)),
        }
    }
}

/// Return a chronologically sorted copy of `events`.
///
/// The sort is stable so events sharing a timestamp keep their input order.
pub fn sorted_by_time(events: &[Event]) -> Vec<Event> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.occurred_at);
    sorted
}

/// Group events by user identifier (missing → `"unknown"`), preserving input order
/// within each group.
pub fn group_by_user(events: &[Event]) -> BTreeMap<String, Vec<Event>> {
    let mut groups: BTreeMap<String, Vec<Event>> = BTreeMap::new();
    for event in events {
        groups
            .entry(event.user().to_string())
            .or_default()
            .push(event.clone());
    }
    groups
}

/// Summarizer configured with the two policy choices
#[derive(Debug, Clone, Copy, Default)]
pub struct UserSummarizer {
    backtrack: BacktrackPolicy,
    total_duration: TotalDurationPolicy,
}

impl UserSummarizer {
    pub fn new(backtrack: BacktrackPolicy, total_duration: TotalDurationPolicy) -> Self {
        Self {
            backtrack,
            total_duration,
        }
    }

    /// Summarize the events of a single user.
    ///
    /// Fails with [`ComputeError::InvalidInput`] on an empty group or on a group
    /// mixing several users.
    pub fn summarize(&self, events: &[Event]) -> Result<UserSummary, ComputeError> {
        let sorted = sorted_by_time(events);

        let first = sorted.first().ok_or_else(|| {
            ComputeError::InvalidInput("cannot summarize an empty event group".to_string())
        })?;
        let user = first.user().to_string();

        if let Some(other) = sorted.iter().find(|e| e.user() != user) {
            return Err(ComputeError::InvalidInput(format!(
                "event group mixes users {:?} and {:?}",
                user,
                other.user()
            )));
        }

        let total_min = self.total_duration.total_seconds(&sorted) / 60.0;

        let mut per_step: BTreeMap<String, (f64, u32)> = BTreeMap::new();
        for event in &sorted {
            let entry = per_step.entry(event.step().to_string()).or_default();
            entry.0 += event.duration_seconds();
            entry.1 += 1;
        }
        let step_avg_sec = per_step
            .into_iter()
            .map(|(step, (sum, count))| (step, sum / count as f64))
            .collect();

        let transitions = sorted
            .windows(2)
            .filter(|pair| pair[0].step() != pair[1].step())
            .count() as u32;

        Ok(UserSummary {
            user,
            total_min,
            event_count: sorted.len() as u32,
            transitions,
            backtracks: self.backtrack.count(&sorted),
            step_avg_sec,
        })
    }

    /// Summarize every user present in `events`, ordered by user identifier
    pub fn summarize_by_user(&self, events: &[Event]) -> Result<Vec<UserSummary>, ComputeError> {
        group_by_user(events)
            .values()
            .map(|group| self.summarize(group))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t(min: i64, sec: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
            + Duration::minutes(min)
            + Duration::seconds(sec)
    }

    fn logged(step: &str, action: &str, at: DateTime<Utc>) -> Event {
        Event::at(at).with_user("alice").with_step(step).with_action(action)
    }

    /// alice: CATIA 0:00 → CATIA 1:00 → Review 3:00 → CATIA 4:00 (last)
    fn alice_events() -> Vec<Event> {
        vec![
            logged("CATIA", "open", t(0, 0)).followed_at(t(1, 0)),
            logged("CATIA", "edit", t(1, 0)).followed_at(t(3, 0)),
            logged("Review", "check", t(3, 0)).followed_at(t(4, 0)),
            logged("CATIA", "edit", t(4, 0)),
        ]
    }

    #[test]
    fn test_summarize_span() {
        let summary = UserSummarizer::default().summarize(&alice_events()).unwrap();

        assert_eq!(summary.user, "alice");
        assert!((summary.total_min - 4.0).abs() < 1e-9);
        assert_eq!(summary.event_count, 4);
        assert_eq!(summary.transitions, 2);
        // CATIA: (60 + 120 + 0) / 3, Review: 60 / 1
        assert!((summary.step_avg_sec["CATIA"] - 60.0).abs() < 1e-9);
        assert!((summary.step_avg_sec["Review"] - 60.0).abs() < 1e-9);
        // edit → check → edit
        assert_eq!(summary.backtracks, 1);
    }

    #[test]
    fn test_summarize_sum_of_steps() {
        let mut events = alice_events();
        events[1].duration_to_next_seconds = Some(f64::NAN);
        let summarizer =
            UserSummarizer::new(BacktrackPolicy::StepRevisit, TotalDurationPolicy::SumOfSteps);
        let summary = summarizer.summarize(&events).unwrap();

        // 60 + 0 (NaN coerced) + 60 + 0 (missing)
        assert!((summary.total_min - 2.0).abs() < 1e-9);
        assert_eq!(summary.backtracks, 2);
    }

    #[test]
    fn test_order_independence() {
        let summarizer = UserSummarizer::default();
        let sorted = summarizer.summarize(&alice_events()).unwrap();

        let mut shuffled = alice_events();
        shuffled.reverse();
        shuffled.swap(0, 2);
        let unsorted = summarizer.summarize(&shuffled).unwrap();

        assert_eq!(sorted, unsorted);
    }

    #[test]
    fn test_idempotent_and_input_untouched() {
        let summarizer = UserSummarizer::default();
        let mut events = alice_events();
        events.reverse();
        let before = events.clone();

        let first = summarizer.summarize(&events).unwrap();
        let second = summarizer.summarize(&events).unwrap();

        assert_eq!(first, second);
        assert_eq!(events, before);
    }

    #[test]
    fn test_empty_group_rejected() {
        let result = UserSummarizer::default().summarize(&[]);
        assert!(matches!(result, Err(ComputeError::InvalidInput(_))));
    }

    #[test]
    fn test_mixed_users_rejected() {
        let mut events = alice_events();
        events.push(Event::at(t(5, 0)).with_user("bob"));
        let result = UserSummarizer::default().summarize(&events);
        assert!(matches!(result, Err(ComputeError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_step_uses_sentinel() {
        let events = vec![
            Event::at(t(0, 0)).with_user("carol").followed_at(t(0, 30)),
            Event::at(t(0, 30)).with_user("carol"),
        ];
        let summary = UserSummarizer::default().summarize(&events).unwrap();
        assert!((summary.step_avg_sec["Other"] - 15.0).abs() < 1e-9);
        assert_eq!(summary.transitions, 0);
    }

    #[test]
    fn test_non_negative_outputs() {
        let mut events = alice_events();
        events[0].duration_to_next_seconds = Some(-500.0);
        events[2].duration_to_next_seconds = Some(f64::NEG_INFINITY);

        for policy in [TotalDurationPolicy::Span, TotalDurationPolicy::SumOfSteps] {
            let summary = UserSummarizer::new(BacktrackPolicy::default(), policy)
                .summarize(&events)
                .unwrap();
            assert!(summary.total_min >= 0.0);
            assert!(summary.step_avg_sec.values().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn test_summarize_by_user_groups_and_orders() {
        let mut events = vec![
            Event::at(t(0, 0)).with_user("zoe").with_step("CAD").followed_at(t(2, 0)),
            Event::at(t(2, 0)).with_user("zoe").with_step("Review"),
            Event::at(t(1, 0)).with_step("CAD"),
        ];
        events.extend(alice_events());

        let summaries = UserSummarizer::default().summarize_by_user(&events).unwrap();
        let users: Vec<&str> = summaries.iter().map(|s| s.user.as_str()).collect();
        assert_eq!(users, vec!["alice", "unknown", "zoe"]);
        assert!((summaries[2].total_min - 2.0).abs() < 1e-9);
        assert_eq!(summaries[1].total_min, 0.0);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let events = vec![
            Event::at(t(0, 0)).with_user("dan").with_action("b"),
            Event::at(t(0, 0)).with_user("dan").with_action("a"),
        ];
        let sorted = sorted_by_time(&events);
        assert_eq!(sorted[0].action_label.as_deref(), Some("b"));
        assert_eq!(sorted[1].action_label.as_deref(), Some("a"));
    }
}
