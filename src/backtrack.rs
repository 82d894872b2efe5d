//! Backtrack (revisit) detection
//!
//! Counts how often a user returns to work already done. Several definitions are in
//! use by downstream consumers, so each is exposed as a named [`BacktrackPolicy`].
//! All counters expect events already sorted by `occurred_at`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::Event;

/// Definition of a backtrack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BacktrackPolicy {
    /// Step equals the immediately preceding event's step
    ConsecutiveStep,
    /// Normalized action seen before, ignoring immediate duplicates
    #[default]
    ActionRevisit,
    /// Step seen at any earlier point
    StepRevisit,
}

impl BacktrackPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BacktrackPolicy::ConsecutiveStep => "consecutive-step",
            BacktrackPolicy::ActionRevisit => "action-revisit",
            BacktrackPolicy::StepRevisit => "step-revisit",
        }
    }

    /// Count backtracks over one user's chronologically sorted events
    pub fn count(&self, events: &[Event]) -> u32 {
        match self {
            BacktrackPolicy::ConsecutiveStep => {
                count_consecutive_repeats(events.iter().map(|e| e.step_label.as_deref()))
            }
            BacktrackPolicy::ActionRevisit => {
                count_action_revisits(events.iter().map(|e| e.action_label.as_deref()))
            }
            BacktrackPolicy::StepRevisit => count_step_revisits(events.iter().map(Event::step)),
        }
    }
}

impl std::str::FromStr for BacktrackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consecutive-step" => Ok(BacktrackPolicy::ConsecutiveStep),
            "action-revisit" => Ok(BacktrackPolicy::ActionRevisit),
            "step-revisit" => Ok(BacktrackPolicy::StepRevisit),
            other => Err(format!("unknown backtrack policy: {}", other)),
        }
    }
}

/// Count labels equal to the label right before them.
///
/// Labels are compared as given; a missing step only repeats another missing step.
pub fn count_consecutive_repeats<T: PartialEq>(steps: impl IntoIterator<Item = T>) -> u32 {
    let mut previous: Option<T> = None;
    let mut count = 0;

    for step in steps {
        if previous.as_ref() == Some(&step) {
            count += 1;
        }
        previous = Some(step);
    }

    count
}

/// Count returns to an action already performed earlier.
///
/// Actions are trimmed and lower-cased. An action equal to the previous kept action is
/// treated as duplicate logging and skipped. Missing or blank actions are skipped
/// without affecting the previous kept action.
pub fn count_action_revisits<'a>(actions: impl IntoIterator<Item = Option<&'a str>>) -> u32 {
    let mut seen: HashSet<String> = HashSet::new();
    let mut last_kept: Option<String> = None;
    let mut count = 0;

    for action in actions {
        let normalized = match action.map(|a| a.trim().to_lowercase()) {
            Some(a) if !a.is_empty() => a,
            _ => continue,
        };

        if last_kept.as_deref() == Some(normalized.as_str()) {
            continue;
        }

        if !seen.insert(normalized.clone()) {
            count += 1;
        }
        last_kept = Some(normalized);
    }

    count
}

/// Count labels that already appeared anywhere earlier in the sequence
pub fn count_step_revisits<'a>(steps: impl IntoIterator<Item = &'a str>) -> u32 {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut count = 0;

    for step in steps {
        if !seen.insert(step) {
            count += 1;
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn events_with_steps(steps: &[Option<&str>]) -> Vec<Event> {
        let start = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let mut event = Event::at(start + Duration::seconds(i as i64 * 30));
                event.step_label = step.map(str::to_string);
                event
            })
            .collect()
    }

    #[test]
    fn test_action_revisit_suppresses_duplicates() {
        let actions = [Some("A"), Some("A"), Some("B"), Some("A")];
        assert_eq!(count_action_revisits(actions), 1);
    }

    #[test]
    fn test_action_revisit_normalizes() {
        let actions = [Some("Open File"), Some(" open file "), Some("Save"), Some("OPEN FILE")];
        assert_eq!(count_action_revisits(actions), 1);
    }

    #[test]
    fn test_action_revisit_skips_missing() {
        // The gap does not break the duplicate run: A, -, A is one kept A
        let actions = [Some("A"), None, Some("A"), Some(""), Some("B"), Some("A")];
        assert_eq!(count_action_revisits(actions), 1);
    }

    #[test]
    fn test_step_revisit_any_distance() {
        assert_eq!(count_step_revisits(["X", "Y", "X", "X"]), 2);
        assert_eq!(count_step_revisits(["X", "Y", "Z"]), 0);
    }

    #[test]
    fn test_consecutive_repeats() {
        assert_eq!(count_consecutive_repeats(["X", "Y", "X", "X"]), 1);
        assert_eq!(count_consecutive_repeats(["X", "X", "X"]), 2);
        assert_eq!(count_consecutive_repeats(std::iter::empty::<&str>()), 0);
    }

    #[test]
    fn test_policy_missing_steps() {
        // step-revisit folds missing steps into "Other"
        let events = events_with_steps(&[None, Some("Other"), Some("CAD"), None]);
        assert_eq!(BacktrackPolicy::StepRevisit.count(&events), 2);

        // consecutive-step compares the raw labels
        assert_eq!(BacktrackPolicy::ConsecutiveStep.count(&events), 0);
        let events = events_with_steps(&[None, None, Some("CAD"), Some("CAD")]);
        assert_eq!(BacktrackPolicy::ConsecutiveStep.count(&events), 2);
    }

    #[test]
    fn test_policy_dispatch() {
        let mut events = events_with_steps(&[Some("X"), Some("Y"), Some("X"), Some("X")]);
        for (event, action) in events.iter_mut().zip(["a", "a", "b", "a"]) {
            event.action_label = Some(action.to_string());
        }

        assert_eq!(BacktrackPolicy::ConsecutiveStep.count(&events), 1);
        assert_eq!(BacktrackPolicy::ActionRevisit.count(&events), 1);
        assert_eq!(BacktrackPolicy::StepRevisit.count(&events), 2);
    }

    #[test]
    fn test_policy_names() {
        for policy in [
            BacktrackPolicy::ConsecutiveStep,
            BacktrackPolicy::ActionRevisit,
            BacktrackPolicy::StepRevisit,
        ] {
            assert_eq!(policy.as_str().parse::<BacktrackPolicy>().unwrap(), policy);
            let json = serde_json::to_string(&policy).unwrap();
            assert_eq!(json, format!("\"{}\"", policy.as_str()));
        }
        assert!("sideways".parse::<BacktrackPolicy>().is_err());
    }
}
