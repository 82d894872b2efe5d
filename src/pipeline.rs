//! Comparison orchestration
//!
//! This module provides the public API for comparing the two variants. It runs the
//! summarizer, phase aggregator and timeline builder over each side and assembles the
//! merged result.

use chrono::Utc;

use crate::aggregate::PhaseAggregator;
use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::phase::PhaseClassifier;
use crate::schema::EventRowAdapter;
use crate::source::{fetch_both, EventQuery, EventSource};
use crate::summary::UserSummarizer;
use crate::timeline::TimelineBuilder;
use crate::types::{ActivePolicies, Comparison, Event, Producer, Timelines};
use crate::{FLOWDELTA_VERSION, PRODUCER_NAME};

/// Compare two JSON arrays of event rows with the default configuration (stateless,
/// one-shot).
///
/// # Arguments
/// * `as_is_json` - Baseline rows as a JSON array
/// * `to_be_json` - Redesigned rows as a JSON array
///
/// # Returns
/// Comparison JSON string
pub fn compare_json(as_is_json: &str, to_be_json: &str) -> Result<String, ComputeError> {
    // Stage 1: Parse rows
    let as_is = EventRowAdapter::to_events(&EventRowAdapter::parse_array(as_is_json)?)?;
    let to_be = EventRowAdapter::to_events(&EventRowAdapter::parse_array(to_be_json)?)?;

    // Stage 2: Compare
    let comparison = ComparisonEngine::default().compare(&as_is, &to_be, None)?;

    // Stage 3: Encode
    Ok(serde_json::to_string(&comparison)?)
}

/// Engine holding the configured policies and phase table.
///
/// The engine keeps no per-request state; one instance can serve any number of
/// comparisons, including from several threads.
#[derive(Debug, Clone)]
pub struct ComparisonEngine {
    classifier: PhaseClassifier,
    summarizer: UserSummarizer,
    policies: ActivePolicies,
}

impl Default for ComparisonEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ComparisonEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            classifier: PhaseClassifier::new(config.phase_table),
            summarizer: UserSummarizer::new(
                config.backtrack_policy,
                config.total_duration_policy,
            ),
            policies: ActivePolicies {
                backtrack: config.backtrack_policy,
                total_duration: config.total_duration_policy,
            },
        }
    }

    pub fn classifier(&self) -> &PhaseClassifier {
        &self.classifier
    }

    pub fn policies(&self) -> ActivePolicies {
        self.policies
    }

    /// Compare both variants.
    ///
    /// When `user_filter` is set, both event sets are reduced to that exact user
    /// before any grouping happens. Filtering on `"unknown"` keeps the events that
    /// carry no user identifier.
    pub fn compare(
        &self,
        as_is: &[Event],
        to_be: &[Event],
        user_filter: Option<&str>,
    ) -> Result<Comparison, ComputeError> {
        let as_is = filter_user(as_is, user_filter);
        let to_be = filter_user(to_be, user_filter);

        log::debug!(
            "comparing {} as_is and {} to_be events (user filter: {:?})",
            as_is.len(),
            to_be.len(),
            user_filter
        );

        let as_is_summaries = self.summarizer.summarize_by_user(&as_is)?;
        let to_be_summaries = self.summarizer.summarize_by_user(&to_be)?;
        let phase_rows = PhaseAggregator::new(&self.classifier).aggregate(&as_is, &to_be);

        Ok(Comparison {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: FLOWDELTA_VERSION.to_string(),
                instance_id: uuid::Uuid::new_v4().to_string(),
            },
            computed_at: Utc::now(),
            policies: self.policies,
            user_filter: user_filter.map(str::to_string),
            query: None,
            as_is_summaries,
            to_be_summaries,
            phase_rows,
            as_is_timeline: self.timelines(&as_is),
            to_be_timeline: self.timelines(&to_be),
        })
    }

    /// Fetch both variants from `source` and compare them.
    ///
    /// The query's user filter is applied again before grouping, so sources that
    /// ignore it still produce a correctly filtered comparison.
    pub fn compare_source<S>(
        &self,
        source: &S,
        query: &EventQuery,
    ) -> Result<Comparison, ComputeError>
    where
        S: EventSource + Sync + ?Sized,
    {
        let (as_is, to_be) = fetch_both(source, query)?;
        let mut comparison = self.compare(&as_is, &to_be, query.user.as_deref())?;
        comparison.query = Some(query.clone());
        Ok(comparison)
    }

    /// Build per-user timelines for one event set
    pub fn timelines(&self, events: &[Event]) -> Timelines {
        TimelineBuilder::new(&self.classifier).build(events)
    }
}

fn filter_user(events: &[Event], user: Option<&str>) -> Vec<Event> {
    match user {
        Some(user) => events
            .iter()
            .filter(|e| e.user() == user)
            .cloned()
            .collect(),
        None => events.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtrack::BacktrackPolicy;
    use crate::phase::{DESIGN, INTEGRATION};
    use crate::source::MemoryEventSource;
    use crate::summary::TotalDurationPolicy;
    use chrono::{DateTime, TimeZone};

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    fn logged(user: &str, step: &str, action: &str, at: DateTime<Utc>) -> Event {
        Event::at(at).with_user(user).with_step(step).with_action(action)
    }

    fn as_is_events() -> Vec<Event> {
        vec![
            logged("ana", "CATIA", "model", t(9, 0)).followed_at(t(9, 20)),
            logged("ana", "Data Import", "import", t(9, 20)).followed_at(t(9, 50)),
            logged("ana", "CATIA", "model", t(9, 50)).followed_at(t(10, 0)),
            logged("ana", "Release", "release", t(10, 0)),
            logged("ben", "CATIA", "model", t(9, 0)).followed_at(t(9, 40)),
            logged("ben", "Release", "release", t(9, 40)),
        ]
    }

    fn to_be_events() -> Vec<Event> {
        vec![
            logged("ana", "CATIA", "model", t(9, 0)).followed_at(t(9, 10)),
            logged("ana", "Release", "release", t(9, 10)),
        ]
    }

    fn sample_rows_json() -> &'static str {
        r#"[
            {"email": "ana", "step": "CATIA", "action": "model", "ts": "2024-01-15 09:00:00",
             "next_ts": "2024-01-15 09:30:00", "dur_to_next_sec": 1800},
            {"email": "ana", "step": "Release", "action": "release", "ts": "2024-01-15 09:30:00"}
        ]"#
    }

    #[test]
    fn test_compare_full() {
        let engine = ComparisonEngine::default();
        let comparison = engine.compare(&as_is_events(), &to_be_events(), None).unwrap();

        assert_eq!(comparison.as_is_summaries.len(), 2);
        assert_eq!(comparison.to_be_summaries.len(), 1);

        let ana = &comparison.as_is_summaries[0];
        assert_eq!(ana.user, "ana");
        assert!((ana.total_min - 60.0).abs() < 1e-9);
        assert_eq!(ana.backtracks, 1);

        let design = comparison
            .phase_rows
            .iter()
            .find(|r| r.phase == DESIGN)
            .unwrap();
        // as_is design: 20 + 10 + 40 minutes over 3 events
        assert!((design.asis_total_min - 70.0).abs() < 1e-9);
        assert!((design.asis_avg_min - 70.0 / 3.0).abs() < 1e-9);
        assert!((design.tobe_total_min - 10.0).abs() < 1e-9);

        let integration = comparison
            .phase_rows
            .iter()
            .find(|r| r.phase == INTEGRATION)
            .unwrap();
        assert_eq!(integration.tobe_total_min, 0.0);

        assert_eq!(comparison.as_is_timeline["ana"].len(), 4);
        assert_eq!(comparison.to_be_timeline["ana"].len(), 2);
        assert_eq!(comparison.producer.name, PRODUCER_NAME);
    }

    #[test]
    fn test_user_filter_applies_before_grouping() {
        let engine = ComparisonEngine::default();
        let comparison = engine
            .compare(&as_is_events(), &to_be_events(), Some("ben"))
            .unwrap();

        assert_eq!(comparison.as_is_summaries.len(), 1);
        assert_eq!(comparison.as_is_summaries[0].user, "ben");
        assert!(comparison.to_be_summaries.is_empty());
        assert!(!comparison.as_is_timeline.contains_key("ana"));
        assert_eq!(comparison.user_filter.as_deref(), Some("ben"));

        // phases only see ben's events
        let design = comparison
            .phase_rows
            .iter()
            .find(|r| r.phase == DESIGN)
            .unwrap();
        assert!((design.asis_total_min - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_user_filter_unknown_selects_anonymous_events() {
        let mut as_is = as_is_events();
        as_is.push(Event::at(t(11, 0)).with_step("CAD").followed_at(t(11, 30)));
        as_is.push(Event::at(t(11, 30)).with_step("Review"));

        let comparison = ComparisonEngine::default()
            .compare(&as_is, &to_be_events(), Some("unknown"))
            .unwrap();

        assert_eq!(comparison.as_is_summaries.len(), 1);
        assert_eq!(comparison.as_is_summaries[0].user, "unknown");
        assert_eq!(comparison.as_is_summaries[0].event_count, 2);
        assert!((comparison.as_is_summaries[0].total_min - 30.0).abs() < 1e-9);
        assert!(comparison.to_be_summaries.is_empty());
    }

    #[test]
    fn test_policies_from_config() {
        let config = EngineConfig {
            backtrack_policy: BacktrackPolicy::StepRevisit,
            total_duration_policy: TotalDurationPolicy::SumOfSteps,
            ..EngineConfig::default()
        };
        let engine = ComparisonEngine::new(config);
        let comparison = engine.compare(&as_is_events(), &[], None).unwrap();

        assert_eq!(comparison.policies.backtrack, BacktrackPolicy::StepRevisit);
        let ana = &comparison.as_is_summaries[0];
        assert_eq!(ana.backtracks, 1);
        assert!((ana.total_min - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_compare_source() {
        let source = MemoryEventSource {
            as_is: as_is_events(),
            to_be: to_be_events(),
        };
        let query = EventQuery {
            to: Some(t(9, 30)),
            ..EventQuery::default()
        };

        let comparison = ComparisonEngine::default()
            .compare_source(&source, &query)
            .unwrap();
        assert_eq!(comparison.as_is_timeline["ana"].len(), 2);
        assert_eq!(comparison.as_is_timeline["ben"].len(), 1);
        assert_eq!(comparison.query, Some(query));
    }

    #[test]
    fn test_compare_json_stateless() {
        let json = compare_json(sample_rows_json(), "[]").unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["producer"]["name"], PRODUCER_NAME);
        assert_eq!(payload["policies"]["backtrack"], "action-revisit");
        assert_eq!(payload["policies"]["total_duration"], "span");
        assert_eq!(payload["as_is_summaries"][0]["user"], "ana");
        assert_eq!(payload["as_is_summaries"][0]["total_min"], 30.0);
        assert!(payload["to_be_summaries"].as_array().unwrap().is_empty());
        assert!(payload.get("user_filter").is_none());

        let last = &payload["as_is_timeline"]["ana"][1];
        assert_eq!(last["start"], last["end"]);
        assert_eq!(last["duration_min"], 0.0);
    }

    #[test]
    fn test_compare_json_bad_timestamp() {
        let rows = r#"[{"email": "ana", "ts": "not-a-date"}]"#;
        let result = compare_json(rows, "[]");
        assert!(matches!(result, Err(ComputeError::MalformedTimestamp { .. })));
    }

    #[test]
    fn test_repeated_compare_is_stable() {
        let engine = ComparisonEngine::default();
        let a = engine.compare(&as_is_events(), &to_be_events(), None).unwrap();
        let b = engine.compare(&as_is_events(), &to_be_events(), None).unwrap();

        assert_eq!(a.as_is_summaries, b.as_is_summaries);
        assert_eq!(a.phase_rows, b.phase_rows);
        assert_eq!(a.as_is_timeline, b.as_is_timeline);
        assert_ne!(a.producer.instance_id, b.producer.instance_id);
    }
}
