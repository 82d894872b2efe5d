//! Phase aggregation
//!
//! Folds each variant's events into per-phase durations and merges both variants into
//! one row per phase.

use std::collections::{BTreeSet, HashMap};

use crate::phase::PhaseClassifier;
use crate::types::{Event, PhaseRow};

/// Running sum and count of durations for one phase
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PhaseAccumulator {
    sum_sec: f64,
    count: u32,
}

impl PhaseAccumulator {
    fn total_min(&self) -> f64 {
        self.sum_sec / 60.0
    }

    fn avg_min(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_min() / self.count as f64
    }
}

/// Aggregator for the merged phase view
pub struct PhaseAggregator<'a> {
    classifier: &'a PhaseClassifier,
}

impl<'a> PhaseAggregator<'a> {
    pub fn new(classifier: &'a PhaseClassifier) -> Self {
        Self { classifier }
    }

    /// Merge both variants into one row per phase.
    ///
    /// Every known phase of the table is present, with zeros where a variant has no
    /// events. Rows follow the table's display order, then any other phase
    /// alphabetically.
    pub fn aggregate(&self, as_is: &[Event], to_be: &[Event]) -> Vec<PhaseRow> {
        let as_is_acc = self.fold(as_is);
        let to_be_acc = self.fold(to_be);

        let known = self.classifier.table().known_phases();
        let extras: BTreeSet<&str> = as_is_acc
            .keys()
            .chain(to_be_acc.keys())
            .map(String::as_str)
            .filter(|p| !known.contains(p))
            .collect();

        known
            .iter()
            .copied()
            .chain(extras)
            .map(|phase| {
                let a = as_is_acc.get(phase).copied().unwrap_or_default();
                let b = to_be_acc.get(phase).copied().unwrap_or_default();
                PhaseRow {
                    phase: phase.to_string(),
                    asis_avg_min: a.avg_min(),
                    asis_total_min: a.total_min(),
                    tobe_avg_min: b.avg_min(),
                    tobe_total_min: b.total_min(),
                }
            })
            .collect()
    }

    fn fold(&self, events: &[Event]) -> HashMap<String, PhaseAccumulator> {
        let mut by_phase: HashMap<String, PhaseAccumulator> = HashMap::new();
        for event in events {
            let phase = self
                .classifier
                .classify(event.step_label.as_deref(), event.action_label.as_deref());
            let acc = by_phase.entry(phase.to_string()).or_default();
            acc.sum_sec += event.duration_seconds();
            acc.count += 1;
        }
        by_phase
    }
}
