//! Phase classification
//!
//! Maps fine-grained step labels onto a small set of coarse phases. The mapping is
//! plain data ([`PhaseTable`]) so deployments can extend it without code changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PREPARATION: &str = "Preparation";
pub const DESIGN: &str = "Design";
pub const INTEGRATION: &str = "Integration";
pub const VERIFICATION: &str = "Verification";
pub const STAGE_FINISH: &str = "Stage/Finish";
pub const OTHER: &str = "Other";

/// Substring rule applied when a step is not in the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    /// Lower-case substring searched in the step and action labels
    pub contains: String,
    /// Phase assigned on a match
    pub phase: String,
}

/// Step → phase lookup data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTable {
    /// Known phases in display order
    pub phases: Vec<String>,
    /// Phase used when nothing matches
    pub default_phase: String,
    /// Exact (trimmed) step label → phase
    pub steps: HashMap<String, String>,
    /// Display color per phase, for presentation consumers
    pub colors: HashMap<String, String>,
    /// Checked in order when the step lookup misses
    pub fallback: Vec<FallbackRule>,
}

impl Default for PhaseTable {
    fn default() -> Self {
        let steps: &[(&str, &str)] = &[
            ("Requirements", PREPARATION),
            ("Kickoff", PREPARATION),
            ("Planning", PREPARATION),
            ("Data Collection", PREPARATION),
            ("CATIA", DESIGN),
            ("CAD", DESIGN),
            ("Sketch", DESIGN),
            ("Modeling", DESIGN),
            ("Drawing", DESIGN),
            ("PLM Upload", INTEGRATION),
            ("BOM Sync", INTEGRATION),
            ("Integration", INTEGRATION),
            ("Simulation", VERIFICATION),
            ("Review", VERIFICATION),
            ("Validation", VERIFICATION),
            ("Test", VERIFICATION),
            ("Approval", STAGE_FINISH),
            ("Release", STAGE_FINISH),
            ("Stage", STAGE_FINISH),
            ("Finish", STAGE_FINISH),
        ];
        let colors: &[(&str, &str)] = &[
            (PREPARATION, "#8ecae6"),
            (DESIGN, "#219ebc"),
            (INTEGRATION, "#ffb703"),
            (VERIFICATION, "#fb8500"),
            (STAGE_FINISH, "#2a9d8f"),
            (OTHER, "#adb5bd"),
        ];

        Self {
            phases: [PREPARATION, DESIGN, INTEGRATION, VERIFICATION, STAGE_FINISH, OTHER]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            steps: steps
                .iter()
                .map(|(s, p)| (s.to_string(), p.to_string()))
                .collect(),
            fallback: vec![FallbackRule {
                contains: "import".to_string(),
                phase: INTEGRATION.to_string(),
            }],
            default_phase: OTHER.to_string(),
            colors: colors
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        }
    }
}

impl PhaseTable {
    /// Check internal consistency of a (possibly user supplied) table
    pub fn validate(&self) -> Result<(), String> {
        if self.default_phase.trim().is_empty() {
            return Err("default_phase must not be empty".to_string());
        }
        if let Some(rule) = self.fallback.iter().find(|r| r.contains.trim().is_empty()) {
            return Err(format!(
                "fallback rule for phase {:?} has an empty substring",
                rule.phase
            ));
        }
        if let Some((step, _)) = self.steps.iter().find(|(s, _)| s.trim().is_empty()) {
            return Err(format!("step label {:?} is blank", step));
        }
        Ok(())
    }

    /// Known phases in display order, with the default phase appended if missing
    pub fn known_phases(&self) -> Vec<&str> {
        let mut phases: Vec<&str> = self.phases.iter().map(String::as_str).collect();
        if !phases.contains(&self.default_phase.as_str()) {
            phases.push(&self.default_phase);
        }
        phases
    }
}

/// Classifier over a [`PhaseTable`]
#[derive(Debug, Clone, Default)]
pub struct PhaseClassifier {
    table: PhaseTable,
}

impl PhaseClassifier {
    pub fn new(table: PhaseTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PhaseTable {
        &self.table
    }

    /// Classify a step (and optionally its action) into a phase. Never fails.
    pub fn classify(&self, step: Option<&str>, action: Option<&str>) -> &str {
        let step = step.map(str::trim);

        if let Some(phase) = step.and_then(|s| self.table.steps.get(s)) {
            return phase;
        }

        let step_lc = step.map(str::to_lowercase).unwrap_or_default();
        let action_lc = action.map(|a| a.trim().to_lowercase()).unwrap_or_default();

        for rule in &self.table.fallback {
            let needle = rule.contains.to_lowercase();
            if step_lc.contains(&needle) || action_lc.contains(&needle) {
                return &rule.phase;
            }
        }

        &self.table.default_phase
    }

    /// Display color for a phase, if the table defines one
    pub fn color(&self, phase: &str) -> Option<&str> {
        self.table.colors.get(phase).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_step() {
        let classifier = PhaseClassifier::default();
        assert_eq!(classifier.classify(Some("CATIA"), None), DESIGN);
        assert_eq!(classifier.classify(Some("  Review "), None), VERIFICATION);
        assert_eq!(classifier.classify(Some("Release"), Some("import")), STAGE_FINISH);
    }

    #[test]
    fn test_import_fallback() {
        let classifier = PhaseClassifier::default();
        assert_eq!(
            classifier.classify(Some("unknown-step"), Some("Data Import Job")),
            INTEGRATION
        );
        assert_eq!(classifier.classify(Some("CSV IMPORT"), None), INTEGRATION);
    }

    #[test]
    fn test_default_phase() {
        let classifier = PhaseClassifier::default();
        assert_eq!(classifier.classify(None, None), OTHER);
        assert_eq!(classifier.classify(Some("catia"), Some("open")), OTHER);
    }

    #[test]
    fn test_custom_table() {
        let mut table = PhaseTable::default();
        table.steps.insert("Whiteboard".to_string(), DESIGN.to_string());
        table.fallback.push(FallbackRule {
            contains: "sign".to_string(),
            phase: STAGE_FINISH.to_string(),
        });
        let classifier = PhaseClassifier::new(table);

        assert_eq!(classifier.classify(Some("Whiteboard"), None), DESIGN);
        assert_eq!(classifier.classify(None, Some("Sign-off")), STAGE_FINISH);
    }

    #[test]
    fn test_colors() {
        let classifier = PhaseClassifier::default();
        assert_eq!(classifier.color(DESIGN), Some("#219ebc"));
        assert_eq!(classifier.color("Nope"), None);
    }

    #[test]
    fn test_validate_rejects_empty_fallback() {
        let mut table = PhaseTable::default();
        table.fallback.push(FallbackRule {
            contains: " ".to_string(),
            phase: DESIGN.to_string(),
        });
        assert!(table.validate().is_err());
        assert!(PhaseTable::default().validate().is_ok());
    }

    #[test]
    fn test_known_phases_includes_default() {
        let table = PhaseTable {
            phases: vec![DESIGN.to_string()],
            default_phase: "Misc".to_string(),
            ..PhaseTable::default()
        };
        assert_eq!(table.known_phases(), vec![DESIGN, "Misc"]);
    }
}
