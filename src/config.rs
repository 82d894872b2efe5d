//! Engine configuration
//!
//! Policy choices and the phase table, loadable from a TOML file:
//!
//! ```toml
//! backtrack_policy = "step-revisit"
//! total_duration_policy = "sum-of-steps"
//!
//! [phase_table]
//! default_phase = "Other"
//!
//! [phase_table.steps]
//! "CATIA" = "Design"
//! ```
//!
//! Fields left out keep their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::backtrack::BacktrackPolicy;
use crate::error::ComputeError;
use crate::phase::PhaseTable;
use crate::summary::TotalDurationPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backtrack_policy: BacktrackPolicy,
    pub total_duration_policy: TotalDurationPolicy,
    pub phase_table: PhaseTable,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ComputeError> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| ComputeError::ConfigError(e.to_string()))?;
        config
            .phase_table
            .validate()
            .map_err(ComputeError::ConfigError)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!(
            "loaded config from {} (backtrack={}, total={}, {} mapped steps)",
            path.display(),
            config.backtrack_policy.as_str(),
            config.total_duration_policy.as_str(),
            config.phase_table.steps.len()
        );
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ComputeError> {
        toml::to_string_pretty(self).map_err(|e| ComputeError::ConfigError(e.to_string()))
    }
}
