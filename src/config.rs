//! Analysis configuration
//!
//! Handles loading of `rulecheck.yaml` and merging command-line overrides
//! on top of it.

use crate::analysis::gap::SamplingOptions;
use crate::analysis::set_overlap::SetSemantics;
use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in a directory
pub const CONFIG_FILE: &str = "rulecheck.yaml";

/// Root configuration (`rulecheck.yaml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisConfig {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub gaps: GapsConfig,

    #[serde(default)]
    pub conflicts: ConflictsConfig,

    /// Output names to analyze; empty means every output
    #[serde(default)]
    pub watch: Vec<String>,
}

fn default_version() -> u32 {
    1
}

/// Gap sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GapsConfig {
    /// Samples drawn per output group
    #[serde(default = "default_samples")]
    pub samples: usize,

    /// Fixed seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,

    /// Offsets added to numerical sample points
    #[serde(default = "default_perturbations")]
    pub perturbations: Vec<f64>,
}

fn default_samples() -> usize {
    500
}

fn default_perturbations() -> Vec<f64> {
    vec![0.0, 0.1]
}

impl Default for GapsConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            seed: None,
            perturbations: default_perturbations(),
        }
    }
}

/// Conflict sweep settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConflictsConfig {
    #[serde(default)]
    pub set_semantics: SetSemantics,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gaps: GapsConfig::default(),
            conflicts: ConflictsConfig::default(),
            watch: Vec::new(),
        }
    }
}

/// Command-line overrides (merge on top of the file)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub samples: Option<usize>,
    pub seed: Option<u64>,
    pub watch: Option<Vec<String>>,
    pub set_semantics: Option<SetSemantics>,
}

impl AnalysisConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_norway::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", CONFIG_FILE, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `rulecheck.yaml` from a directory
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_file = dir.join(CONFIG_FILE);
        if !config_file.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_file)?;
        Self::from_yaml(&content).map(Some)
    }

    /// Load from `dir`, falling back to defaults when the file is absent
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        Ok(Self::load_from_dir(dir)?.unwrap_or_default())
    }

    fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(Error::Config(format!(
                "Unsupported {} version: {}",
                CONFIG_FILE, self.version
            )));
        }
        if self.gaps.samples == 0 {
            return Err(Error::Config("gaps.samples must be at least 1".into()));
        }
        if self.gaps.perturbations.iter().any(|p| !p.is_finite()) {
            return Err(Error::Config("gaps.perturbations must be finite".into()));
        }
        Ok(())
    }

    /// Apply overrides to produce the effective configuration
    pub fn merge(&self, overrides: &ConfigOverrides) -> AnalysisConfig {
        AnalysisConfig {
            version: self.version,
            gaps: GapsConfig {
                samples: overrides.samples.unwrap_or(self.gaps.samples),
                seed: overrides.seed.or(self.gaps.seed),
                perturbations: self.gaps.perturbations.clone(),
            },
            conflicts: ConflictsConfig {
                set_semantics: overrides
                    .set_semantics
                    .unwrap_or(self.conflicts.set_semantics),
            },
            watch: overrides
                .watch
                .clone()
                .unwrap_or_else(|| self.watch.clone()),
        }
    }

    pub fn sampling(&self) -> SamplingOptions {
        SamplingOptions {
            samples: self.gaps.samples,
            seed: self.gaps.seed,
            perturbations: self.gaps.perturbations.clone(),
        }
    }
}
