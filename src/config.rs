//! Engine configuration.
//!
//! Stored as a JSON object on disk; every field is optional:
//! ```json
//! {
//!   "baseline_upper": [0.1, 0.5, 0.2],
//!   "baseline_lower": [0.2, 0.3, 0.4],
//!   "threshold": 2.0,
//!   "sheet_prefix": "sheet",
//!   "highlight_min": 0.0
//! }
//! ```

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::analyzers::types::Group;
use crate::stats::DEFAULT_THRESHOLD;

/// Typical upper-group wear rates used when no baseline is configured.
pub const DEFAULT_BASELINE_UPPER: [f64; 32] = [
    0.1, 0.5, 0.2, 0.4, 0.3, 0.6, 1.0, 0.8, 0.9, 0.7, 1.1, 1.2, 0.3, 0.4, 0.5, 0.6, 0.3, 0.2, 0.4,
    0.3, 0.8, 0.5, 0.6, 0.4, 0.7, 0.8, 0.9, 1.0, 0.2, 0.4, 0.3, 0.7,
];

/// Typical lower-group wear rates used when no baseline is configured.
pub const DEFAULT_BASELINE_LOWER: [f64; 32] = [
    0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.9, 0.8, 0.6, 0.7, 0.8, 0.9, 1.0, 0.5, 0.3, 0.4, 0.6, 0.5, 0.7,
    0.6, 0.5, 0.4, 0.3, 0.6, 0.5, 0.8, 0.9, 1.1, 0.2, 0.4, 0.3, 0.5,
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Reference population for the upper group's outlier bounds.
    pub baseline_upper: Vec<f64>,
    /// Reference population for the lower group's outlier bounds.
    pub baseline_lower: Vec<f64>,
    /// Acceptance band half-width, in standard deviations.
    pub threshold: f64,
    /// Only sheets whose name starts with this (ignoring case) are rated.
    pub sheet_prefix: String,
    /// Averages strictly above this value are flagged for highlighting.
    pub highlight_min: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            baseline_upper: DEFAULT_BASELINE_UPPER.to_vec(),
            baseline_lower: DEFAULT_BASELINE_LOWER.to_vec(),
            threshold: DEFAULT_THRESHOLD,
            sheet_prefix: "sheet".to_string(),
            highlight_min: 0.0,
        }
    }
}

impl EngineConfig {
    /// Loads and validates the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        Self::from_json(&content).with_context(|| format!("invalid config file {path}"))
    }

    /// Parses and validates the config from a JSON string.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            bail!(
                "threshold must be a finite, non-negative number (got {})",
                self.threshold
            );
        }
        if !self.highlight_min.is_finite() {
            bail!("highlight_min must be finite (got {})", self.highlight_min);
        }
        Ok(())
    }

    /// Baseline population for `group`.
    pub fn baseline(&self, group: Group) -> &[f64] {
        match group {
            Group::Upper => &self.baseline_upper,
            Group::Lower => &self.baseline_lower,
        }
    }

    /// Returns `true` if a sheet called `name` should be rated.
    pub fn accepts_sheet(&self, name: &str) -> bool {
        name.to_lowercase()
            .starts_with(&self.sheet_prefix.to_lowercase())
    }
}
