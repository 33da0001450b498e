use crate::types::DEFAULT_BUDGET;
use serde::{Deserialize, Serialize};

/// Absolute/relative tolerance for amount comparisons.
///
/// Two amounts `a` and `b` are close when `|a - b| <= atol + rtol * |b|`.
/// The test is asymmetric in `b`, so callers pass the reference value second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-8,
        }
    }
}

impl Tolerance {
    /// Exact comparison. Useful in tests that probe boundaries.
    pub fn exact() -> Self {
        Self { rtol: 0.0, atol: 0.0 }
    }

    pub fn is_close(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        if !a.is_finite() || !b.is_finite() {
            return false;
        }
        (a - b).abs() <= self.atol + self.rtol * b.abs()
    }
}

/// What to do when an edited record's category has no reference range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategoryPolicy {
    /// No plausible range is known, so the edit is out of range.
    #[default]
    Reject,
    /// Abort with `BudgetError::UnknownCategory`.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Maximum number of differing rows allowed per user.
    pub budget: u32,
    pub tolerance: Tolerance,
    pub unknown_category: UnknownCategoryPolicy,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            tolerance: Tolerance::default(),
            unknown_category: UnknownCategoryPolicy::default(),
        }
    }
}

impl ValidatorConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ValidatorConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        log::debug!("Loaded validator config from {path}: {config:?}");
        Ok(config)
    }

    pub fn with_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_unknown_category(mut self, policy: UnknownCategoryPolicy) -> Self {
        self.unknown_category = policy;
        self
    }
}
