//! Benchmark-wide constants and forest hyperparameters.

use serde::{Deserialize, Serialize};

use crate::error::{ImputationError, Result};

/// Default quantiles evaluated when the caller does not supply any.
pub const QUANTILES: [f64; 5] = [0.1, 0.25, 0.5, 0.75, 0.9];

/// Fixed random seed used by stochastic models unless overridden.
pub const RANDOM_STATE: u64 = 42;

/// Hyperparameters for the quantile random forest.
///
/// Defaults mirror a small but serviceable forest; tighten
/// `min_samples_leaf` at your own risk, since leaves need enough training
/// samples to estimate quantiles from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble.
    pub n_estimators: usize,

    /// Maximum tree depth. `None` grows trees until the leaf-size floor.
    pub max_depth: Option<usize>,

    /// Minimum number of training samples in a leaf.
    pub min_samples_leaf: usize,

    /// Number of candidate features per split. `None` uses
    /// `max(1, n_features / 3)`, the usual regression-forest heuristic.
    pub mtry: Option<usize>,

    /// Number of evenly spaced quantile levels pre-computed at prediction
    /// time; the per-row beta draw indexes into these.
    pub count_samples: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 5,
            mtry: None,
            count_samples: 10,
        }
    }
}

impl ForestConfig {
    /// Validate the hyperparameters.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ImputationError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ImputationError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.count_samples < 2 {
            return Err(ImputationError::InvalidConfig(
                "count_samples must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}
