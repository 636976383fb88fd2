//! Common types used throughout the crate.
//!
//! The central type is [`Quantile`], a validated probability that is totally
//! ordered so it can key the per-quantile prediction maps every imputer
//! returns.

use crate::error::{ImputationError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A quantile level in `[0, 1]`.
///
/// Construction validates the value, which lets the rest of the crate key
/// ordered maps by quantile without worrying about NaN or out-of-range
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Quantile(f64);

impl Quantile {
    /// Create a quantile, rejecting non-finite or out-of-range values.
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ImputationError::InvalidQuantile { value })
        }
    }

    /// The median quantile (0.5).
    pub fn median() -> Self {
        Self(0.5)
    }

    /// The underlying probability.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Eq for Quantile {}

impl PartialOrd for Quantile {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantile {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // NaN is excluded at construction, so total_cmp agrees with the
        // numeric order.
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Quantile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for Quantile {
    type Error = ImputationError;

    fn try_from(value: f64) -> Result<Self> {
        Quantile::new(value)
    }
}

impl From<Quantile> for f64 {
    fn from(q: Quantile) -> f64 {
        q.0
    }
}

/// Validate a slice of raw quantile values.
pub fn to_quantiles(values: &[f64]) -> Result<Vec<Quantile>> {
    values.iter().map(|&v| Quantile::new(v)).collect()
}

/// Predictions for one method: quantile level to a prediction frame whose
/// columns are the imputed variables and whose height matches the test frame.
pub type QuantileImputations = BTreeMap<Quantile, DataFrame>;

/// Results across methods, keyed by method name.
pub type MethodImputations = HashMap<String, QuantileImputations>;
