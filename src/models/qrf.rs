//! Quantile random forest imputer.
//!
//! String predictors are one-hot encoded (first level dropped) and a single
//! multi-output forest is trained against all targets jointly. Prediction
//! computes each row's value at `count_samples` evenly spaced quantile
//! levels, then picks one level per row by a Beta(a, 1) draw with
//! `a = q / (1 - q)`, so the requested quantile is the mean of the draw
//! rather than a hard cutoff. The generator is re-seeded per predict call,
//! making output a pure function of (model, input, seed).

use std::fs;
use std::path::Path;

use polars::prelude::DataFrame;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ForestConfig, RANDOM_STATE};
use crate::error::{ImputationError, Result};
use crate::models::Imputer;
use crate::stats::QuantileForest;
use crate::types::{Quantile, QuantileImputations};
use crate::utils::{
    check_columns, column_as_f64, detect_categoricals, encoded_column_names, encoded_matrix,
    CategoricalColumn,
};

/// Current on-disk model format version.
pub const MODEL_BLOB_VERSION: u32 = 1;

/// On-disk representation of a fitted model.
#[derive(Serialize, Deserialize)]
struct QrfModelFile {
    version: u32,
    seed: u64,
    categorical_columns: Vec<CategoricalColumn>,
    encoded_columns: Vec<String>,
    output_columns: Vec<String>,
    forest: QuantileForest,
}

/// Minimal probe so a format bump fails with a version error instead of a
/// schema mismatch.
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Debug)]
struct QrfState {
    /// Original predictor names. Absent on models loaded from disk, which
    /// only carry the encoded column set.
    predictors: Option<Vec<String>>,
    categorical_columns: Vec<CategoricalColumn>,
    encoded_columns: Vec<String>,
    output_columns: Vec<String>,
    forest: QuantileForest,
}

/// Quantile-random-forest imputer.
#[derive(Debug)]
pub struct Qrf {
    seed: u64,
    config: ForestConfig,
    state: Option<QrfState>,
}

impl Qrf {
    pub fn new() -> Self {
        Self::with_seed(RANDOM_STATE)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            config: ForestConfig::default(),
            state: None,
        }
    }

    /// Override the forest hyperparameters.
    pub fn with_config(mut self, config: ForestConfig) -> Self {
        self.config = config;
        self
    }

    /// Save the fitted model as a versioned JSON blob.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = self.state.as_ref().ok_or_else(|| ImputationError::NotFitted {
            method: "QRF".to_string(),
        })?;

        let file = QrfModelFile {
            version: MODEL_BLOB_VERSION,
            seed: self.seed,
            categorical_columns: state.categorical_columns.clone(),
            encoded_columns: state.encoded_columns.clone(),
            output_columns: state.output_columns.clone(),
            forest: state.forest.clone(),
        };

        fs::write(path, serde_json::to_string(&file)?)?;
        Ok(())
    }

    /// Load a model previously written by [`Qrf::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;

        let probe: VersionProbe = serde_json::from_str(&text)?;
        if probe.version != MODEL_BLOB_VERSION {
            return Err(ImputationError::UnsupportedBlobVersion {
                found: probe.version,
                expected: MODEL_BLOB_VERSION,
            });
        }

        let file: QrfModelFile = serde_json::from_str(&text)?;
        Ok(Self {
            seed: file.seed,
            config: ForestConfig::default(),
            state: Some(QrfState {
                predictors: None,
                categorical_columns: file.categorical_columns,
                encoded_columns: file.encoded_columns,
                output_columns: file.output_columns,
                forest: file.forest,
            }),
        })
    }

    fn state(&self) -> Result<&QrfState> {
        self.state.as_ref().ok_or_else(|| ImputationError::NotFitted {
            method: "QRF".to_string(),
        })
    }
}

impl Default for Qrf {
    fn default() -> Self {
        Self::new()
    }
}

impl Imputer for Qrf {
    fn name(&self) -> &'static str {
        "QRF"
    }

    fn fit(
        &mut self,
        train: &DataFrame,
        predictors: &[String],
        imputed_variables: &[String],
        _quantiles: Option<&[Quantile]>,
    ) -> Result<()> {
        self.config.validate()?;
        check_columns(train, predictors, "training")?;
        check_columns(train, imputed_variables, "training")?;

        let categorical_columns = detect_categoricals(train, predictors)?;
        let encoded_columns = encoded_column_names(predictors, &categorical_columns);
        let x = encoded_matrix(train, &encoded_columns, &categorical_columns)?;

        let mut y = vec![vec![0.0; imputed_variables.len()]; train.height()];
        for (t, target) in imputed_variables.iter().enumerate() {
            let values = column_as_f64(train, target)?;
            for (row, value) in values.into_iter().enumerate() {
                y[row][t] = value;
            }
        }

        let forest = QuantileForest::fit(&x, &y, &self.config, self.seed)?;

        debug!(
            rows = train.height(),
            features = encoded_columns.len(),
            categoricals = categorical_columns.len(),
            targets = imputed_variables.len(),
            "fitted quantile forest"
        );

        self.state = Some(QrfState {
            predictors: Some(predictors.to_vec()),
            categorical_columns,
            encoded_columns,
            output_columns: imputed_variables.to_vec(),
            forest,
        });
        Ok(())
    }

    fn predict(
        &self,
        test: &DataFrame,
        quantiles: Option<&[Quantile]>,
    ) -> Result<QuantileImputations> {
        let state = self.state()?;

        let x = encoded_matrix(test, &state.encoded_columns, &state.categorical_columns)?;
        let n_rows = x.len();
        let n_targets = state.output_columns.len();

        let count = self.config.count_samples;
        let levels: Vec<f64> = (0..count)
            .map(|i| i as f64 / (count - 1) as f64)
            .collect();
        let level_preds = state.forest.predict_levels(&x, &levels)?;

        let requested: Vec<Quantile> = match quantiles {
            Some(qs) => qs.to_vec(),
            None => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                vec![Quantile::new(rng.gen())?]
            }
        };

        let mut result = QuantileImputations::new();
        for quantile in requested {
            let q = quantile.value();
            let a = q / (1.0 - q);

            // Re-seed per quantile so output depends only on the seed and
            // inputs, never on call order.
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
            let mut columns = vec![Vec::with_capacity(n_rows); n_targets];
            for row_preds in &level_preds {
                let u: f64 = rng.gen();
                // Inverse CDF of Beta(a, 1).
                let beta = u.powf(1.0 / a);
                let level = ((beta * count as f64) as usize).min(count - 1);
                for (t, column) in columns.iter_mut().enumerate() {
                    column.push(row_preds[level][t]);
                }
            }

            result.insert(
                quantile,
                crate::utils::prediction_frame(&state.output_columns, columns)?,
            );
        }

        Ok(result)
    }

    fn predictors(&self) -> Option<&[String]> {
        self.state.as_ref().and_then(|s| s.predictors.as_deref())
    }

    fn imputed_variables(&self) -> Option<&[String]> {
        self.state.as_ref().map(|s| s.output_columns.as_slice())
    }
}
