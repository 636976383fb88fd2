//! Ordinary least squares baseline: one linear model per imputed variable,
//! deterministic point predictions repeated under every requested quantile.

use polars::prelude::DataFrame;
use rand::Rng;
use tracing::debug;

use crate::error::{ImputationError, Result};
use crate::models::Imputer;
use crate::stats::{fit_least_squares, LinearModel};
use crate::types::{Quantile, QuantileImputations};
use crate::utils::{check_columns, column_as_f64, dense_matrix, prediction_frame};

/// Least-squares imputation baseline.
///
/// The point prediction is quantile-invariant: every requested quantile maps
/// to the identical frame. With no quantiles requested, a single uniformly
/// drawn key carries the point prediction.
#[derive(Debug, Default)]
pub struct Ols {
    predictors: Option<Vec<String>>,
    imputed_variables: Option<Vec<String>>,
    models: Vec<LinearModel>,
}

impl Ols {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Imputer for Ols {
    fn name(&self) -> &'static str {
        "OLS"
    }

    fn fit(
        &mut self,
        train: &DataFrame,
        predictors: &[String],
        imputed_variables: &[String],
        _quantiles: Option<&[Quantile]>,
    ) -> Result<()> {
        check_columns(train, predictors, "training")?;
        check_columns(train, imputed_variables, "training")?;

        let x = dense_matrix(train, predictors)?;
        let mut models = Vec::with_capacity(imputed_variables.len());
        for target in imputed_variables {
            let y = column_as_f64(train, target)?;
            models.push(fit_least_squares(&x, &y)?);
        }

        debug!(
            rows = train.height(),
            targets = imputed_variables.len(),
            "fitted least-squares models"
        );

        self.predictors = Some(predictors.to_vec());
        self.imputed_variables = Some(imputed_variables.to_vec());
        self.models = models;
        Ok(())
    }

    fn predict(
        &self,
        test: &DataFrame,
        quantiles: Option<&[Quantile]>,
    ) -> Result<QuantileImputations> {
        let predictors = self
            .predictors
            .as_deref()
            .ok_or_else(|| ImputationError::NotFitted {
                method: self.name().to_string(),
            })?;
        let targets = self
            .imputed_variables
            .as_deref()
            .ok_or_else(|| ImputationError::NotFitted {
                method: self.name().to_string(),
            })?;

        check_columns(test, predictors, "test")?;
        let x = dense_matrix(test, predictors)?;

        let columns: Vec<Vec<f64>> = self.models.iter().map(|m| m.predict(&x)).collect();
        let frame = prediction_frame(targets, columns)?;

        let keys: Vec<Quantile> = match quantiles {
            Some(qs) => qs.to_vec(),
            None => vec![Quantile::new(rand::thread_rng().gen())?],
        };

        Ok(keys.into_iter().map(|q| (q, frame.clone())).collect())
    }

    fn predictors(&self) -> Option<&[String]> {
        self.predictors.as_deref()
    }

    fn imputed_variables(&self) -> Option<&[String]> {
        self.imputed_variables.as_deref()
    }
}
