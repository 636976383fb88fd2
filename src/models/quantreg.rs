//! Linear quantile regression: one pinball-loss model per (quantile, target)
//! pair, so the quantile list must be known at fit time.

use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use tracing::debug;

use crate::error::{ImputationError, Result};
use crate::models::Imputer;
use crate::stats::{fit_quantile, LinearModel};
use crate::types::{Quantile, QuantileImputations};
use crate::utils::{check_columns, column_as_f64, dense_matrix, prediction_frame};

/// Quantile-regression imputer.
///
/// `fit` without quantiles is an input error. `predict` serves exactly the
/// fitted quantiles: asking for one that was never fitted errors, and asking
/// for none predicts at every fitted quantile.
#[derive(Debug, Default)]
pub struct QuantReg {
    predictors: Option<Vec<String>>,
    imputed_variables: Option<Vec<String>>,
    /// One model per target, keyed by fitted quantile.
    models: BTreeMap<Quantile, Vec<LinearModel>>,
}

impl QuantReg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantiles this model was fitted on, ascending.
    pub fn fitted_quantiles(&self) -> Vec<Quantile> {
        self.models.keys().copied().collect()
    }
}

impl Imputer for QuantReg {
    fn name(&self) -> &'static str {
        "QuantReg"
    }

    fn requires_quantiles_at_fit(&self) -> bool {
        true
    }

    fn fit(
        &mut self,
        train: &DataFrame,
        predictors: &[String],
        imputed_variables: &[String],
        quantiles: Option<&[Quantile]>,
    ) -> Result<()> {
        let quantiles = match quantiles {
            Some(qs) if !qs.is_empty() => qs,
            _ => {
                return Err(ImputationError::QuantilesRequired {
                    method: self.name().to_string(),
                });
            }
        };

        check_columns(train, predictors, "training")?;
        check_columns(train, imputed_variables, "training")?;

        let x = dense_matrix(train, predictors)?;
        let mut models = BTreeMap::new();
        for &quantile in quantiles {
            let mut per_target = Vec::with_capacity(imputed_variables.len());
            for target in imputed_variables {
                let y = column_as_f64(train, target)?;
                per_target.push(fit_quantile(&x, &y, quantile.value())?);
            }
            models.insert(quantile, per_target);
        }

        debug!(
            rows = train.height(),
            quantiles = models.len(),
            targets = imputed_variables.len(),
            "fitted quantile-regression models"
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

        let requested: Vec<Quantile> = match quantiles {
            Some(qs) => qs.to_vec(),
            None => self.fitted_quantiles(),
        };

        let mut result = QuantileImputations::new();
        for quantile in requested {
            let per_target =
                self.models
                    .get(&quantile)
                    .ok_or_else(|| ImputationError::QuantileNotFitted {
                        method: self.name().to_string(),
                        quantile: quantile.value(),
                    })?;

            let columns: Vec<Vec<f64>> = per_target.iter().map(|m| m.predict(&x)).collect();
            result.insert(quantile, prediction_frame(targets, columns)?);
        }

        Ok(result)
    }

    fn predictors(&self) -> Option<&[String]> {
        self.predictors.as_deref()
    }

    fn imputed_variables(&self) -> Option<&[String]> {
        self.imputed_variables.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::to_quantiles;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn train_frame() -> DataFrame {
        // y = x plus asymmetric noise so quantile lines separate.
        let x: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..60)
            .map(|i| i as f64 + if i % 4 == 0 { 6.0 } else { -1.0 })
            .collect();
        df!["x" => x, "y" => y].unwrap()
    }

    fn fitted() -> QuantReg {
        let mut model = QuantReg::new();
        let quantiles = to_quantiles(&[0.1, 0.9]).unwrap();
        model
            .fit(
                &train_frame(),
                &["x".to_string()],
                &["y".to_string()],
                Some(&quantiles),
            )
            .unwrap();
        model
    }

    #[test]
    fn test_fit_without_quantiles_is_an_error() {
        let mut model = QuantReg::new();
        assert!(matches!(
            model.fit(&train_frame(), &["x".to_string()], &["y".to_string()], None),
            Err(ImputationError::QuantilesRequired { .. })
        ));
    }

    #[test]
    fn test_predict_keys_match_fitted_quantiles() {
        let model = fitted();
        let test = df!["x" => [10.0, 30.0]].unwrap();
        let result = model.predict(&test, None).unwrap();

        let keys: Vec<f64> = result.keys().map(|q| q.value()).collect();
        assert_eq!(keys, vec![0.1, 0.9]);
        for frame in result.values() {
            assert_eq!(frame.height(), 2);
        }
    }

    #[test]
    fn test_unfitted_quantile_errors() {
        let model = fitted();
        let test = df!["x" => [10.0]].unwrap();
        let quantiles = to_quantiles(&[0.5]).unwrap();

        match model.predict(&test, Some(&quantiles)) {
            Err(ImputationError::QuantileNotFitted { method, quantile }) => {
                assert_eq!(method, "QuantReg");
                assert_eq!(quantile, 0.5);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_quantile_predictions_are_ordered() {
        let model = fitted();
        let test = df!["x" => [10.0, 20.0, 30.0]].unwrap();
        let result = model.predict(&test, None).unwrap();

        let low = result[&Quantile::new(0.1).unwrap()]
            .column("y")
            .unwrap()
            .f64()
            .unwrap()
            .to_vec();
        let high = result[&Quantile::new(0.9).unwrap()]
            .column("y")
            .unwrap()
            .f64()
            .unwrap()
            .to_vec();

        for (lo, hi) in low.iter().zip(&high) {
            assert!(hi.unwrap() > lo.unwrap());
        }
    }
}
