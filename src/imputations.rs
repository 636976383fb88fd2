//! Benchmark orchestration: run several imputation methods over the same
//! train/test split and collect their per-quantile predictions.

use polars::prelude::DataFrame;
use tracing::{error, info};

use crate::config::QUANTILES;
use crate::error::{ImputationError, Result, ResultExt};
use crate::models::{Imputer, Method};
use crate::types::{to_quantiles, MethodImputations, Quantile};
use crate::utils::check_columns;

/// Generate imputations with every method in `methods`.
///
/// Inputs are validated up front: the method list and both frames must be
/// non-empty, predictors must exist in both frames, imputed variables in the
/// training frame, and every quantile must lie in `[0, 1]`. `quantiles: None`
/// falls back to [`QUANTILES`].
///
/// Any model failure aborts the whole run: the result never mixes methods
/// that succeeded with methods that did not.
pub fn get_imputations(
    methods: &[Method],
    x_train: &DataFrame,
    x_test: &DataFrame,
    predictors: &[String],
    imputed_variables: &[String],
    quantiles: Option<&[f64]>,
) -> Result<MethodImputations> {
    if methods.is_empty() {
        error!("method list is empty");
        return Err(ImputationError::EmptyMethodList);
    }
    validate_frames(x_train, x_test)?;
    check_columns(x_train, predictors, "training")?;
    check_columns(x_train, imputed_variables, "training")?;
    // Imputed variables may legitimately be absent from the test frame.
    check_columns(x_test, predictors, "test")?;

    let quantiles = to_quantiles(quantiles.unwrap_or(&QUANTILES))?;

    info!(
        methods = methods.len(),
        train_rows = x_train.height(),
        test_rows = x_test.height(),
        predictors = predictors.len(),
        imputed_variables = imputed_variables.len(),
        quantiles = quantiles.len(),
        "generating imputations"
    );

    let mut imputers: Vec<Box<dyn Imputer>> = methods.iter().map(Method::build).collect();
    run_imputers(
        &mut imputers,
        x_train,
        x_test,
        predictors,
        imputed_variables,
        &quantiles,
    )
}

/// Drive a set of already-constructed imputers over the same split.
///
/// This is the layer under [`get_imputations`]; it does no input validation
/// and accepts any [`Imputer`] implementation, which is what tests use to
/// inject failing doubles. Results are keyed by each imputer's name, and any
/// failure is wrapped as [`ImputationError::MethodFailed`] and aborts the run.
pub fn run_imputers(
    imputers: &mut [Box<dyn Imputer>],
    x_train: &DataFrame,
    x_test: &DataFrame,
    predictors: &[String],
    imputed_variables: &[String],
    quantiles: &[Quantile],
) -> Result<MethodImputations> {
    let mut results = MethodImputations::new();

    for imputer in imputers {
        let name = imputer.name();
        info!(method = name, "fitting");

        // Only methods that train one sub-model per quantile see the list at
        // fit time.
        let fit_quantiles = imputer.requires_quantiles_at_fit().then_some(quantiles);
        imputer
            .fit(x_train, predictors, imputed_variables, fit_quantiles)
            .for_method(name)?;

        info!(method = name, "predicting");
        let imputations = imputer.predict(x_test, Some(quantiles)).for_method(name)?;

        info!(
            method = name,
            quantiles = imputations.len(),
            rows = imputations.values().next().map_or(0, DataFrame::height),
            "method finished"
        );
        results.insert(name.to_string(), imputations);
    }

    info!(methods = results.len(), "all methods finished");
    Ok(results)
}

fn validate_frames(x_train: &DataFrame, x_test: &DataFrame) -> Result<()> {
    for (frame, name) in [(x_train, "training"), (x_test, "test")] {
        if frame.height() == 0 || frame.width() == 0 {
            error!(frame = name, "empty frame");
            return Err(ImputationError::EmptyFrame {
                frame: name.to_string(),
            });
        }
    }
    Ok(())
}
