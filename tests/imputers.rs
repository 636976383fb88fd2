//! Integration tests exercising the imputer contract and the orchestrator
//! end to end.

use impute_bench::{
    get_imputations, run_imputers, ImputationError, Imputer, Method, Quantile, to_quantiles,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;

/// A deterministic split: income driven by age, hours, and education with a
/// wobble so quantile spreads are non-degenerate.
fn make_split(n_train: usize, n_test: usize) -> (DataFrame, DataFrame) {
    let build = |offset: usize, n: usize| {
        let age: Vec<f64> = (0..n).map(|i| 20.0 + ((i + offset) % 45) as f64).collect();
        let hours: Vec<f64> = (0..n).map(|i| 20.0 + ((i + offset) % 25) as f64).collect();
        let education: Vec<f64> = (0..n).map(|i| 8.0 + ((i + offset) % 13) as f64).collect();
        let income: Vec<f64> = (0..n)
            .map(|i| {
                1000.0
                    + 120.0 * age[i]
                    + 80.0 * hours[i]
                    + 300.0 * education[i]
                    + ((i % 7) as f64 - 3.0) * 250.0
            })
            .collect();
        df![
            "age" => age,
            "hours" => hours,
            "education" => education,
            "income" => income,
        ]
        .unwrap()
    };
    (build(0, n_train), build(13, n_test))
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Route orchestrator logs through the test harness (RUST_LOG to enable).
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn all_methods() -> [Method; 4] {
    [Method::Ols, Method::QuantReg, Method::Qrf, Method::Matching]
}

#[test]
fn fitted_state_is_none_until_fit() {
    for method in all_methods() {
        let imputer = method.build();
        assert!(imputer.predictors().is_none(), "{method}");
        assert!(imputer.imputed_variables().is_none(), "{method}");
    }
}

#[test]
fn fit_stores_variable_lists() {
    let (train, _) = make_split(80, 10);
    let predictors = names(&["age", "hours"]);
    let imputed = names(&["income"]);
    let quantiles = to_quantiles(&[0.5]).unwrap();

    for method in all_methods() {
        let mut imputer = method.build();
        imputer
            .fit(&train, &predictors, &imputed, Some(&quantiles))
            .unwrap();
        assert_eq!(imputer.predictors(), Some(predictors.as_slice()), "{method}");
        assert_eq!(
            imputer.imputed_variables(),
            Some(imputed.as_slice()),
            "{method}"
        );
    }
}

#[test]
fn predictions_cover_requested_quantiles_and_rows() {
    let (train, test) = make_split(100, 20);
    let predictors = names(&["age", "hours"]);
    let imputed = names(&["income"]);
    let quantiles = to_quantiles(&[0.25, 0.5, 0.75]).unwrap();

    for method in all_methods() {
        let mut imputer = method.build();
        imputer
            .fit(&train, &predictors, &imputed, Some(&quantiles))
            .unwrap();
        let result = imputer.predict(&test, Some(&quantiles)).unwrap();

        let keys: Vec<Quantile> = result.keys().copied().collect();
        assert_eq!(keys, quantiles, "{method}");
        for (q, frame) in &result {
            assert_eq!(frame.height(), test.height(), "{method} at {q}");
            assert_eq!(frame.get_column_names_str(), ["income"], "{method} at {q}");
        }
    }
}

#[test]
fn orchestrator_runs_all_methods_end_to_end() {
    init_logs();
    let (train, test) = make_split(100, 20);
    let results = get_imputations(
        &all_methods(),
        &train,
        &test,
        &names(&["age", "hours", "education"]),
        &names(&["income"]),
        Some(&[0.25, 0.5, 0.75]),
    )
    .unwrap();

    assert_eq!(results.len(), 4);
    for name in ["OLS", "QuantReg", "QRF", "Matching"] {
        let by_quantile = &results[name];
        assert_eq!(by_quantile.len(), 3, "{name}");
        for frame in by_quantile.values() {
            assert_eq!(frame.height(), 20, "{name}");
        }
    }
}

#[test]
fn quantreg_keys_match_exactly() {
    let (train, test) = make_split(100, 10);
    let results = get_imputations(
        &[Method::QuantReg],
        &train,
        &test,
        &names(&["age", "hours"]),
        &names(&["income"]),
        Some(&[0.1, 0.9]),
    )
    .unwrap();

    let keys: Vec<f64> = results["QuantReg"].keys().map(|q| q.value()).collect();
    assert_eq!(keys, vec![0.1, 0.9]);
}

#[test]
fn ols_and_matching_are_quantile_invariant() {
    let (train, test) = make_split(100, 10);
    let results = get_imputations(
        &[Method::Ols, Method::Matching],
        &train,
        &test,
        &names(&["age", "hours"]),
        &names(&["income"]),
        Some(&[0.1, 0.5, 0.9]),
    )
    .unwrap();

    for name in ["OLS", "Matching"] {
        let frames: Vec<&DataFrame> = results[name].values().collect();
        assert_eq!(frames[0], frames[1], "{name}");
        assert_eq!(frames[1], frames[2], "{name}");
    }
}

#[test]
fn qrf_is_reproducible_across_runs() {
    let (train, test) = make_split(100, 15);
    let run = || {
        get_imputations(
            &[Method::Qrf],
            &train,
            &test,
            &names(&["age", "hours"]),
            &names(&["income"]),
            Some(&[0.25, 0.5, 0.75]),
        )
        .unwrap()
    };

    let a = run();
    let b = run();
    assert_eq!(a["QRF"], b["QRF"]);
}

#[test]
fn validation_errors_surface_before_any_method_runs() {
    let (train, test) = make_split(50, 10);

    // A bad quantile is an input error even though every method was valid.
    let err = get_imputations(
        &all_methods(),
        &train,
        &test,
        &names(&["age", "hours"]),
        &names(&["income"]),
        Some(&[0.5, -0.1]),
    )
    .unwrap_err();
    assert!(err.is_input_error());
    assert!(matches!(err, ImputationError::InvalidQuantile { value } if value == -0.1));

    // Missing predictor columns are reported per frame, all at once.
    let err = get_imputations(
        &all_methods(),
        &train,
        &test,
        &names(&["age", "missing_a", "missing_b"]),
        &names(&["income"]),
        Some(&[0.5]),
    )
    .unwrap_err();
    match err {
        ImputationError::MissingColumns { frame, columns } => {
            assert_eq!(frame, "training");
            assert_eq!(columns, names(&["missing_a", "missing_b"]));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Fails on every predict, for testing the abort-on-failure guarantee.
struct FailingImputer {
    fitted: Option<(Vec<String>, Vec<String>)>,
}

impl Imputer for FailingImputer {
    fn name(&self) -> &'static str {
        "Failing"
    }

    fn fit(
        &mut self,
        _train: &DataFrame,
        predictors: &[String],
        imputed_variables: &[String],
        _quantiles: Option<&[Quantile]>,
    ) -> impute_bench::Result<()> {
        self.fitted = Some((predictors.to_vec(), imputed_variables.to_vec()));
        Ok(())
    }

    fn predict(
        &self,
        _test: &DataFrame,
        _quantiles: Option<&[Quantile]>,
    ) -> impute_bench::Result<impute_bench::QuantileImputations> {
        Err(ImputationError::Internal("synthetic failure".to_string()))
    }

    fn predictors(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|(p, _)| p.as_slice())
    }

    fn imputed_variables(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|(_, v)| v.as_slice())
    }
}

#[test]
fn one_failing_method_aborts_the_whole_run() {
    let (train, test) = make_split(60, 10);
    let predictors = names(&["age", "hours"]);
    let imputed = names(&["income"]);
    let quantiles = to_quantiles(&[0.5]).unwrap();

    let mut imputers: Vec<Box<dyn Imputer>> = vec![
        Method::Ols.build(),
        Box::new(FailingImputer { fitted: None }),
    ];

    let err = run_imputers(
        &mut imputers,
        &train,
        &test,
        &predictors,
        &imputed,
        &quantiles,
    )
    .unwrap_err();

    match err {
        ImputationError::MethodFailed { method, source } => {
            assert_eq!(method, "Failing");
            assert!(matches!(*source, ImputationError::Internal(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn quantile_spread_is_ordered_for_quantile_methods() {
    let (train, test) = make_split(120, 10);
    let results = get_imputations(
        &[Method::QuantReg, Method::Qrf],
        &train,
        &test,
        &names(&["age", "hours"]),
        &names(&["income"]),
        Some(&[0.1, 0.9]),
    )
    .unwrap();

    for name in ["QuantReg", "QRF"] {
        let by_quantile = &results[name];
        let low = by_quantile[&Quantile::new(0.1).unwrap()]
            .column("income")
            .unwrap()
            .f64()
            .unwrap()
            .mean()
            .unwrap();
        let high = by_quantile[&Quantile::new(0.9).unwrap()]
            .column("income")
            .unwrap()
            .f64()
            .unwrap()
            .mean()
            .unwrap();
        assert!(high >= low, "{name}: {high} < {low}");
    }
}
