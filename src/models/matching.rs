//! Statistical matching: impute by fusing each recipient row with its nearest
//! donor row and copying the donor's target values.
//!
//! The matching algorithm sits behind [`MatchingStrategy`] so tests can swap
//! in a double; production uses [`NearestNeighborHotdeck`].

use polars::prelude::*;
use rand::Rng;
use tracing::debug;

use crate::error::{ImputationError, Result};
use crate::models::Imputer;
use crate::types::{Quantile, QuantileImputations};
use crate::utils::{check_columns, column_as_f64, option_matrix};

/// A hot-deck matching algorithm.
///
/// Given a recipient frame (no target columns) and a donor frame, returns the
/// fused recipient (recipient columns plus the `z_variables` copied from each
/// row's matched donor) and the matched donor rows themselves, in recipient
/// order.
pub trait MatchingStrategy: Send {
    fn match_frames(
        &self,
        recipient: &DataFrame,
        donor: &DataFrame,
        matching_variables: &[String],
        z_variables: &[String],
        donor_classes: Option<&str>,
    ) -> Result<(DataFrame, DataFrame)>;
}

/// Unconstrained nearest-neighbor distance hot deck.
///
/// Distance is Euclidean over the matching variables, each scaled by its
/// donor-pool standard deviation; dimensions where either side is null are
/// skipped and the sum is averaged over the dimensions actually used. With a
/// donor-class column, candidates are restricted to donors in the recipient's
/// class, falling back to the whole pool when the class has no donors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestNeighborHotdeck;

impl NearestNeighborHotdeck {
    fn class_labels(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>> {
        let series = df.column(column)?.as_materialized_series();
        let as_string = series.cast(&DataType::String)?;
        let values = as_string.str()?;
        Ok(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    /// Per-variable scale: donor standard deviation, or 1 when degenerate.
    fn scales(donor: &DataFrame, matching_variables: &[String]) -> Result<Vec<f64>> {
        let mut scales = Vec::with_capacity(matching_variables.len());
        for name in matching_variables {
            let values: Vec<f64> = match column_as_f64(donor, name) {
                Ok(v) => v,
                // Nulls are tolerated here: distance skips them per row.
                Err(ImputationError::NullValues { .. }) => {
                    let series = donor.column(name)?.as_materialized_series();
                    let float = series.cast(&DataType::Float64)?;
                    float.f64()?.iter().flatten().collect()
                }
                Err(e) => return Err(e),
            };

            if values.len() < 2 {
                scales.push(1.0);
                continue;
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let var =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            let std = var.sqrt();
            scales.push(if std > 0.0 { std } else { 1.0 });
        }
        Ok(scales)
    }

    fn distance(a: &[Option<f64>], b: &[Option<f64>], scales: &[f64]) -> f64 {
        let mut sum = 0.0;
        let mut used = 0;
        for ((a, b), scale) in a.iter().zip(b).zip(scales) {
            if let (Some(a), Some(b)) = (a, b) {
                let d = (a - b) / scale;
                sum += d * d;
                used += 1;
            }
        }
        if used == 0 {
            f64::MAX
        } else {
            sum / used as f64
        }
    }
}

impl MatchingStrategy for NearestNeighborHotdeck {
    fn match_frames(
        &self,
        recipient: &DataFrame,
        donor: &DataFrame,
        matching_variables: &[String],
        z_variables: &[String],
        donor_classes: Option<&str>,
    ) -> Result<(DataFrame, DataFrame)> {
        if donor.height() == 0 {
            return Err(ImputationError::Internal(
                "donor pool is empty".to_string(),
            ));
        }

        let recipient_rows = option_matrix(recipient, matching_variables)?;
        let donor_rows = option_matrix(donor, matching_variables)?;
        let scales = Self::scales(donor, matching_variables)?;

        let classes = match donor_classes {
            Some(column) => Some((
                Self::class_labels(recipient, column)?,
                Self::class_labels(donor, column)?,
            )),
            None => None,
        };

        let mut matched_indices: Vec<IdxSize> = Vec::with_capacity(recipient_rows.len());
        for (row_idx, row) in recipient_rows.iter().enumerate() {
            let in_class = |donor_idx: usize| -> bool {
                match &classes {
                    Some((recipient_classes, donor_classes)) => {
                        match &recipient_classes[row_idx] {
                            Some(class) => donor_classes[donor_idx].as_deref() == Some(class),
                            None => true,
                        }
                    }
                    None => true,
                }
            };

            let nearest = |restrict: bool| -> Option<usize> {
                let mut best: Option<(usize, f64)> = None;
                for (donor_idx, donor_row) in donor_rows.iter().enumerate() {
                    if restrict && !in_class(donor_idx) {
                        continue;
                    }
                    let d = Self::distance(row, donor_row, &scales);
                    if best.is_none_or(|(_, best_d)| d < best_d) {
                        best = Some((donor_idx, d));
                    }
                }
                best.map(|(idx, _)| idx)
            };

            // Fall back to the whole pool when the class has no donors.
            let chosen = nearest(true).or_else(|| nearest(false)).ok_or_else(|| {
                ImputationError::Internal("no donor candidates".to_string())
            })?;
            matched_indices.push(chosen as IdxSize);
        }

        let index = IdxCa::from_vec("idx".into(), matched_indices);
        let matched = donor.take(&index)?;

        let mut fused = recipient.clone();
        for z in z_variables {
            fused.with_column(matched.column(z)?.clone())?;
        }

        Ok((fused, matched))
    }
}

/// Hot-deck matching imputer. `fit` stores the donor frame; every prediction
/// is a fresh match of the recipient frame against it.
pub struct Matching {
    strategy: Box<dyn MatchingStrategy>,
    donor: Option<DataFrame>,
    donor_class: Option<String>,
    predictors: Option<Vec<String>>,
    imputed_variables: Option<Vec<String>>,
}

impl Matching {
    pub fn new() -> Self {
        Self::with_strategy(NearestNeighborHotdeck)
    }

    /// Use a custom matching algorithm.
    pub fn with_strategy(strategy: impl MatchingStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
            donor: None,
            donor_class: None,
            predictors: None,
            imputed_variables: None,
        }
    }

    /// Restrict donors to the recipient's class in the named column.
    pub fn with_donor_class(mut self, column: impl Into<String>) -> Self {
        self.donor_class = Some(column.into());
        self
    }
}

impl Default for Matching {
    fn default() -> Self {
        Self::new()
    }
}

impl Imputer for Matching {
    fn name(&self) -> &'static str {
        "Matching"
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

        debug!(donors = train.height(), "stored donor pool");

        self.donor = Some(train.clone());
        self.predictors = Some(predictors.to_vec());
        self.imputed_variables = Some(imputed_variables.to_vec());
        Ok(())
    }

    fn predict(
        &self,
        test: &DataFrame,
        quantiles: Option<&[Quantile]>,
    ) -> Result<QuantileImputations> {
        let donor = self.donor.as_ref().ok_or_else(|| ImputationError::NotFitted {
            method: self.name().to_string(),
        })?;
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

        // Target columns may legitimately appear in the recipient; the match
        // must not see them.
        let recipient = test.drop_many(targets.iter().map(String::as_str));

        let (fused, _matched) = self.strategy.match_frames(
            &recipient,
            donor,
            predictors,
            targets,
            self.donor_class.as_deref(),
        )?;

        let frame = fused.select(targets.iter().map(String::as_str))?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::to_quantiles;
    use pretty_assertions::assert_eq;

    fn donor_frame() -> DataFrame {
        df![
            "x" => [0.0, 10.0, 20.0, 30.0],
            "y" => [100.0, 200.0, 300.0, 400.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_nearest_neighbor_copies_closest_donor_target() {
        let mut model = Matching::new();
        model
            .fit(
                &donor_frame(),
                &["x".to_string()],
                &["y".to_string()],
                None,
            )
            .unwrap();

        let test = df!["x" => [1.0, 29.0]].unwrap();
        let quantiles = to_quantiles(&[0.5]).unwrap();
        let result = model.predict(&test, Some(&quantiles)).unwrap();

        let preds = result[&Quantile::median()]
            .column("y")
            .unwrap()
            .f64()
            .unwrap()
            .to_vec();
        assert_eq!(preds, vec![Some(100.0), Some(400.0)]);
    }

    #[test]
    fn test_matching_is_quantile_invariant() {
        let mut model = Matching::new();
        model
            .fit(
                &donor_frame(),
                &["x".to_string()],
                &["y".to_string()],
                None,
            )
            .unwrap();

        let test = df!["x" => [5.0]].unwrap();
        let quantiles = to_quantiles(&[0.25, 0.75]).unwrap();
        let result = model.predict(&test, Some(&quantiles)).unwrap();

        assert_eq!(result.len(), 2);
        let frames: Vec<&DataFrame> = result.values().collect();
        assert_eq!(frames[0], frames[1]);
    }

    #[test]
    fn test_target_column_in_recipient_is_ignored() {
        let mut model = Matching::new();
        model
            .fit(
                &donor_frame(),
                &["x".to_string()],
                &["y".to_string()],
                None,
            )
            .unwrap();

        // A stale target column must not influence the match.
        let test = df![
            "x" => [1.0],
            "y" => [999999.0],
        ]
        .unwrap();
        let quantiles = to_quantiles(&[0.5]).unwrap();
        let result = model.predict(&test, Some(&quantiles)).unwrap();

        let pred = result[&Quantile::median()]
            .column("y")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        assert_eq!(pred, 100.0);
    }

    #[test]
    fn test_null_matching_variable_is_skipped() {
        let donor = df![
            "a" => [0.0, 100.0],
            "b" => [0.0, 1.0],
            "y" => [10.0, 20.0],
        ]
        .unwrap();

        let mut model = Matching::new();
        model
            .fit(
                &donor,
                &["a".to_string(), "b".to_string()],
                &["y".to_string()],
                None,
            )
            .unwrap();

        // `a` is null: only `b` decides, and b=0.9 is nearer 1.0.
        let test = df![
            "a" => [None::<f64>],
            "b" => [Some(0.9)],
        ]
        .unwrap();
        let quantiles = to_quantiles(&[0.5]).unwrap();
        let result = model.predict(&test, Some(&quantiles)).unwrap();

        let pred = result[&Quantile::median()]
            .column("y")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        assert_eq!(pred, 20.0);
    }

    #[test]
    fn test_donor_class_restriction() {
        let donor = df![
            "x" => [0.0, 1.0],
            "region" => ["east", "west"],
            "y" => [10.0, 20.0],
        ]
        .unwrap();

        let mut model = Matching::new().with_donor_class("region");
        model
            .fit(&donor, &["x".to_string()], &["y".to_string()], None)
            .unwrap();

        // x=0.1 is nearest the east donor, but the class forces west.
        let test = df![
            "x" => [0.1],
            "region" => ["west"],
        ]
        .unwrap();
        let quantiles = to_quantiles(&[0.5]).unwrap();
        let result = model.predict(&test, Some(&quantiles)).unwrap();

        let pred = result[&Quantile::median()]
            .column("y")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        assert_eq!(pred, 20.0);
    }

    struct ConstantStrategy(f64);

    impl MatchingStrategy for ConstantStrategy {
        fn match_frames(
            &self,
            recipient: &DataFrame,
            donor: &DataFrame,
            _matching_variables: &[String],
            z_variables: &[String],
            _donor_classes: Option<&str>,
        ) -> Result<(DataFrame, DataFrame)> {
            let mut fused = recipient.clone();
            for z in z_variables {
                let values = vec![self.0; recipient.height()];
                fused.with_column(Column::new(z.as_str().into(), values))?;
            }
            Ok((fused, donor.head(Some(recipient.height()))))
        }
    }

    #[test]
    fn test_custom_strategy_is_honored() {
        let mut model = Matching::with_strategy(ConstantStrategy(7.0));
        model
            .fit(
                &donor_frame(),
                &["x".to_string()],
                &["y".to_string()],
                None,
            )
            .unwrap();

        let test = df!["x" => [1.0, 2.0, 3.0]].unwrap();
        let quantiles = to_quantiles(&[0.5]).unwrap();
        let result = model.predict(&test, Some(&quantiles)).unwrap();

        let preds = result[&Quantile::median()]
            .column("y")
            .unwrap()
            .f64()
            .unwrap()
            .to_vec();
        assert_eq!(preds, vec![Some(7.0); 3]);
    }
}
