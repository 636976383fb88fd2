//! Linear model solvers: ordinary least squares and pinball-loss quantile
//! regression via iteratively reweighted least squares (IRLS).
//!
//! Both fit a single response against a row-major feature matrix with an
//! intercept added internally.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{ImputationError, Result};

/// Maximum IRLS iterations before accepting the current coefficients.
const IRLS_MAX_ITER: usize = 50;

/// Coefficient-change threshold below which IRLS stops.
const IRLS_TOL: f64 = 1e-8;

/// Residual floor guarding the IRLS weights against division by zero.
const IRLS_EPS: f64 = 1e-6;

/// A fitted linear model. Coefficient 0 is the intercept, the rest follow
/// the feature order of the fitting matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    coefficients: Vec<f64>,
}

impl LinearModel {
    /// The fitted coefficients, intercept first.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Predict a single row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut value = self.coefficients[0];
        for (coef, x) in self.coefficients[1..].iter().zip(row) {
            value += coef * x;
        }
        value
    }

    /// Predict every row of a row-major matrix.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// Fit ordinary least squares coefficients.
pub fn fit_least_squares(x: &[Vec<f64>], y: &[f64]) -> Result<LinearModel> {
    let coefficients = solve_weighted(x, y, None, "fitting least squares")?;
    Ok(LinearModel { coefficients })
}

/// Fit a quantile regression at level `tau` by IRLS on the pinball loss.
///
/// Starts from the least-squares solution and reweights residuals with
/// `tau / |r|` above the line and `(1 - tau) / |r|` below it until the
/// coefficients stop moving.
pub fn fit_quantile(x: &[Vec<f64>], y: &[f64], tau: f64) -> Result<LinearModel> {
    let mut coefficients = solve_weighted(x, y, None, "initializing quantile regression")?;

    for _ in 0..IRLS_MAX_ITER {
        let model = LinearModel {
            coefficients: coefficients.clone(),
        };

        let weights: Vec<f64> = x
            .iter()
            .zip(y)
            .map(|(row, &target)| {
                let residual = target - model.predict_row(row);
                if residual >= 0.0 {
                    tau / residual.max(IRLS_EPS)
                } else {
                    (1.0 - tau) / (-residual).max(IRLS_EPS)
                }
            })
            .collect();

        let updated = solve_weighted(x, y, Some(&weights), "reweighting quantile regression")?;

        let max_change = coefficients
            .iter()
            .zip(&updated)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        coefficients = updated;

        if max_change < IRLS_TOL {
            break;
        }
    }

    Ok(LinearModel { coefficients })
}

/// Solve the (optionally weighted) normal equations for a design matrix with
/// an intercept column prepended.
fn solve_weighted(
    x: &[Vec<f64>],
    y: &[f64],
    weights: Option<&[f64]>,
    context: &str,
) -> Result<Vec<f64>> {
    if x.is_empty() {
        return Err(ImputationError::Internal(format!(
            "empty design matrix while {context}"
        )));
    }
    if x.len() != y.len() {
        return Err(ImputationError::Internal(format!(
            "design matrix has {} rows but response has {} while {context}",
            x.len(),
            y.len()
        )));
    }

    let n_features = x[0].len();
    let p = n_features + 1;

    let mut xtx = DMatrix::<f64>::zeros(p, p);
    let mut xty = DVector::<f64>::zeros(p);
    let mut row_buf = vec![0.0; p];

    for (i, row) in x.iter().enumerate() {
        if row.len() != n_features {
            return Err(ImputationError::Internal(format!(
                "ragged design matrix while {context}"
            )));
        }
        let w = weights.map_or(1.0, |w| w[i]);

        row_buf[0] = 1.0;
        row_buf[1..].copy_from_slice(row);

        for a in 0..p {
            xty[a] += w * row_buf[a] * y[i];
            for b in a..p {
                xtx[(a, b)] += w * row_buf[a] * row_buf[b];
            }
        }
    }

    // Mirror the upper triangle.
    for a in 0..p {
        for b in (a + 1)..p {
            xtx[(b, a)] = xtx[(a, b)];
        }
    }

    let solution = xtx.lu().solve(&xty).ok_or_else(|| ImputationError::Singular {
        context: context.to_string(),
    })?;

    Ok(solution.iter().copied().collect())
}
