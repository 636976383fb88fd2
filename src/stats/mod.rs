//! In-crate statistical primitives backing the imputation models.
//!
//! The adapters in [`crate::models`] treat these as opaque: a multi-output
//! quantile random forest and pinball-loss / least-squares linear solvers.

pub mod forest;
pub mod linear;

pub use forest::QuantileForest;
pub use linear::{LinearModel, fit_least_squares, fit_quantile};
