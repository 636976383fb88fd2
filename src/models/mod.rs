//! Imputation models and the capability contract they share.
//!
//! Every method implements [`Imputer`]: fit once on a training frame, then
//! predict per-quantile imputations for a test frame. The
//! [`Method`] enum names the built-in methods and constructs fresh instances
//! for the orchestrator.

mod matching;
mod ols;
mod qrf;
mod quantreg;

pub use matching::{Matching, MatchingStrategy, NearestNeighborHotdeck};
pub use ols::Ols;
pub use qrf::Qrf;
pub use quantreg::QuantReg;

use polars::prelude::DataFrame;

use crate::error::Result;
use crate::types::{Quantile, QuantileImputations};

/// The uniform fit/predict contract shared by all imputation methods.
///
/// Lifecycle: construct, `fit` exactly once, then `predict` any number of
/// times. Before `fit`, [`predictors`](Imputer::predictors) and
/// [`imputed_variables`](Imputer::imputed_variables) report `None`.
pub trait Imputer: Send {
    /// Method name used as the key in orchestrator results.
    fn name(&self) -> &'static str;

    /// Whether `fit` needs the quantile list because the method trains one
    /// sub-model per quantile. The orchestrator consults this flag instead of
    /// comparing method names.
    fn requires_quantiles_at_fit(&self) -> bool {
        false
    }

    /// Fit the model. `quantiles` is only meaningful for methods whose
    /// [`requires_quantiles_at_fit`](Imputer::requires_quantiles_at_fit)
    /// returns `true`; others ignore it.
    fn fit(
        &mut self,
        train: &DataFrame,
        predictors: &[String],
        imputed_variables: &[String],
        quantiles: Option<&[Quantile]>,
    ) -> Result<()>;

    /// Predict imputations for `test` at the requested quantiles.
    ///
    /// The returned key set is a subset of the request (equal for
    /// deterministic methods). When `quantiles` is `None` a single quantile
    /// key is chosen per the method's documented default policy. Never
    /// mutates `test`.
    fn predict(
        &self,
        test: &DataFrame,
        quantiles: Option<&[Quantile]>,
    ) -> Result<QuantileImputations>;

    /// Predictor column names stored at fit time; `None` before `fit`.
    fn predictors(&self) -> Option<&[String]>;

    /// Imputed variable names stored at fit time; `None` before `fit`.
    fn imputed_variables(&self) -> Option<&[String]>;
}

/// The built-in imputation methods, in the form the orchestrator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Ordinary least squares point predictions.
    Ols,
    /// One linear quantile regression per requested quantile.
    QuantReg,
    /// Quantile random forest with beta-sampled quantile selection.
    Qrf,
    /// Nearest-neighbor distance hot-deck matching.
    Matching,
}

impl Method {
    /// The name used to key orchestrator results.
    pub fn name(&self) -> &'static str {
        match self {
            Method::Ols => "OLS",
            Method::QuantReg => "QuantReg",
            Method::Qrf => "QRF",
            Method::Matching => "Matching",
        }
    }

    /// Construct a fresh, unfitted instance of this method.
    pub fn build(&self) -> Box<dyn Imputer> {
        match self {
            Method::Ols => Box::new(Ols::new()),
            Method::QuantReg => Box::new(QuantReg::new()),
            Method::Qrf => Box::new(Qrf::new()),
            Method::Matching => Box::new(Matching::new()),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Adapters move across threads in callers that parallelize benchmark runs.
static_assertions::assert_impl_all!(Ols: Send);
static_assertions::assert_impl_all!(QuantReg: Send);
static_assertions::assert_impl_all!(Qrf: Send);
static_assertions::assert_impl_all!(Matching: Send);
