//! Imputation Benchmarking Library
//!
//! Benchmark statistical imputation methods against held-out data, producing
//! per-quantile predictions from every method over the same train/test split.
//!
//! # Overview
//!
//! Four methods ship behind the uniform [`Imputer`] contract:
//!
//! - **QRF**: quantile random forest with beta-sampled quantile selection
//! - **QuantReg**: one pinball-loss linear model per requested quantile
//! - **Matching**: nearest-neighbor distance hot-deck matching
//! - **OLS**: least-squares point predictions as a deterministic baseline
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use impute_bench::{get_imputations, Method};
//! use polars::prelude::*;
//!
//! let train = CsvReader::from_path("train.csv")?.finish()?;
//! let test = CsvReader::from_path("test.csv")?.finish()?;
//!
//! let predictors = vec!["age".to_string(), "education".to_string()];
//! let imputed = vec!["income".to_string()];
//!
//! let results = get_imputations(
//!     &[Method::Qrf, Method::QuantReg, Method::Matching, Method::Ols],
//!     &train,
//!     &test,
//!     &predictors,
//!     &imputed,
//!     Some(&[0.1, 0.5, 0.9]),
//! )?;
//!
//! // results["QRF"][&quantile] is a DataFrame of imputed values.
//! for (method, by_quantile) in &results {
//!     println!("{method}: {} quantiles", by_quantile.len());
//! }
//! ```
//!
//! # Custom imputers
//!
//! [`run_imputers`] drives any set of [`Imputer`] implementations, so a
//! caller can benchmark its own method next to the built-ins. The
//! [`Matching`](models::Matching) adapter additionally accepts a custom
//! [`MatchingStrategy`](models::MatchingStrategy).
//!
//! # Persistence
//!
//! A fitted [`Qrf`](models::Qrf) model can be saved to and loaded from a
//! versioned JSON blob, see [`Qrf::save`](models::Qrf::save) and
//! [`Qrf::load`](models::Qrf::load).

pub mod config;
pub mod error;
pub mod imputations;
pub mod models;
pub mod stats;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{ForestConfig, QUANTILES, RANDOM_STATE};
pub use error::{ImputationError, Result, ResultExt};
pub use imputations::{get_imputations, run_imputers};
pub use models::{Imputer, Matching, MatchingStrategy, Method, NearestNeighborHotdeck, Ols, Qrf, QuantReg};
pub use types::{to_quantiles, MethodImputations, Quantile, QuantileImputations};
