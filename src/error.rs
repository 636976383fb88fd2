//! Custom error types for the imputation benchmark.
//!
//! This module provides the error hierarchy using `thiserror`, split into two
//! families: input errors raised by validation before any model is touched,
//! and processing errors raised while fitting or predicting with a model.
//!
//! Errors are serializable as `{code, message}` payloads so callers can route
//! them to UIs or logs without string matching.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for imputation operations.
#[derive(Error, Debug)]
pub enum ImputationError {
    /// The orchestrator was called with no methods to run.
    #[error("method list is empty")]
    EmptyMethodList,

    /// A frame passed to the orchestrator has no rows or no columns.
    #[error("{frame} frame is empty")]
    EmptyFrame {
        frame: String,
    },

    /// Required columns are absent from a frame.
    #[error("Missing columns in {frame} data: {columns:?}")]
    MissingColumns {
        frame: String,
        columns: Vec<String>,
    },

    /// A quantile outside [0, 1] (or non-finite) was requested.
    #[error("Invalid quantile (must be between 0 and 1): {value}")]
    InvalidQuantile {
        value: f64,
    },

    /// A column contains nulls where a dense numeric matrix is required.
    #[error("Column '{column}' contains null values")]
    NullValues {
        column: String,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A model that fits one sub-model per quantile was fitted without any.
    #[error("{method} requires quantiles at fit time")]
    QuantilesRequired {
        method: String,
    },

    /// `predict` was called before `fit`.
    #[error("{method} has not been fitted")]
    NotFitted {
        method: String,
    },

    /// `predict` asked a quantile-specific model for a quantile it was not
    /// fitted on.
    #[error("{method} was not fitted for quantile {quantile}")]
    QuantileNotFitted {
        method: String,
        quantile: f64,
    },

    /// A linear system could not be solved (collinear or degenerate design).
    #[error("Singular system while {context}")]
    Singular {
        context: String,
    },

    /// A persisted model blob carries a version this build cannot read.
    #[error("Unsupported model blob version {found} (expected {expected})")]
    UnsupportedBlobVersion {
        found: u32,
        expected: u32,
    },

    /// A model failed during fit or predict; wraps the original error with
    /// the failing method's name. Aborts the whole orchestration run.
    #[error("Failed to process method {method}: {source}")]
    MethodFailed {
        method: String,
        #[source]
        source: Box<ImputationError>,
    },

    /// Internal error (invariant violation, shape mismatch).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImputationError {
    /// Get a stable error code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyMethodList => "EMPTY_METHOD_LIST",
            Self::EmptyFrame { .. } => "EMPTY_FRAME",
            Self::MissingColumns { .. } => "MISSING_COLUMNS",
            Self::InvalidQuantile { .. } => "INVALID_QUANTILE",
            Self::NullValues { .. } => "NULL_VALUES",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::QuantilesRequired { .. } => "QUANTILES_REQUIRED",
            Self::NotFitted { .. } => "NOT_FITTED",
            Self::QuantileNotFitted { .. } => "QUANTILE_NOT_FITTED",
            Self::Singular { .. } => "SINGULAR_SYSTEM",
            Self::UnsupportedBlobVersion { .. } => "UNSUPPORTED_BLOB_VERSION",
            Self::MethodFailed { .. } => "METHOD_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// Check if this error was raised by input validation rather than by a
    /// running model. Input errors are surfaced verbatim; everything else is
    /// wrapped into [`ImputationError::MethodFailed`] by the orchestrator.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyMethodList
                | Self::EmptyFrame { .. }
                | Self::MissingColumns { .. }
                | Self::InvalidQuantile { .. }
                | Self::InvalidConfig(_)
                | Self::QuantilesRequired { .. }
        )
    }

    /// Wrap this error with the name of the method that raised it.
    pub fn in_method(self, method: impl Into<String>) -> Self {
        ImputationError::MethodFailed {
            method: method.into(),
            source: Box::new(self),
        }
    }
}

/// Serialize implementation producing `{code, message}` payloads.
impl Serialize for ImputationError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ImputationError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for imputation operations.
pub type Result<T> = std::result::Result<T, ImputationError>;

/// Extension trait for annotating results with the failing method's name.
pub trait ResultExt<T> {
    /// Wrap an error result into [`ImputationError::MethodFailed`].
    fn for_method(self, method: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn for_method(self, method: &str) -> Result<T> {
        self.map_err(|e| e.in_method(method))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn for_method(self, method: &str) -> Result<T> {
        self.map_err(|e| ImputationError::Polars(e).in_method(method))
    }
}
