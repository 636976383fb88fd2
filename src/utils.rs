//! Shared frame utilities: column validation, numeric matrix extraction,
//! and one-hot encoding of string-typed predictors.

use polars::prelude::*;

use crate::error::{ImputationError, Result};

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds category-like string data.
#[inline]
pub fn is_string_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

// =============================================================================
// Column Validation
// =============================================================================

/// Verify that every named column exists in `df`, reporting all missing
/// columns at once.
pub fn check_columns(df: &DataFrame, columns: &[String], frame: &str) -> Result<()> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|col| df.column(col).is_err())
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImputationError::MissingColumns {
            frame: frame.to_string(),
            columns: missing,
        })
    }
}

// =============================================================================
// Matrix Extraction
// =============================================================================

/// Extract a column as a dense `f64` vector. Nulls are an error: the models
/// consuming these matrices have no notion of missingness in their inputs.
pub fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df.column(name)?.as_materialized_series();
    let float_series = series.cast(&DataType::Float64)?;
    let values = float_series.f64()?;

    let mut out = Vec::with_capacity(df.height());
    for v in values.iter() {
        match v {
            Some(v) => out.push(v),
            None => {
                return Err(ImputationError::NullValues {
                    column: name.to_string(),
                });
            }
        }
    }
    Ok(out)
}

/// Build a row-major dense matrix from the named columns. Nulls are an error.
pub fn dense_matrix(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<f64>>> {
    let n_rows = df.height();
    let mut matrix = vec![vec![0.0; columns.len()]; n_rows];

    for (col_idx, name) in columns.iter().enumerate() {
        let values = column_as_f64(df, name)?;
        for (row, value) in values.into_iter().enumerate() {
            matrix[row][col_idx] = value;
        }
    }

    Ok(matrix)
}

/// Build a row-major matrix preserving nulls, for distance computations that
/// skip missing dimensions.
pub fn option_matrix(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
    let n_rows = df.height();
    let n_cols = columns.len();
    let mut matrix = vec![vec![None; n_cols]; n_rows];

    for (col_idx, name) in columns.iter().enumerate() {
        let series = df.column(name)?.as_materialized_series();
        let float_series = series.cast(&DataType::Float64)?;
        let values = float_series.f64()?;

        for (row, slot) in matrix.iter_mut().enumerate().take(n_rows) {
            slot[col_idx] = values.get(row);
        }
    }

    Ok(matrix)
}

/// Assemble per-target prediction vectors into a frame, one column per
/// target, in the order given.
pub fn prediction_frame(targets: &[String], columns: Vec<Vec<f64>>) -> Result<DataFrame> {
    let columns: Vec<Column> = targets
        .iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name.as_str().into(), values))
        .collect();
    Ok(DataFrame::new(columns)?)
}

// =============================================================================
// One-Hot Encoding
// =============================================================================

/// A string-typed predictor column together with its observed levels,
/// remembered at fit time so the identical encoding can be re-applied to any
/// frame later.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CategoricalColumn {
    /// Source column name.
    pub name: String,
    /// Sorted distinct non-null levels. The first level is dropped when
    /// encoding to avoid a redundant indicator.
    pub levels: Vec<String>,
}

/// Detect string-typed columns among `predictors` and collect their levels.
pub fn detect_categoricals(
    df: &DataFrame,
    predictors: &[String],
) -> Result<Vec<CategoricalColumn>> {
    let mut categoricals = Vec::new();

    for name in predictors {
        let series = df.column(name)?.as_materialized_series();
        if !is_string_dtype(series.dtype()) {
            continue;
        }

        let as_string = series.cast(&DataType::String)?;
        let values = as_string.str()?;
        let mut levels: Vec<String> = Vec::new();
        for v in values.iter().flatten() {
            if !levels.iter().any(|l| l == v) {
                levels.push(v.to_string());
            }
        }
        levels.sort();

        categoricals.push(CategoricalColumn {
            name: name.clone(),
            levels,
        });
    }

    Ok(categoricals)
}

/// Column names produced by one-hot encoding `predictors`: numeric columns
/// pass through under their own name, each categorical contributes one
/// `name_level` indicator per non-dropped level.
pub fn encoded_column_names(
    predictors: &[String],
    categoricals: &[CategoricalColumn],
) -> Vec<String> {
    let mut names = Vec::new();
    for predictor in predictors {
        match categoricals.iter().find(|c| &c.name == predictor) {
            Some(cat) => {
                for level in cat.levels.iter().skip(1) {
                    names.push(format!("{}_{}", cat.name, level));
                }
            }
            None => names.push(predictor.clone()),
        }
    }
    names
}

/// Materialize the encoded feature matrix for `encoded_columns`.
///
/// Indicator columns are reconstructed from the stored levels, so a frame
/// whose categorical column contains an unseen level encodes to all zeros for
/// that row, and a frame missing a level entirely still produces the full
/// column set.
pub fn encoded_matrix(
    df: &DataFrame,
    encoded_columns: &[String],
    categoricals: &[CategoricalColumn],
) -> Result<Vec<Vec<f64>>> {
    let n_rows = df.height();
    let mut matrix = vec![vec![0.0; encoded_columns.len()]; n_rows];

    for (col_idx, encoded_name) in encoded_columns.iter().enumerate() {
        match indicator_source(encoded_name, categoricals) {
            Some((cat, level)) => {
                let series = df.column(&cat.name)?.as_materialized_series();
                let as_string = series.cast(&DataType::String)?;
                let values = as_string.str()?;
                for (row, slot) in matrix.iter_mut().enumerate().take(n_rows) {
                    if values.get(row) == Some(level) {
                        slot[col_idx] = 1.0;
                    }
                }
            }
            None => {
                let values = column_as_f64(df, encoded_name)?;
                for (row, value) in values.into_iter().enumerate() {
                    matrix[row][col_idx] = value;
                }
            }
        }
    }

    Ok(matrix)
}

/// Resolve an encoded column name back to its `(categorical, level)` source,
/// or `None` for a numeric passthrough column.
fn indicator_source<'a>(
    encoded_name: &str,
    categoricals: &'a [CategoricalColumn],
) -> Option<(&'a CategoricalColumn, &'a str)> {
    for cat in categoricals {
        for level in cat.levels.iter().skip(1) {
            if encoded_name == format!("{}_{}", cat.name, level) {
                return Some((cat, level.as_str()));
            }
        }
    }
    None
}
