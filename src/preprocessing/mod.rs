//! Data preprocessing module
//!
//! Provides the training-time transforms of the AutoML pipeline:
//! - Column dtype profiling (categorical / numeric / date / boolean)
//! - Null handling (row dropping or per-group imputation)
//! - Categorical encoding (one-hot, frequency, boolean-text normalization)
//! - Exact-collinearity pruning
//! - Standard scaling of the final feature matrix

mod profile;
mod imputer;
mod encoder;
mod correlation;
mod scaler;

pub use profile::{ColumnProfile, DtypeClass};
pub(crate) use profile::{is_float_dtype, is_integer_dtype};
pub use imputer::{NullImputer, NullPolicy, ImputeOutcome};
pub use encoder::{Encoder, EncodingState, EncodingStep, DateUnit, is_boolean_text, boolean_text_value};
pub use correlation::{CorrelationPruner, PrunedColumns, correlation_matrix};
pub use scaler::StandardScaler;

use crate::error::{Result, SwiftPredictError};
use ndarray::Array2;
use polars::prelude::*;

/// Per-row missing flags for a single series.
///
/// Floating point NaN counts as missing alongside nulls.
pub fn missing_mask(series: &Series) -> Vec<bool> {
    match series.dtype() {
        DataType::Float32 | DataType::Float64 => match series.cast(&DataType::Float64) {
            Ok(cast) => match cast.f64() {
                Ok(ca) => ca.into_iter().map(|v| v.map_or(true, f64::is_nan)).collect(),
                Err(_) => null_flags(series),
            },
            Err(_) => null_flags(series),
        },
        _ => null_flags(series),
    }
}

fn null_flags(series: &Series) -> Vec<bool> {
    series.is_null().into_iter().map(|v| v.unwrap_or(false)).collect()
}

/// Extract every column of an all-numeric frame into a row-major matrix.
///
/// Fails with a data quality error if the frame has no columns, a column
/// cannot be read as numbers, or a cell is still missing.
pub fn frame_to_matrix(df: &DataFrame) -> Result<(Array2<f64>, Vec<String>)> {
    if df.width() == 0 {
        return Err(SwiftPredictError::dataset_quality("frame has no feature columns"));
    }
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let n_rows = df.height();

    let col_data: Vec<Vec<f64>> = df
        .get_columns()
        .iter()
        .map(|column| {
            let series = column.as_materialized_series();
            let name = series.name().to_string();
            let cast = series
                .cast(&DataType::Float64)
                .map_err(|e| SwiftPredictError::column_quality(name.as_str(), e.to_string()))?;
            let ca = cast
                .f64()
                .map_err(|e| SwiftPredictError::column_quality(name.as_str(), e.to_string()))?;
            ca.into_iter()
                .map(|v| match v {
                    Some(x) if !x.is_nan() => Ok(x),
                    _ => Err(SwiftPredictError::column_quality(
                        name.as_str(),
                        "missing value reached the feature matrix",
                    )),
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    let x = Array2::from_shape_fn((n_rows, col_refs.len()), |(r, c)| col_refs[c][r]);
    Ok((x, names))
}
