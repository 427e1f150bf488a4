//! Null handling: drop sparse null rows or impute per dtype group

use super::missing_mask;
use super::profile::DtypeClass;
use crate::error::{Result, SwiftPredictError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What the imputer did to a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NullPolicy {
    /// No missing cells were found
    Untouched,
    /// Rows containing any missing cell were removed
    DroppedRows { dropped: usize },
    /// Missing cells were filled column by column
    Imputed { columns: Vec<String> },
}

/// Result of [`NullImputer::apply`]
#[derive(Debug, Clone)]
pub struct ImputeOutcome {
    pub frame: DataFrame,
    pub policy: NullPolicy,
}

/// Null imputer
///
/// If at most `drop_threshold` of the rows contain a missing cell those rows
/// are dropped. Otherwise every column with missing cells is filled:
/// categorical and boolean columns with their mode, numeric columns with
/// their mean and date columns by linear interpolation.
#[derive(Debug, Clone)]
pub struct NullImputer {
    drop_threshold: f64,
}

impl Default for NullImputer {
    fn default() -> Self {
        Self { drop_threshold: 0.10 }
    }
}

impl NullImputer {
    pub fn new(drop_threshold: f64) -> Self {
        Self { drop_threshold }
    }

    pub fn with_drop_threshold(mut self, drop_threshold: f64) -> Self {
        self.drop_threshold = drop_threshold;
        self
    }

    /// Per-row flag: true when any cell in the row is missing
    pub fn null_rows(df: &DataFrame) -> Vec<bool> {
        let mut rows = vec![false; df.height()];
        for column in df.get_columns() {
            let mask = missing_mask(column.as_materialized_series());
            for (row, missing) in rows.iter_mut().zip(mask) {
                *row |= missing;
            }
        }
        rows
    }

    /// Fraction of rows that contain at least one missing cell
    pub fn null_row_fraction(df: &DataFrame) -> f64 {
        if df.height() == 0 {
            return 0.0;
        }
        let n_null = Self::null_rows(df).iter().filter(|&&m| m).count();
        n_null as f64 / df.height() as f64
    }

    /// Apply the null policy to a frame
    pub fn apply(&self, df: &DataFrame) -> Result<ImputeOutcome> {
        let null_rows = Self::null_rows(df);
        let n_null = null_rows.iter().filter(|&&m| m).count();

        if n_null == 0 {
            return Ok(ImputeOutcome {
                frame: df.clone(),
                policy: NullPolicy::Untouched,
            });
        }

        let fraction = n_null as f64 / df.height() as f64;
        if fraction <= self.drop_threshold {
            let keep: Vec<bool> = null_rows.iter().map(|&m| !m).collect();
            let mask = BooleanChunked::from_slice("keep".into(), &keep);
            let frame = df.filter(&mask)?;
            info!(
                dropped = n_null,
                fraction = %format!("{:.3}", fraction),
                "Dropped rows with missing values"
            );
            return Ok(ImputeOutcome {
                frame,
                policy: NullPolicy::DroppedRows { dropped: n_null },
            });
        }

        let mut filled_columns = Vec::new();
        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let mask = missing_mask(series);
            if !mask.iter().any(|&m| m) {
                columns.push(column.clone());
                continue;
            }
            if mask.iter().all(|&m| m) {
                return Err(SwiftPredictError::column_quality(
                    series.name().as_str(),
                    "column is entirely missing and cannot be imputed",
                ));
            }

            let filled = match DtypeClass::of(series.dtype()) {
                DtypeClass::Numeric => fill_mean(series, &mask)?,
                DtypeClass::Date => fill_interpolated(series, &mask)?,
                DtypeClass::Boolean => fill_bool_mode(series)?,
                DtypeClass::Categorical => fill_text_mode(series)?,
            };
            debug!(column = %series.name(), missing = mask.iter().filter(|&&m| m).count(), "Imputed column");
            filled_columns.push(series.name().to_string());
            columns.push(filled.into());
        }

        info!(columns = filled_columns.len(), fraction = %format!("{:.3}", fraction), "Imputed missing values");
        Ok(ImputeOutcome {
            frame: DataFrame::new(columns)?,
            policy: NullPolicy::Imputed {
                columns: filled_columns,
            },
        })
    }
}

fn fill_mean(series: &Series, mask: &[bool]) -> Result<Series> {
    let cast = series.cast(&DataType::Float64)?;
    let values: Vec<Option<f64>> = cast.f64()?.into_iter().collect();

    let (sum, count) = values
        .iter()
        .zip(mask)
        .filter(|(_, &missing)| !missing)
        .filter_map(|(v, _)| *v)
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    let mean = sum / count as f64;

    let filled: Vec<f64> = values
        .iter()
        .zip(mask)
        .map(|(v, &missing)| if missing { mean } else { v.unwrap_or(mean) })
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

/// Linear interpolation over the physical integer representation.
/// Leading and trailing gaps take the nearest observed value.
fn fill_interpolated(series: &Series, mask: &[bool]) -> Result<Series> {
    let physical = series.to_physical_repr().cast(&DataType::Int64)?;
    let values: Vec<Option<i64>> = physical.i64()?.into_iter().collect();

    let known: Vec<(usize, i64)> = values
        .iter()
        .zip(mask)
        .enumerate()
        .filter_map(|(i, (v, &missing))| if missing { None } else { v.map(|x| (i, x)) })
        .collect();

    let mut filled = Vec::with_capacity(values.len());
    let mut next = 0usize;
    for (i, v) in values.iter().enumerate() {
        while next < known.len() && known[next].0 < i {
            next += 1;
        }
        let value = match (v, mask[i]) {
            (Some(x), false) => *x,
            _ => {
                let before = next.checked_sub(1).map(|j| known[j]);
                let after = known.get(next).copied();
                match (before, after) {
                    (Some((i0, v0)), Some((i1, v1))) => {
                        let t = (i - i0) as f64 / (i1 - i0) as f64;
                        (v0 as f64 + t * (v1 - v0) as f64).round() as i64
                    }
                    (Some((_, v0)), None) => v0,
                    (None, Some((_, v1))) => v1,
                    (None, None) => {
                        return Err(SwiftPredictError::column_quality(
                            series.name().as_str(),
                            "no observed values to interpolate from",
                        ))
                    }
                }
            }
        };
        filled.push(value);
    }

    let dtype = series.dtype().clone();
    let out = Series::new(series.name().clone(), filled)
        .cast(&dtype.to_physical())?
        .cast(&dtype)?;
    Ok(out)
}

fn fill_bool_mode(series: &Series) -> Result<Series> {
    let values: Vec<Option<bool>> = series.bool()?.into_iter().collect();
    let n_true = values.iter().filter(|v| **v == Some(true)).count();
    let n_false = values.iter().filter(|v| **v == Some(false)).count();
    // ties resolve to the smaller value
    let mode = n_true > n_false;
    let filled: Vec<bool> = values.iter().map(|v| v.unwrap_or(mode)).collect();
    Ok(Series::new(series.name().clone(), filled))
}

fn fill_text_mode(series: &Series) -> Result<Series> {
    let cast = series.cast(&DataType::String)?;
    let values: Vec<Option<String>> = cast
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    // BTreeMap order makes the smallest value win ties
    let mode = counts
        .iter()
        .fold(None::<(&str, usize)>, |best, (&k, &c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((k, c)),
        })
        .map(|(k, _)| k.to_string())
        .ok_or_else(|| {
            SwiftPredictError::column_quality(series.name().as_str(), "no observed values for mode")
        })?;

    let filled: Vec<String> = values
        .into_iter()
        .map(|v| v.unwrap_or_else(|| mode.clone()))
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_with_nulls() -> DataFrame {
        df!(
            "city" => &[Some("a"), None, Some("b"), Some("a"), None],
            "age" => &[Some(10.0), Some(20.0), None, Some(40.0), Some(30.0)],
            "ok" => &[Some(true), Some(true), Some(false), None, Some(true)]
        )
        .unwrap()
    }

    #[test]
    fn test_untouched_when_complete() {
        let df = df!("a" => &[1.0, 2.0]).unwrap();
        let out = NullImputer::default().apply(&df).unwrap();
        assert_eq!(out.policy, NullPolicy::Untouched);
        assert!(out.frame.equals(&df));
    }

    #[test]
    fn test_drops_rows_at_threshold() {
        // 1 of 10 rows has a missing cell: exactly at the 10% threshold
        let mut values: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64)).collect();
        values[3] = None;
        let df = df!("a" => &values, "b" => &(0..10).map(|i| i as i64).collect::<Vec<_>>()).unwrap();

        let out = NullImputer::default().apply(&df).unwrap();
        assert_eq!(out.policy, NullPolicy::DroppedRows { dropped: 1 });
        assert_eq!(out.frame.height(), 9);
        assert_eq!(out.frame.width(), 2);
    }

    #[test]
    fn test_imputes_above_threshold() {
        let df = sample_with_nulls();
        assert!(NullImputer::null_row_fraction(&df) > 0.10);

        let out = NullImputer::default().apply(&df).unwrap();
        assert_eq!(out.frame.height(), 5);
        assert!(matches!(out.policy, NullPolicy::Imputed { .. }));

        let city: Vec<Option<&str>> = out.frame.column("city").unwrap().as_materialized_series().str().unwrap().into_iter().collect();
        assert_eq!(city[1], Some("a"));
        assert_eq!(city[4], Some("a"));

        let age: Vec<Option<f64>> = out.frame.column("age").unwrap().as_materialized_series().f64().unwrap().into_iter().collect();
        assert_eq!(age[2], Some(25.0));

        let ok: Vec<Option<bool>> = out.frame.column("ok").unwrap().as_materialized_series().bool().unwrap().into_iter().collect();
        assert_eq!(ok[3], Some(true));
        assert_eq!(NullImputer::null_row_fraction(&out.frame), 0.0);
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let df = df!("a" => &[1.0, f64::NAN, 3.0, f64::NAN]).unwrap();
        let out = NullImputer::default().apply(&df).unwrap();
        let a: Vec<Option<f64>> = out.frame.column("a").unwrap().as_materialized_series().f64().unwrap().into_iter().collect();
        assert_eq!(a, vec![Some(1.0), Some(2.0), Some(3.0), Some(2.0)]);
    }

    #[test]
    fn test_entirely_missing_column_fails() {
        let df = df!(
            "a" => &[None::<f64>, None, None],
            "b" => &[1.0, 2.0, 3.0]
        )
        .unwrap();
        let err = NullImputer::default().apply(&df).unwrap_err();
        match err {
            SwiftPredictError::DataQuality { column, .. } => assert_eq!(column.as_deref(), Some("a")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dates_are_interpolated() {
        let days = Series::new("when".into(), &[Some(0i32), None, Some(10), None])
            .cast(&DataType::Date)
            .unwrap();
        let df = DataFrame::new(vec![days.into()]).unwrap();

        let out = NullImputer::default().apply(&df).unwrap();
        let when = out.frame.column("when").unwrap().as_materialized_series().clone();
        assert_eq!(when.dtype(), &DataType::Date);
        let physical = when.to_physical_repr().cast(&DataType::Int64).unwrap();
        let values: Vec<Option<i64>> = physical.i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(0), Some(5), Some(10), Some(10)]);
    }
}
