//! Task detection and target encoding

use crate::error::{Result, SwiftPredictError};
use crate::preprocessing::{is_float_dtype, is_integer_dtype};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Learning task derived from the target column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classification,
    Regression,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Regression => "regression",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides classification vs regression from the target's declared dtype
#[derive(Debug, Clone)]
pub struct TaskDetector {
    max_classification_cardinality: usize,
}

impl Default for TaskDetector {
    fn default() -> Self {
        Self {
            max_classification_cardinality: 20,
        }
    }
}

impl TaskDetector {
    pub fn new(max_classification_cardinality: usize) -> Self {
        Self {
            max_classification_cardinality,
        }
    }

    pub fn detect(&self, df: &DataFrame, target: &str) -> Result<TaskType> {
        let column = df.column(target).map_err(|_| {
            SwiftPredictError::column_quality(target, "target column not found")
        })?;
        let series = column.as_materialized_series();
        let dtype = series.dtype();

        let task = match dtype {
            DataType::String | DataType::Categorical(_, _) | DataType::Enum(_, _) => {
                TaskType::Classification
            }
            d if is_integer_dtype(d) => {
                let n_unique = series.drop_nulls().n_unique()?;
                if n_unique <= self.max_classification_cardinality {
                    TaskType::Classification
                } else {
                    TaskType::Regression
                }
            }
            d if is_float_dtype(d) => TaskType::Regression,
            other => {
                return Err(SwiftPredictError::UnsupportedTargetType {
                    column: target.to_string(),
                    dtype: other.to_string(),
                })
            }
        };

        info!(target_column = target, dtype = %dtype, task = %task, "Detected task");
        Ok(task)
    }
}

/// Sorted class labels of a classification target.
///
/// Class `i` is `labels[i]`; integer labels sort numerically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEncoding {
    pub labels: Vec<String>,
}

impl TargetEncoding {
    pub fn fit(series: &Series) -> Result<Self> {
        let labels = if is_integer_dtype(series.dtype()) {
            let ints = series.cast(&DataType::Int64)?;
            let mut values: Vec<i64> = ints.i64()?.into_iter().flatten().collect();
            values.sort_unstable();
            values.dedup();
            values.into_iter().map(|v| v.to_string()).collect()
        } else {
            let text = series.cast(&DataType::String)?;
            let mut values: Vec<String> = text.str()?.into_iter().flatten().map(|s| s.to_string()).collect();
            values.sort();
            values.dedup();
            values
        };

        if labels.is_empty() {
            return Err(SwiftPredictError::column_quality(
                series.name().as_str(),
                "target has no observed labels",
            ));
        }
        Ok(Self { labels })
    }

    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    /// Class indices for a target series; unknown or missing labels fail
    pub fn encode(&self, series: &Series) -> Result<Array1<f64>> {
        let index: HashMap<&str, usize> = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();
        let text = series.cast(&DataType::String)?;
        text.str()?
            .into_iter()
            .map(|v| {
                v.and_then(|label| index.get(label).map(|&i| i as f64))
                    .ok_or_else(|| {
                        SwiftPredictError::column_quality(
                            series.name().as_str(),
                            format!("unknown target label {:?}", v),
                        )
                    })
            })
            .collect()
    }

    pub fn decode(&self, class: usize) -> Option<&str> {
        self.labels.get(class).map(|s| s.as_str())
    }
}

/// Regression target as floats; missing values fail
pub fn regression_target(series: &Series) -> Result<Array1<f64>> {
    let cast = series.cast(&DataType::Float64)?;
    cast.f64()?
        .into_iter()
        .map(|v| {
            v.filter(|x| !x.is_nan()).ok_or_else(|| {
                SwiftPredictError::column_quality(series.name().as_str(), "missing target value")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_target_is_classification() {
        let df = df!("y" => &["a", "b", "a"]).unwrap();
        assert_eq!(TaskDetector::default().detect(&df, "y").unwrap(), TaskType::Classification);
    }

    #[test]
    fn test_integer_cardinality_boundary() {
        let twenty: Vec<i64> = (0..20).collect();
        let df = df!("y" => &twenty).unwrap();
        assert_eq!(TaskDetector::default().detect(&df, "y").unwrap(), TaskType::Classification);

        let twenty_one: Vec<i64> = (0..21).collect();
        let df = df!("y" => &twenty_one).unwrap();
        assert_eq!(TaskDetector::default().detect(&df, "y").unwrap(), TaskType::Regression);
    }

    #[test]
    fn test_float_target_is_regression() {
        let df = df!("y" => &[1.0, 1.0, 2.0]).unwrap();
        assert_eq!(TaskDetector::default().detect(&df, "y").unwrap(), TaskType::Regression);
    }

    #[test]
    fn test_unsupported_and_missing_target() {
        let df = df!("y" => &[true, false]).unwrap();
        assert!(matches!(
            TaskDetector::default().detect(&df, "y"),
            Err(SwiftPredictError::UnsupportedTargetType { .. })
        ));
        assert!(matches!(
            TaskDetector::default().detect(&df, "nope"),
            Err(SwiftPredictError::DataQuality { .. })
        ));
    }

    #[test]
    fn test_target_encoding_sorts_integers_numerically() {
        let s = Series::new("y".into(), &[10i64, 2, 2, 1]);
        let enc = TargetEncoding::fit(&s).unwrap();
        assert_eq!(enc.labels, vec!["1", "2", "10"]);
        assert_eq!(enc.encode(&s).unwrap().to_vec(), vec![2.0, 1.0, 1.0, 0.0]);
        assert_eq!(enc.decode(2), Some("10"));
    }
}
