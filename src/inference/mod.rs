//! Inference pipeline
//!
//! Replays the fitted training transforms on new feature rows:
//! - Recorded encoding steps, in fitting order, with position checks
//! - Collinear column removal, in recorded order
//! - Standard scaling with the training statistics
//!
//! The fitted state is an immutable value; transforming the same raw row
//! twice yields identical output.

mod replay;

use crate::autopipeline::TargetEncoding;
use crate::error::{Result, SwiftPredictError};
use crate::preprocessing::{frame_to_matrix, DtypeClass, EncodingState, PrunedColumns, StandardScaler};
use crate::training::FittedModel;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One raw feature cell as supplied at prediction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FeatureValue {
    /// Text form used by the categorical encoders
    pub fn as_text(&self) -> Option<String> {
        match self {
            FeatureValue::Null => None,
            FeatureValue::Bool(b) => Some(b.to_string()),
            FeatureValue::Int(v) => Some(v.to_string()),
            FeatureValue::Float(v) => Some(v.to_string()),
            FeatureValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Float(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Int(v)
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

/// A raw feature column expected at prediction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub class: DtypeClass,
}

/// Raw feature columns, in training order, target excluded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| FeatureColumn {
                name: c.name().to_string(),
                class: DtypeClass::of(c.dtype()),
            })
            .collect();
        Self { columns }
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Fitted feature transforms of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub schema: FeatureSchema,
    pub encoding: EncodingState,
    pub pruned: PrunedColumns,
    pub scaler: StandardScaler,
}

impl FittedPipeline {
    /// Model input column names
    pub fn feature_names(&self) -> &[String] {
        self.scaler.feature_names()
    }

    /// Encode, prune and scale one raw row given in schema order
    pub fn transform_row(&self, row: &[FeatureValue]) -> Result<Array1<f64>> {
        if row.len() != self.schema.len() {
            return Err(SwiftPredictError::SchemaMismatch {
                expected: format!("{} values ({})", self.schema.len(), self.schema.names().join(", ")),
                actual: format!("{} values", row.len()),
            });
        }

        let mut steps = self.encoding.steps.iter().peekable();
        let mut encoded: Vec<f64> = Vec::with_capacity(self.encoding.output_columns.len());
        for (column, value) in self.schema.columns.iter().zip(row) {
            match steps.peek() {
                Some(step) if step.column() == column.name => {
                    if step.position() != encoded.len() {
                        return Err(SwiftPredictError::SchemaMismatch {
                            expected: format!("'{}' at position {}", step.column(), step.position()),
                            actual: format!("position {}", encoded.len()),
                        });
                    }
                    encoded.extend(replay::encode_cell(step, value)?);
                    steps.next();
                }
                _ => encoded.push(replay::numeric_cell(&column.name, value)?),
            }
        }

        if let Some(step) = steps.next() {
            return Err(SwiftPredictError::SchemaMismatch {
                expected: format!("column '{}' for a recorded step", step.column()),
                actual: "column absent".to_string(),
            });
        }
        if encoded.len() != self.encoding.output_columns.len() {
            return Err(SwiftPredictError::SchemaMismatch {
                expected: format!("{} encoded columns", self.encoding.output_columns.len()),
                actual: format!("{} encoded columns", encoded.len()),
            });
        }

        let n = encoded.len();
        let matrix = Array2::from_shape_vec((1, n), encoded)?;
        let (kept, _) = self.pruned.apply(&matrix, &self.encoding.output_columns)?;
        self.scaler.transform_row(kept.row(0))
    }

    /// Transform several raw rows
    pub fn transform_rows(&self, rows: &[Vec<FeatureValue>]) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((rows.len(), self.feature_names().len()));
        for (i, row) in rows.iter().enumerate() {
            out.row_mut(i).assign(&self.transform_row(row)?);
        }
        Ok(out)
    }

    /// Transform a raw frame whose columns match the schema
    pub fn transform_frame(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let encoded = self.encoding.transform(df)?;
        let (x, names) = frame_to_matrix(&encoded)?;
        let (x, _) = self.pruned.apply(&x, &names)?;
        self.scaler.transform(&x)
    }
}

/// Decoded model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Label(String),
    Value(f64),
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prediction::Label(l) => f.write_str(l),
            Prediction::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Predict transformed rows; class indices decode to their original labels
pub fn predict_decoded(
    model: &FittedModel,
    x: &Array2<f64>,
    labels: Option<&TargetEncoding>,
) -> Result<Vec<Prediction>> {
    let raw = model.predict(x)?;
    match labels {
        None => Ok(raw.iter().map(|&v| Prediction::Value(v)).collect()),
        Some(encoding) => raw
            .iter()
            .map(|&class| {
                encoding
                    .decode(class.round() as usize)
                    .map(|l| Prediction::Label(l.to_string()))
                    .ok_or_else(|| {
                        SwiftPredictError::Data(format!("model predicted unknown class {}", class))
                    })
            })
            .collect(),
    }
}
