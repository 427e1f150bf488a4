//! Synthetic data generation module
//!
//! Minority oversampling for skewed classification targets:
//! - SMOTE (Synthetic Minority Over-sampling Technique)
//! - `ImbalanceCorrector`, which only resamples when the class ratio is skewed

mod smote;

pub use smote::SMOTE;

use crate::error::Result;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use tracing::info;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Resampled features
    pub x: Array2<f64>,
    /// Resampled class indices
    pub y: Array1<f64>,
    /// Number of synthetic samples generated per class, in class order
    pub n_synthetic: Vec<usize>,
}

impl ResampleResult {
    pub fn total_synthetic(&self) -> usize {
        self.n_synthetic.iter().sum()
    }
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    fn resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ResampleResult>;
}

/// Count samples per class, ordered by class
pub fn class_counts(y: &Array1<f64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label.round() as i64).or_insert(0) += 1;
    }
    counts
}

/// Row indices per class, ordered by class
pub fn class_indices(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label.round() as i64).or_default().push(i);
    }
    indices
}

/// Smallest over largest class count; 1.0 for fewer than two classes
pub fn class_ratio(y: &Array1<f64>) -> f64 {
    let counts = class_counts(y);
    match (counts.values().min(), counts.values().max()) {
        (Some(&min), Some(&max)) if counts.len() > 1 && max > 0 => min as f64 / max as f64,
        _ => 1.0,
    }
}

/// Oversamples minority classes to parity when the class ratio is below a threshold
#[derive(Debug, Clone)]
pub struct ImbalanceCorrector {
    threshold: f64,
    smote: SMOTE,
}

impl Default for ImbalanceCorrector {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            smote: SMOTE::new(),
        }
    }
}

impl ImbalanceCorrector {
    pub fn new(threshold: f64, smote: SMOTE) -> Self {
        Self { threshold, smote }
    }

    /// Returns `None` when the data is balanced enough to use as is
    pub fn correct(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Option<ResampleResult>> {
        let ratio = class_ratio(y);
        if ratio >= self.threshold {
            info!(ratio = %format!("{:.3}", ratio), "Class balance acceptable, no resampling");
            return Ok(None);
        }

        let result = self.smote.resample(x, y)?;
        info!(
            ratio = %format!("{:.3}", ratio),
            synthetic = result.total_synthetic(),
            rows = result.x.nrows(),
            "Oversampled minority classes with SMOTE"
        );
        Ok(Some(result))
    }
}
