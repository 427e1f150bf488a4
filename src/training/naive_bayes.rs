//! Naive Bayes classifiers
//!
//! Implements Gaussian Naive Bayes for continuous features.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::{argmax_rows, check_fit_input, check_n_features};
use crate::error::{Result, SwiftPredictError};

/// Gaussian Naive Bayes Classifier
///
/// Classes are the indices `0..n_classes`; a class absent from the training
/// data keeps a zero prior and is never predicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    n_classes: usize,
    /// Mean of each feature for each class
    means: Vec<Vec<f64>>,
    /// Variance of each feature for each class
    variances: Vec<Vec<f64>>,
    /// Prior probability of each class
    priors: Vec<f64>,
    /// Portion of the largest feature variance added to every variance
    var_smoothing: f64,
    n_features: usize,
}

impl GaussianNaiveBayes {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            means: Vec::new(),
            variances: Vec::new(),
            priors: Vec::new(),
            var_smoothing: 1e-9,
            n_features: 0,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_features = x.ncols();
        let n_samples = x.nrows();

        // Welford accumulators per class
        let mut counts = vec![0usize; self.n_classes];
        let mut means = vec![vec![0.0; n_features]; self.n_classes];
        let mut m2 = vec![vec![0.0; n_features]; self.n_classes];

        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            let class = label.round() as usize;
            if class >= self.n_classes {
                return Err(SwiftPredictError::Training(format!(
                    "label {} outside 0..{}",
                    label, self.n_classes
                )));
            }
            counts[class] += 1;
            let n = counts[class] as f64;
            for (j, &val) in row.iter().enumerate() {
                let delta = val - means[class][j];
                means[class][j] += delta / n;
                m2[class][j] += delta * (val - means[class][j]);
            }
        }

        let max_var = x
            .columns()
            .into_iter()
            .map(|c| c.var(0.0))
            .fold(0.0_f64, f64::max);
        let epsilon = self.var_smoothing * max_var.max(f64::EPSILON);

        self.variances = m2
            .iter()
            .zip(&counts)
            .map(|(acc, &n)| {
                acc.iter()
                    .map(|&v| if n > 0 { v / n as f64 + epsilon } else { 1.0 })
                    .collect()
            })
            .collect();
        self.priors = counts.iter().map(|&n| n as f64 / n_samples as f64).collect();
        self.means = means;
        self.n_features = n_features;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    /// Posterior class probabilities via log-sum-exp
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.priors.is_empty() {
            return Err(SwiftPredictError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let joint: Vec<f64> = (0..self.n_classes)
                .map(|c| {
                    if self.priors[c] > 0.0 {
                        self.priors[c].ln() + self.log_likelihood(row, c)
                    } else {
                        f64::NEG_INFINITY
                    }
                })
                .collect();
            let max = joint.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let total: f64 = joint.iter().map(|&j| (j - max).exp()).sum();
            for (c, &j) in joint.iter().enumerate() {
                proba[[i, c]] = (j - max).exp() / total;
            }
        }
        Ok(proba)
    }

    fn log_likelihood(&self, row: ArrayView1<f64>, class: usize) -> f64 {
        row.iter()
            .zip(self.means[class].iter().zip(&self.variances[class]))
            .map(|(&v, (&mean, &var))| -0.5 * (2.0 * PI * var).ln() - (v - mean).powi(2) / (2.0 * var))
            .sum()
    }
}
