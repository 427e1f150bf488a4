//! Scoring metrics used for cross-validation and model selection
//!
//! Every metric is "greater is better": error metrics are negated so the
//! selector can always take the maximum.

use crate::autopipeline::TaskType;
use crate::error::{Result, SwiftPredictError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const CLASSIFICATION: [ScoringMetric; 4] = [
    ScoringMetric::Accuracy,
    ScoringMetric::F1,
    ScoringMetric::RocAuc,
    ScoringMetric::Precision,
];

const REGRESSION: [ScoringMetric; 3] = [
    ScoringMetric::NegMeanSquaredError,
    ScoringMetric::NegMeanAbsoluteError,
    ScoringMetric::R2,
];

/// Cross-validation scoring metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMetric {
    Accuracy,
    F1,
    RocAuc,
    Precision,
    NegMeanSquaredError,
    NegMeanAbsoluteError,
    R2,
}

impl ScoringMetric {
    /// Metrics evaluated for a task, in reporting order
    pub fn for_task(task: TaskType) -> &'static [ScoringMetric] {
        match task {
            TaskType::Classification => &CLASSIFICATION,
            TaskType::Regression => &REGRESSION,
        }
    }

    /// Name used when logging fold values
    pub fn scoring_name(&self) -> &'static str {
        match self {
            ScoringMetric::Accuracy => "accuracy",
            ScoringMetric::F1 => "f1",
            ScoringMetric::RocAuc => "roc_auc",
            ScoringMetric::Precision => "precision",
            ScoringMetric::NegMeanSquaredError => "neg_mean_squared_error",
            ScoringMetric::NegMeanAbsoluteError => "neg_mean_absolute_error",
            ScoringMetric::R2 => "r2",
        }
    }

    /// Key of the trained-model map that holds this metric's winner
    pub fn model_key(&self) -> &'static str {
        match self {
            ScoringMetric::Accuracy => "accuracy",
            ScoringMetric::F1 => "f1",
            ScoringMetric::RocAuc => "roc_auc",
            ScoringMetric::Precision => "precision",
            ScoringMetric::NegMeanSquaredError => "MSE",
            ScoringMetric::NegMeanAbsoluteError => "MAE",
            ScoringMetric::R2 => "R2",
        }
    }

    pub fn needs_proba(&self) -> bool {
        matches!(self, ScoringMetric::RocAuc)
    }

    /// Score one fold. `proba` is required for ROC-AUC only.
    ///
    /// `n_classes` is the class count of the whole task, so a fold missing a
    /// class is still macro-averaged; regression passes 0.
    pub fn score(
        &self,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        proba: Option<&Array2<f64>>,
        n_classes: usize,
        fold: usize,
    ) -> Result<f64> {
        let fail = |reason: String| SwiftPredictError::MetricComputation {
            metric: self.scoring_name().to_string(),
            fold,
            reason,
        };
        if y_true.is_empty() {
            return Err(fail("no samples in fold".to_string()));
        }
        if y_true.len() != y_pred.len() {
            return Err(fail(format!(
                "{} targets but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }

        match self {
            ScoringMetric::Accuracy => Ok(accuracy(y_true, y_pred)),
            ScoringMetric::F1 => Ok(averaged(y_true, y_pred, n_classes, |c| f1_for(y_true, y_pred, c))),
            ScoringMetric::Precision => {
                Ok(averaged(y_true, y_pred, n_classes, |c| precision_for(y_true, y_pred, c).0))
            }
            ScoringMetric::RocAuc => {
                let proba = proba.ok_or_else(|| fail("model exposes no class probabilities".to_string()))?;
                roc_auc(y_true, proba).map_err(fail)
            }
            ScoringMetric::NegMeanSquaredError => Ok(-mean_squared_error(y_true, y_pred)),
            ScoringMetric::NegMeanAbsoluteError => Ok(-mean_absolute_error(y_true, y_pred)),
            ScoringMetric::R2 => r2(y_true, y_pred).map_err(fail),
        }
    }
}

impl std::fmt::Display for ScoringMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scoring_name())
    }
}

fn label(v: f64) -> i64 {
    v.round() as i64
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(&t, &p)| label(t) == label(p))
        .count();
    correct as f64 / y_true.len() as f64
}

/// (precision, recall) for one class; zero when undefined
fn precision_for(y_true: &Array1<f64>, y_pred: &Array1<f64>, class: i64) -> (f64, f64) {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (label(t) == class, label(p) == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
    let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
    (precision, recall)
}

fn f1_for(y_true: &Array1<f64>, y_pred: &Array1<f64>, class: i64) -> f64 {
    let (p, r) = precision_for(y_true, y_pred, class);
    if p + r > 0.0 {
        2.0 * p * r / (p + r)
    } else {
        0.0
    }
}

/// Binary tasks score class 1; otherwise the macro average over every
/// label seen in either array
fn averaged<F: Fn(i64) -> f64>(y_true: &Array1<f64>, y_pred: &Array1<f64>, n_classes: usize, per_class: F) -> f64 {
    if n_classes <= 2 {
        return per_class(1);
    }
    let labels: BTreeSet<i64> = y_true.iter().chain(y_pred.iter()).map(|&v| label(v)).collect();
    labels.iter().map(|&c| per_class(c)).sum::<f64>() / labels.len() as f64
}

/// Area under the ROC curve via the Mann-Whitney rank statistic, ties
/// counted as one half
fn binary_auc(positive: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; a run of ties shares the average rank
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += order[i..=j].iter().filter(|&&k| positive[k]).count() as f64 * avg_rank;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// Binary AUC on the class-1 column, or the one-vs-rest macro average
pub fn roc_auc(y_true: &Array1<f64>, proba: &Array2<f64>) -> std::result::Result<f64, String> {
    if proba.nrows() != y_true.len() {
        return Err(format!("{} targets but {} probability rows", y_true.len(), proba.nrows()));
    }
    let labels: BTreeSet<i64> = y_true.iter().map(|&v| label(v)).collect();
    if labels.len() < 2 {
        return Err("only one class present in y_true".to_string());
    }

    let classes: Vec<i64> = if proba.ncols() == 2 { vec![1] } else { labels.into_iter().collect() };
    let mut total = 0.0;
    for &class in &classes {
        let col = usize::try_from(class)
            .ok()
            .filter(|&c| c < proba.ncols())
            .ok_or_else(|| format!("label {} has no probability column", class))?;
        let positive: Vec<bool> = y_true.iter().map(|&v| label(v) == class).collect();
        let scores: Vec<f64> = proba.column(col).to_vec();
        total += binary_auc(&positive, &scores).ok_or_else(|| "only one class present in y_true".to_string())?;
    }
    Ok(total / classes.len() as f64)
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(|e| e * e).mean().unwrap_or(0.0)
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(f64::abs).mean().unwrap_or(0.0)
}

pub fn r2(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> std::result::Result<f64, String> {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot <= 0.0 {
        return Err("R2 is undefined for a constant target".to_string());
    }
    let ss_res: f64 = (y_true - y_pred).mapv(|e| e * e).sum();
    Ok(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_classification_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        assert_eq!(ScoringMetric::Accuracy.score(&y_true, &y_pred, None, 2, 0).unwrap(), 0.75);
        assert_eq!(ScoringMetric::Precision.score(&y_true, &y_pred, None, 2, 0).unwrap(), 0.75);
        assert_eq!(ScoringMetric::F1.score(&y_true, &y_pred, None, 2, 0).unwrap(), 0.75);
    }

    #[test]
    fn test_macro_precision_multiclass() {
        let y_true = array![0.0, 1.0, 2.0, 2.0];
        let y_pred = array![0.0, 2.0, 2.0, 2.0];
        // class 0: 1.0, class 1: 0.0, class 2: 2/3
        let p = ScoringMetric::Precision.score(&y_true, &y_pred, None, 3, 0).unwrap();
        assert!((p - (1.0 + 0.0 + 2.0 / 3.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_multiclass_fold_missing_a_class_stays_macro() {
        // class 2 absent from this fold of a 3-class task
        let y_true = array![0.0, 1.0, 0.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0];

        let p = ScoringMetric::Precision.score(&y_true, &y_pred, None, 3, 0).unwrap();
        let f1 = ScoringMetric::F1.score(&y_true, &y_pred, None, 3, 0).unwrap();
        // class 0: p=1, r=1/2, f1=2/3; class 1: p=2/3, r=1, f1=4/5
        assert!((p - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
        assert!((f1 - (2.0 / 3.0 + 0.8) / 2.0).abs() < 1e-12);

        let binary = ScoringMetric::F1.score(&y_true, &y_pred, None, 2, 0).unwrap();
        assert!((binary - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_with_ties() {
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        let proba = array![[0.9, 0.1], [0.6, 0.4], [0.6, 0.4], [0.2, 0.8]];
        let auc = ScoringMetric::RocAuc.score(&y_true, &y_true, Some(&proba), 2, 0).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class_fold_fails() {
        let y_true = array![1.0, 1.0];
        let proba = array![[0.3, 0.7], [0.2, 0.8]];
        let err = ScoringMetric::RocAuc.score(&y_true, &y_true, Some(&proba), 2, 4).unwrap_err();
        match err {
            SwiftPredictError::MetricComputation { metric, fold, .. } => {
                assert_eq!(metric, "roc_auc");
                assert_eq!(fold, 4);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_regression_metrics_are_negated() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![1.0, 2.0, 5.0];
        let mse = ScoringMetric::NegMeanSquaredError.score(&y_true, &y_pred, None, 0, 0).unwrap();
        let mae = ScoringMetric::NegMeanAbsoluteError.score(&y_true, &y_pred, None, 0, 0).unwrap();
        assert!((mse + 4.0 / 3.0).abs() < 1e-12);
        assert!((mae + 2.0 / 3.0).abs() < 1e-12);

        let r2 = ScoringMetric::R2.score(&y_true, &y_true, None, 0, 0).unwrap();
        assert_eq!(r2, 1.0);
        assert!(ScoringMetric::R2.score(&array![2.0, 2.0], &array![2.0, 2.0], None, 0, 1).is_err());
    }

    #[test]
    fn test_task_metric_keys() {
        let keys: Vec<&str> = ScoringMetric::for_task(TaskType::Regression)
            .iter()
            .map(|m| m.model_key())
            .collect();
        assert_eq!(keys, vec!["MSE", "MAE", "R2"]);
        assert_eq!(ScoringMetric::for_task(TaskType::Classification).len(), 4);
    }
}
