//! Model training module
//!
//! Provides the fixed candidate catalogue and its cross-validated evaluation:
//! - Gaussian Naive Bayes
//! - Linear and logistic regression
//! - Random forests over CART decision trees
//! - Two gradient-boosted tree implementations (depth-wise XGBoost style,
//!   leaf-wise LightGBM style)
//! - K-fold / stratified k-fold cross-validation and scoring metrics
//! - Best-model selection per metric and overall

mod boosting;
mod models;
mod trainer;
pub mod cross_validation;
pub mod decision_tree;
pub mod lightgbm;
pub mod linear_models;
pub mod metrics;
pub mod naive_bayes;
pub mod random_forest;
pub mod selection;
pub mod xgboost;

pub use boosting::{GradientTree, Loss};
pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use lightgbm::{LightGBMClassifier, LightGBMConfig, LightGBMRegressor};
pub use linear_models::{LinearRegression, LogisticRegression};
pub use metrics::ScoringMetric;
pub use models::{catalogue, CandidateSpec, Estimator, FittedModel, ModelSettings};
pub use naive_bayes::GaussianNaiveBayes;
pub use random_forest::{MaxFeatures, RandomForest};
pub use selection::{overall_winners, select_best, ModelEntry, Selection, TrainedModels, OVERALL_KEY};
pub use trainer::{CandidateResult, CrossValidatedTrainer};
pub use xgboost::{XGBoostClassifier, XGBoostConfig, XGBoostRegressor};

use crate::error::{Result, SwiftPredictError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Reject empty or misaligned training input
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(SwiftPredictError::Training(format!(
            "cannot fit on an empty matrix of shape {:?}",
            x.dim()
        )));
    }
    if x.nrows() != y.len() {
        return Err(SwiftPredictError::Training(format!(
            "feature rows ({}) and targets ({}) differ",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(SwiftPredictError::SchemaMismatch {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Index of the largest entry per row; ties go to the lowest index
pub(crate) fn argmax_rows(proba: &Array2<f64>) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0usize;
            for (j, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = j;
                }
            }
            best as f64
        })
        .collect()
}

/// One-vs-rest decomposition of a multiclass problem into binary models.
///
/// With two classes a single model scores class 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneVsRest<M> {
    pub n_classes: usize,
    pub models: Vec<M>,
}

impl<M> OneVsRest<M> {
    /// `fit_binary` receives 0/1 targets for one class at a time
    pub fn fit_with<F>(y: &Array1<f64>, n_classes: usize, mut fit_binary: F) -> Result<Self>
    where
        F: FnMut(&Array1<f64>) -> Result<M>,
    {
        if n_classes < 2 {
            return Err(SwiftPredictError::Training(format!(
                "classification needs at least two classes, got {}",
                n_classes
            )));
        }
        let positives: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };
        let models = positives
            .into_iter()
            .map(|class| {
                let target = y.mapv(|label| if label.round() as usize == class { 1.0 } else { 0.0 });
                fit_binary(&target)
            })
            .collect::<Result<Vec<M>>>()?;
        Ok(Self { n_classes, models })
    }

    /// `score` returns per-row probabilities of the positive class
    pub fn proba_with<F>(&self, x: &Array2<f64>, score: F) -> Result<Array2<f64>>
    where
        F: Fn(&M, &Array2<f64>) -> Result<Array1<f64>>,
    {
        let n = x.nrows();
        let mut proba = Array2::zeros((n, self.n_classes));
        if self.n_classes == 2 {
            let model = self.models.first().ok_or(SwiftPredictError::ModelNotFitted)?;
            let p = score(model, x)?;
            for i in 0..n {
                proba[[i, 0]] = 1.0 - p[i];
                proba[[i, 1]] = p[i];
            }
            return Ok(proba);
        }

        for (class, model) in self.models.iter().enumerate() {
            proba.column_mut(class).assign(&score(model, x)?);
        }
        for mut row in proba.rows_mut() {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            } else {
                row.fill(1.0 / self.n_classes as f64);
            }
        }
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_rows_prefers_first_on_tie() {
        let p = array![[0.5, 0.5], [0.2, 0.8], [0.7, 0.3]];
        assert_eq!(argmax_rows(&p).to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_one_vs_rest_binary_uses_single_model() {
        let y = array![0.0, 1.0, 1.0];
        let ovr = OneVsRest::fit_with(&y, 2, |t| Ok(t.clone())).unwrap();
        assert_eq!(ovr.models.len(), 1);
        assert_eq!(ovr.models[0].to_vec(), vec![0.0, 1.0, 1.0]);

        let x = Array2::zeros((3, 1));
        let proba = ovr.proba_with(&x, |m, _| Ok(m.clone())).unwrap();
        assert_eq!(proba.row(0).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_one_vs_rest_multiclass_normalizes() {
        let y = array![0.0, 1.0, 2.0];
        let ovr = OneVsRest::fit_with(&y, 3, |t| Ok(t.clone())).unwrap();
        assert_eq!(ovr.models.len(), 3);

        let x = Array2::zeros((3, 1));
        let proba = ovr.proba_with(&x, |_, _| Ok(array![0.2, 0.2, 0.0])).unwrap();
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-12);
        assert!((proba[[2, 0]] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_check_fit_input() {
        assert!(check_fit_input(&Array2::zeros((0, 2)), &Array1::zeros(0)).is_err());
        assert!(check_fit_input(&Array2::zeros((2, 2)), &array![1.0]).is_err());
        assert!(check_fit_input(&Array2::zeros((1, 2)), &array![1.0]).is_ok());
    }
}
