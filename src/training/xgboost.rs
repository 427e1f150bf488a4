//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Uses both gradient and hessian of the loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Trees grow level-wise up to `max_depth`

use super::boosting::{sample_columns, BoostedModel, GradientTree, Loss, SplitParams};
use super::{argmax_rows, check_fit_input, OneVsRest};
use crate::error::{Result, SwiftPredictError};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

impl XGBoostConfig {
    fn split_params(&self) -> SplitParams {
        SplitParams {
            reg_lambda: self.reg_lambda,
            reg_alpha: self.reg_alpha,
            gamma: self.gamma,
            min_child_weight: self.min_child_weight,
            min_child_samples: 1,
        }
    }

    fn rng(&self) -> Xoshiro256PlusPlus {
        match self.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        }
    }

    fn boost(&self, x: &Array2<f64>, y: &Array1<f64>, loss: Loss) -> Result<BoostedModel> {
        if self.learning_rate <= 0.0 {
            return Err(SwiftPredictError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        let params = self.split_params();
        let n_features = x.ncols();
        let mut rng = self.rng();
        BoostedModel::fit(
            x,
            y,
            loss,
            self.n_estimators,
            self.learning_rate,
            self.subsample,
            &mut rng,
            |grad, hess, rows, rng| {
                let features = sample_columns(rng, n_features, self.colsample_bytree);
                GradientTree::grow_depthwise(x, grad, hess, rows, &features, &params, self.max_depth)
            },
        )
    }
}

/// XGBoost regressor (squared error)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    pub config: XGBoostConfig,
    model: Option<BoostedModel>,
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self { config, model: None }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.model = Some(self.config.boost(x, y, Loss::SquaredError)?);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model
            .as_ref()
            .ok_or(SwiftPredictError::ModelNotFitted)?
            .predict(x)
    }

    pub fn n_trees(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.trees.len())
    }
}

/// XGBoost classifier (logistic loss, one-vs-rest beyond two classes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    pub config: XGBoostConfig,
    n_classes: usize,
    model: Option<OneVsRest<BoostedModel>>,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig, n_classes: usize) -> Self {
        Self {
            config,
            n_classes,
            model: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let config = &self.config;
        let model = OneVsRest::fit_with(y, self.n_classes, |target| config.boost(x, target, Loss::Logistic))?;
        self.model = Some(model);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.model
            .as_ref()
            .ok_or(SwiftPredictError::ModelNotFitted)?
            .proba_with(x, |m, x| m.predict(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small() -> XGBoostConfig {
        XGBoostConfig {
            n_estimators: 30,
            max_depth: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_regressor_learns_linear_trend() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v);
        let mut model = XGBoostRegressor::new(small());
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 30);

        let pred = model.predict(&x).unwrap();
        let mae = (&pred - &y).mapv(f64::abs).mean().unwrap();
        assert!(mae < 5.0, "mae = {}", mae);
    }

    #[test]
    fn test_classifier_binary() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if i < 15 { (i + j) as f64 * 0.1 } else { 5.0 + (i + j) as f64 * 0.1 });
        let y = Array1::from_shape_fn(30, |i| if i < 15 { 0.0 } else { 1.0 });
        let mut clf = XGBoostClassifier::new(small(), 2);
        clf.fit(&x, &y).unwrap();
        assert_eq!(clf.predict(&x).unwrap(), y);

        let proba = clf.predict_proba(&array![[0.1, 0.2]]).unwrap();
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-9);
        assert!(proba[[0, 0]] > 0.5);
    }

    #[test]
    fn test_classifier_multiclass_with_column_sampling() {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| (i / 10) as f64 * 4.0 + j as f64 * 0.01 + (i % 10) as f64 * 0.05);
        let y = Array1::from_shape_fn(30, |i| (i / 10) as f64);
        let config = XGBoostConfig {
            colsample_bytree: 0.7,
            subsample: 0.9,
            ..small()
        };
        let mut clf = XGBoostClassifier::new(config, 3);
        clf.fit(&x, &y).unwrap();
        assert_eq!(clf.predict_proba(&x).unwrap().ncols(), 3);
        assert_eq!(clf.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_unfitted_errors() {
        let clf = XGBoostClassifier::new(small(), 2);
        assert!(matches!(clf.predict(&array![[1.0]]), Err(SwiftPredictError::ModelNotFitted)));
    }
}
