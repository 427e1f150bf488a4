//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Each round splits the leaf with the largest gain first until `max_leaves`
//! is reached, instead of growing every node of a level.

use super::boosting::{sample_columns, BoostedModel, GradientTree, Loss, SplitParams};
use super::{argmax_rows, check_fit_input, OneVsRest};
use crate::error::{Result, SwiftPredictError};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    /// Minimum hessian sum in a child
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

impl LightGBMConfig {
    fn boost(&self, x: &Array2<f64>, y: &Array1<f64>, loss: Loss) -> Result<BoostedModel> {
        if self.max_leaves < 2 {
            return Err(SwiftPredictError::Config(format!(
                "max_leaves must be at least 2, got {}",
                self.max_leaves
            )));
        }
        let params = SplitParams {
            reg_lambda: self.reg_lambda,
            reg_alpha: self.reg_alpha,
            gamma: 0.0,
            min_child_weight: self.min_child_weight,
            min_child_samples: self.min_child_samples.max(1),
        };
        let mut rng = match self.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let n_features = x.ncols();

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
                GradientTree::grow_leafwise(x, grad, hess, rows, &features, &params, self.max_leaves, self.max_depth)
            },
        )
    }
}

// ============ LightGBM Regressor ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMRegressor {
    pub config: LightGBMConfig,
    model: Option<BoostedModel>,
}

impl LightGBMRegressor {
    pub fn new(config: LightGBMConfig) -> Self {
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
}

// ============ LightGBM Classifier ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMClassifier {
    pub config: LightGBMConfig,
    n_classes: usize,
    model: Option<OneVsRest<BoostedModel>>,
}

impl LightGBMClassifier {
    pub fn new(config: LightGBMConfig, n_classes: usize) -> Self {
        Self {
            config,
            n_classes,
            model: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let config = &self.config;
        self.model = Some(OneVsRest::fit_with(y, self.n_classes, |target| {
            config.boost(x, target, Loss::Logistic)
        })?);
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

    fn config() -> LightGBMConfig {
        LightGBMConfig {
            n_estimators: 40,
            max_leaves: 8,
            min_child_samples: 5,
            learning_rate: 0.3,
            ..Default::default()
        }
    }

    #[test]
    fn test_regressor_step() {
        let x = Array2::from_shape_fn((60, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(60, |i| if i < 30 { -2.0 } else { 4.0 });
        let mut model = LightGBMRegressor::new(config());
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!((pred[5] + 2.0).abs() < 0.2);
        assert!((pred[50] - 4.0).abs() < 0.2);
    }

    #[test]
    fn test_classifier_binary() {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| if i < 25 { (i % 5) as f64 + j as f64 } else { 20.0 + (i % 5) as f64 });
        let y = Array1::from_shape_fn(50, |i| if i < 25 { 0.0 } else { 1.0 });
        let mut clf = LightGBMClassifier::new(config(), 2);
        clf.fit(&x, &y).unwrap();
        assert_eq!(clf.predict(&x).unwrap(), y);
        assert_eq!(clf.predict_proba(&x).unwrap().ncols(), 2);
    }

    #[test]
    fn test_min_child_samples_blocks_splits() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(10, |i| i as f64);
        let mut model = LightGBMRegressor::new(LightGBMConfig {
            n_estimators: 5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!(pred.iter().all(|&p| (p - 4.5).abs() < 1e-9));
    }

    #[test]
    fn test_rejects_single_leaf_budget() {
        let mut model = LightGBMRegressor::new(LightGBMConfig {
            max_leaves: 1,
            ..Default::default()
        });
        let x = Array2::zeros((4, 1));
        assert!(matches!(
            model.fit(&x, &Array1::zeros(4)),
            Err(SwiftPredictError::Config(_))
        ));
    }
}
