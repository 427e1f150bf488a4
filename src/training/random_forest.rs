//! Random forest implementation

use super::decision_tree::DecisionTree;
use super::{argmax_rows, check_fit_input};
use crate::error::{Result, SwiftPredictError};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Fraction of n_features
    Fraction(f64),
    /// All features
    All,
}

/// Bagged ensemble of CART trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: u64,
    /// Zero for regression
    n_classes: usize,
}

impl RandomForest {
    pub fn new_classifier(n_estimators: usize, n_classes: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: 42,
            n_classes,
        }
    }

    /// Regression forests consider every feature at each split
    pub fn new_regressor(n_estimators: usize) -> Self {
        Self {
            max_features: MaxFeatures::All,
            ..Self::new_classifier(n_estimators, 0)
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn is_classifier(&self) -> bool {
        self.n_classes > 0
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    /// Fit the forest; trees are grown in parallel, each with its own seed
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        let max_features = self.compute_max_features(x.ncols());
        let base_seed = self.random_state;

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let rows: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let tree = if self.is_classifier() {
                    DecisionTree::new_classifier(self.n_classes)
                } else {
                    DecisionTree::new_regressor()
                };
                let mut tree = tree
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_max_features(Some(max_features))
                    .with_seed(seed);
                tree.fit_rows(x, y, rows)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        Ok(self)
    }

    /// Mean of tree predictions (regression) or argmax of averaged votes
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.is_classifier() {
            return Ok(argmax_rows(&self.predict_proba(x)?));
        }
        if self.trees.is_empty() {
            return Err(SwiftPredictError::ModelNotFitted);
        }
        let preds = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;
        let mut total = Array1::zeros(x.nrows());
        for p in &preds {
            total += p;
        }
        Ok(total / self.trees.len() as f64)
    }

    /// Average of the trees' leaf class frequencies
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(SwiftPredictError::ModelNotFitted);
        }
        let probas = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;
        let mut total = Array2::zeros((x.nrows(), self.n_classes));
        for p in &probas {
            total += p;
        }
        Ok(total / self.trees.len() as f64)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
