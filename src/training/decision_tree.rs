//! Decision tree implementation

use super::{check_fit_input, check_n_features};
use crate::error::{Result, SwiftPredictError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        /// Class frequencies (classification only)
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn leaf_for(&self, row: ArrayView1<f64>) -> &TreeNode {
        let mut node = self;
        while let TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } = node
        {
            node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
        }
        node
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// CART decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; all when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Number of classes; zero for regression
    n_classes: usize,
    n_features: usize,
    seed: u64,
}

impl DecisionTree {
    pub fn new_classifier(n_classes: usize) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            n_classes,
            n_features: 0,
            seed: 0,
        }
    }

    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            n_classes: 0,
            ..Self::new_classifier(0)
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn is_classifier(&self) -> bool {
        self.criterion == Criterion::Gini
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let rows: Vec<usize> = (0..x.nrows()).collect();
        self.fit_rows(x, y, rows)
    }

    /// Fit on a multiset of row indices (bootstrap samples repeat rows)
    pub fn fit_rows(&mut self, x: &Array2<f64>, y: &Array1<f64>, rows: Vec<usize>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        if rows.is_empty() {
            return Err(SwiftPredictError::Training("no rows to fit the tree on".to_string()));
        }
        if self.is_classifier() && self.n_classes < 2 {
            return Err(SwiftPredictError::Training("classifier tree needs two classes".to_string()));
        }
        self.n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.root = Some(self.build(x, y, rows, 0, &mut rng));
        Ok(self)
    }

    fn build(&self, x: &Array2<f64>, y: &Array1<f64>, rows: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> TreeNode {
        let impurity = self.impurity(y, &rows);
        let depth_reached = self.max_depth.map_or(false, |d| depth >= d);

        if depth_reached || rows.len() < self.min_samples_split || impurity <= 1e-12 {
            return self.leaf(y, &rows);
        }

        let features: Vec<usize> = match self.max_features {
            Some(m) if m < self.n_features => {
                let mut chosen = sample(rng, self.n_features, m.max(1)).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..self.n_features).collect(),
        };

        let mut best: Option<SplitChoice> = None;
        for &feature in &features {
            if let Some(choice) = self.best_split_on(x, y, &rows, feature) {
                if best.as_ref().map_or(true, |b| choice.impurity < b.impurity) {
                    best = Some(choice);
                }
            }
        }

        match best {
            Some(choice) if choice.impurity < impurity - 1e-12 => {
                let n_samples = rows.len();
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                    .into_iter()
                    .partition(|&r| x[[r, choice.feature]] <= choice.threshold);
                TreeNode::Split {
                    feature_idx: choice.feature,
                    threshold: choice.threshold,
                    left: Box::new(self.build(x, y, left_rows, depth + 1, rng)),
                    right: Box::new(self.build(x, y, right_rows, depth + 1, rng)),
                    n_samples,
                    impurity,
                }
            }
            _ => self.leaf(y, &rows),
        }
    }

    /// Weighted child impurity of the best threshold on one feature
    fn best_split_on(&self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize], feature: usize) -> Option<SplitChoice> {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
        let n = sorted.len();
        let min_leaf = self.min_samples_leaf;
        let mut best: Option<SplitChoice> = None;

        if self.is_classifier() {
            let mut left = vec![0.0; self.n_classes];
            let mut right = vec![0.0; self.n_classes];
            for &r in &sorted {
                right[class_of(y[r], self.n_classes)] += 1.0;
            }
            for i in 0..n - 1 {
                let c = class_of(y[sorted[i]], self.n_classes);
                left[c] += 1.0;
                right[c] -= 1.0;
                let (nl, nr) = (i + 1, n - i - 1);
                let (a, b) = (x[[sorted[i], feature]], x[[sorted[i + 1], feature]]);
                if a == b || nl < min_leaf || nr < min_leaf {
                    continue;
                }
                let weighted = (nl as f64 * gini(&left, nl) + nr as f64 * gini(&right, nr)) / n as f64;
                if best.as_ref().map_or(true, |s| weighted < s.impurity) {
                    best = Some(SplitChoice { feature, threshold: (a + b) / 2.0, impurity: weighted });
                }
            }
        } else {
            let total: f64 = sorted.iter().map(|&r| y[r]).sum();
            let total_sq: f64 = sorted.iter().map(|&r| y[r] * y[r]).sum();
            let (mut sum_l, mut sq_l) = (0.0, 0.0);
            for i in 0..n - 1 {
                let v = y[sorted[i]];
                sum_l += v;
                sq_l += v * v;
                let (nl, nr) = (i + 1, n - i - 1);
                let (a, b) = (x[[sorted[i], feature]], x[[sorted[i + 1], feature]]);
                if a == b || nl < min_leaf || nr < min_leaf {
                    continue;
                }
                let sse_l = sq_l - sum_l * sum_l / nl as f64;
                let sum_r = total - sum_l;
                let sse_r = (total_sq - sq_l) - sum_r * sum_r / nr as f64;
                let weighted = (sse_l + sse_r) / n as f64;
                if best.as_ref().map_or(true, |s| weighted < s.impurity) {
                    best = Some(SplitChoice { feature, threshold: (a + b) / 2.0, impurity: weighted });
                }
            }
        }
        best
    }

    fn impurity(&self, y: &Array1<f64>, rows: &[usize]) -> f64 {
        let n = rows.len();
        if self.is_classifier() {
            let mut counts = vec![0.0; self.n_classes];
            for &r in rows {
                counts[class_of(y[r], self.n_classes)] += 1.0;
            }
            gini(&counts, n)
        } else {
            let mean = rows.iter().map(|&r| y[r]).sum::<f64>() / n as f64;
            rows.iter().map(|&r| (y[r] - mean).powi(2)).sum::<f64>() / n as f64
        }
    }

    fn leaf(&self, y: &Array1<f64>, rows: &[usize]) -> TreeNode {
        let n = rows.len();
        if self.is_classifier() {
            let mut distribution = vec![0.0; self.n_classes];
            for &r in rows {
                distribution[class_of(y[r], self.n_classes)] += 1.0;
            }
            let mut value = 0usize;
            for (c, &count) in distribution.iter().enumerate() {
                if count > distribution[value] {
                    value = c;
                }
            }
            distribution.iter_mut().for_each(|d| *d /= n as f64);
            TreeNode::Leaf {
                value: value as f64,
                distribution,
                n_samples: n,
            }
        } else {
            TreeNode::Leaf {
                value: rows.iter().map(|&r| y[r]).sum::<f64>() / n as f64,
                distribution: Vec::new(),
                n_samples: n,
            }
        }
    }

    fn root(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(SwiftPredictError::ModelNotFitted)?;
        check_n_features(self.n_features, x)?;
        Ok(root)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| match root.leaf_for(row) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => f64::NAN,
            })
            .collect())
    }

    /// Leaf class frequencies per row (classification only)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classifier() {
            return Err(SwiftPredictError::Training("regression trees have no class probabilities".to_string()));
        }
        let root = self.root(x)?;
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            if let TreeNode::Leaf { distribution, .. } = root.leaf_for(row) {
                for (c, &p) in distribution.iter().enumerate() {
                    proba[[i, c]] = p;
                }
            }
        }
        Ok(proba)
    }

    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

fn class_of(label: f64, n_classes: usize) -> usize {
    (label.round().max(0.0) as usize).min(n_classes.saturating_sub(1))
}

fn gini(counts: &[f64], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c / n).powi(2)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_fits_training_data() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [4.0, 1.0], [5.0, 0.0], [6.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let mut tree = DecisionTree::new_classifier(2);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (6, 2));
        assert_eq!(proba[[2, 1]], 1.0);
    }

    #[test]
    fn test_regressor_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        let mut tree = DecisionTree::new_regressor().with_max_depth(Some(1));
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.predict(&array![[2.5], [9.0]]).unwrap().to_vec(), vec![1.0, 5.0]);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x = array![[1.0], [2.0]];
        let y = array![3.0, 3.0];
        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.get_depth(), 0);
    }

    #[test]
    fn test_unfitted_and_wrong_width() {
        let tree = DecisionTree::new_regressor();
        assert!(tree.predict(&array![[1.0]]).is_err());

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&array![[1.0, 2.0], [2.0, 1.0]], &array![1.0, 2.0]).unwrap();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(SwiftPredictError::SchemaMismatch { .. })
        ));
    }
}
