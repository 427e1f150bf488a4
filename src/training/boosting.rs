//! Second-order gradient tree machinery shared by the boosted models

use super::{check_fit_input, check_n_features, sigmoid};
use crate::error::{Result, SwiftPredictError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Boosting objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loss {
    /// Squared error on raw scores
    SquaredError,
    /// Binary log loss on log-odds scores
    Logistic,
}

impl Loss {
    fn base_score(&self, y: &Array1<f64>) -> f64 {
        let mean = y.mean().unwrap_or(0.0);
        match self {
            Loss::SquaredError => mean,
            Loss::Logistic => {
                let p = mean.clamp(1e-6, 1.0 - 1e-6);
                (p / (1.0 - p)).ln()
            }
        }
    }

    fn gradients(&self, y: &Array1<f64>, raw: &Array1<f64>) -> (Vec<f64>, Vec<f64>) {
        match self {
            Loss::SquaredError => (
                raw.iter().zip(y.iter()).map(|(&f, &t)| f - t).collect(),
                vec![1.0; y.len()],
            ),
            Loss::Logistic => raw
                .iter()
                .zip(y.iter())
                .map(|(&f, &t)| {
                    let p = sigmoid(f);
                    (p - t, (p * (1.0 - p)).max(1e-16))
                })
                .unzip(),
        }
    }

    fn transform(&self, raw: f64) -> f64 {
        match self {
            Loss::SquaredError => raw,
            Loss::Logistic => sigmoid(raw),
        }
    }
}

/// Split search constraints
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitParams {
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub min_child_samples: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitFound {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Optimal leaf weight `-T(G) / (H + lambda)`, `T` soft-thresholding by alpha
fn leaf_weight(g: f64, h: f64, params: &SplitParams) -> f64 {
    let g = if g > params.reg_alpha {
        g - params.reg_alpha
    } else if g < -params.reg_alpha {
        g + params.reg_alpha
    } else {
        0.0
    };
    let denom = h + params.reg_lambda;
    if denom <= 0.0 { 0.0 } else { -g / denom }
}

fn split_on_feature(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    feature: usize,
    params: &SplitParams,
) -> Option<SplitFound> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| hess[i]).sum();
    let lambda = params.reg_lambda;
    let parent = g_total * g_total / (h_total + lambda);

    let (mut g_left, mut h_left) = (0.0, 0.0);
    let mut best: Option<SplitFound> = None;
    let n = sorted.len();

    for pos in 0..n.saturating_sub(1) {
        let idx = sorted[pos];
        g_left += grad[idx];
        h_left += hess[idx];

        let (a, b) = (x[[idx, feature]], x[[sorted[pos + 1], feature]]);
        if a == b {
            continue;
        }
        let (n_left, n_right) = (pos + 1, n - pos - 1);
        let (g_right, h_right) = (g_total - g_left, h_total - h_left);
        if n_left < params.min_child_samples
            || n_right < params.min_child_samples
            || h_left < params.min_child_weight
            || h_right < params.min_child_weight
        {
            continue;
        }

        let gain = 0.5
            * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda) - parent)
            - params.gamma;
        if best.map_or(true, |s| gain > s.gain) {
            best = Some(SplitFound {
                feature,
                threshold: (a + b) / 2.0,
                gain,
            });
        }
    }
    best.filter(|s| s.gain > 1e-12)
}

/// Best split over `features`; searched in parallel, first feature wins ties
pub(crate) fn find_best_split(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    features: &[usize],
    params: &SplitParams,
) -> Option<SplitFound> {
    let candidates: Vec<Option<SplitFound>> = features
        .par_iter()
        .map(|&f| split_on_feature(x, grad, hess, rows, f, params))
        .collect();
    candidates
        .into_iter()
        .flatten()
        .fold(None, |best: Option<SplitFound>, s| match best {
            Some(b) if b.gain >= s.gain => Some(b),
            _ => Some(s),
        })
}

/// Sorted random subset of `0..n` holding `ceil(n * fraction)` columns
pub(crate) fn sample_columns<R: Rng>(rng: &mut R, n: usize, fraction: f64) -> Vec<usize> {
    if fraction >= 1.0 || n == 0 {
        return (0..n).collect();
    }
    let k = ((n as f64 * fraction).ceil() as usize).clamp(1, n);
    let mut cols = rand::seq::index::sample(rng, n, k).into_vec();
    cols.sort_unstable();
    cols
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum GradientNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Regression tree over gradient statistics, stored as an arena rooted at 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientTree {
    nodes: Vec<GradientNode>,
}

impl GradientTree {
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(GradientNode::Leaf { weight }) => return *weight,
                Some(GradientNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => idx = if row[*feature] <= *threshold { *left } else { *right },
                None => return 0.0,
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, GradientNode::Leaf { .. }))
            .count()
    }

    fn leaf_of(grad: &[f64], hess: &[f64], rows: &[usize], params: &SplitParams) -> GradientNode {
        let g: f64 = rows.iter().map(|&i| grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| hess[i]).sum();
        GradientNode::Leaf {
            weight: leaf_weight(g, h, params),
        }
    }

    fn partition(x: &Array2<f64>, rows: &[usize], split: &SplitFound) -> (Vec<usize>, Vec<usize>) {
        rows.iter().partition(|&&r| x[[r, split.feature]] <= split.threshold)
    }

    /// Level-wise growth up to `max_depth`
    pub(crate) fn grow_depthwise(
        x: &Array2<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        features: &[usize],
        params: &SplitParams,
        max_depth: usize,
    ) -> Self {
        fn grow(
            tree: &mut Vec<GradientNode>,
            x: &Array2<f64>,
            grad: &[f64],
            hess: &[f64],
            rows: &[usize],
            features: &[usize],
            params: &SplitParams,
            depth: usize,
            max_depth: usize,
        ) -> usize {
            let idx = tree.len();
            tree.push(GradientTree::leaf_of(grad, hess, rows, params));
            if depth >= max_depth || rows.len() < 2 {
                return idx;
            }
            if let Some(split) = find_best_split(x, grad, hess, rows, features, params) {
                let (left_rows, right_rows) = GradientTree::partition(x, rows, &split);
                let left = grow(tree, x, grad, hess, &left_rows, features, params, depth + 1, max_depth);
                let right = grow(tree, x, grad, hess, &right_rows, features, params, depth + 1, max_depth);
                tree[idx] = GradientNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
            }
            idx
        }

        let mut nodes = Vec::new();
        grow(&mut nodes, x, grad, hess, rows, features, params, 0, max_depth);
        Self { nodes }
    }

    /// Best-first growth: always split the leaf with the largest gain
    pub(crate) fn grow_leafwise(
        x: &Array2<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        features: &[usize],
        params: &SplitParams,
        max_leaves: usize,
        max_depth: Option<usize>,
    ) -> Self {
        struct OpenLeaf {
            node: usize,
            rows: Vec<usize>,
            depth: usize,
            split: Option<SplitFound>,
        }

        let can_split = |depth: usize| max_depth.map_or(true, |d| depth < d);
        let open = |node: usize, rows: Vec<usize>, depth: usize| {
            let split = if can_split(depth) {
                find_best_split(x, grad, hess, &rows, features, params)
            } else {
                None
            };
            OpenLeaf { node, rows, depth, split }
        };

        let mut nodes = vec![Self::leaf_of(grad, hess, rows, params)];
        let mut leaves = vec![open(0, rows.to_vec(), 0)];

        while leaves.len() < max_leaves {
            let mut best: Option<(usize, f64)> = None;
            for (i, leaf) in leaves.iter().enumerate() {
                if let Some(s) = leaf.split {
                    if best.map_or(true, |(_, g)| s.gain > g) {
                        best = Some((i, s.gain));
                    }
                }
            }
            let Some((i, _)) = best else { break };

            let leaf = leaves.swap_remove(i);
            let Some(split) = leaf.split else { break };
            let (left_rows, right_rows) = Self::partition(x, &leaf.rows, &split);

            let left = nodes.len();
            nodes.push(Self::leaf_of(grad, hess, &left_rows, params));
            let right = nodes.len();
            nodes.push(Self::leaf_of(grad, hess, &right_rows, params));
            nodes[leaf.node] = GradientNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            leaves.push(open(left, left_rows, leaf.depth + 1));
            leaves.push(open(right, right_rows, leaf.depth + 1));
        }

        Self { nodes }
    }
}

/// Additive ensemble of gradient trees for one objective
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedModel {
    pub loss: Loss,
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<GradientTree>,
    n_features: usize,
}

impl BoostedModel {
    /// Boost `n_estimators` rounds; `grow` builds one tree from gradients and sampled rows
    pub(crate) fn fit<R, G>(
        x: &Array2<f64>,
        y: &Array1<f64>,
        loss: Loss,
        n_estimators: usize,
        learning_rate: f64,
        subsample: f64,
        rng: &mut R,
        mut grow: G,
    ) -> Result<Self>
    where
        R: Rng,
        G: FnMut(&[f64], &[f64], &[usize], &mut R) -> GradientTree,
    {
        check_fit_input(x, y)?;
        let n = x.nrows();
        let base_score = loss.base_score(y);
        let mut raw = Array1::from_elem(n, base_score);
        let mut trees = Vec::with_capacity(n_estimators);

        for _ in 0..n_estimators {
            let (grad, hess) = loss.gradients(y, &raw);
            let rows: Vec<usize> = if subsample < 1.0 {
                let picked: Vec<usize> = (0..n).filter(|_| rng.gen::<f64>() < subsample).collect();
                if picked.is_empty() { (0..n).collect() } else { picked }
            } else {
                (0..n).collect()
            };

            let tree = grow(&grad, &hess, &rows, &mut *rng);
            for (i, row) in x.rows().into_iter().enumerate() {
                raw[i] += learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            loss,
            base_score,
            learning_rate,
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn raw_predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(SwiftPredictError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_score
                    + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }

    /// Predictions on the loss's output scale (value or probability)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.raw_predict(x)?.mapv(|r| self.loss.transform(r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn params() -> SplitParams {
        SplitParams {
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            min_child_weight: 0.0,
            min_child_samples: 1,
        }
    }

    #[test]
    fn test_best_split_separates_gradients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let grad = [-1.0, -1.0, 1.0, 1.0];
        let hess = [1.0; 4];
        let split = find_best_split(&x, &grad, &hess, &[0, 1, 2, 3], &[0], &params()).unwrap();
        assert_eq!(split.feature, 0);
        assert_eq!(split.threshold, 2.5);
    }

    #[test]
    fn test_leafwise_respects_leaf_budget() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let grad: Vec<f64> = (0..16).map(|i| if i % 4 < 2 { -1.0 } else { 1.0 }).collect();
        let hess = vec![1.0; 16];
        let rows: Vec<usize> = (0..16).collect();
        let tree = GradientTree::grow_leafwise(&x, &grad, &hess, &rows, &[0], &params(), 3, None);
        assert!(tree.n_leaves() <= 3);
        assert!(tree.n_leaves() >= 2);
    }

    #[test]
    fn test_boosted_regression_fits_step() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 0.0 } else { 10.0 });
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let model = BoostedModel::fit(&x, &y, Loss::SquaredError, 50, 0.3, 1.0, &mut rng, |g, h, r, _| {
            GradientTree::grow_depthwise(&x, g, h, r, &[0], &params(), 2)
        })
        .unwrap();
        let pred = model.predict(&array![[2.0], [17.0]]).unwrap();
        assert!((pred[0] - 0.0).abs() < 0.5);
        assert!((pred[1] - 10.0).abs() < 0.5);
    }
}
