//! SMOTE oversampling

use crate::error::{Result, SwiftPredictError};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// SMOTE (Synthetic Minority Over-sampling Technique)
///
/// Every class is grown to the majority count by interpolating between a
/// random member and one of its k nearest same-class neighbours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    k_neighbors: usize,
    seed: u64,
}

impl SMOTE {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
        }
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// k nearest members of `rows` to `rows[of]`, excluding itself
    fn find_neighbors(x: &Array2<f64>, rows: &[usize], of: usize, k: usize) -> Vec<usize> {
        let point = x.row(rows[of]);
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (pos, &row) in rows.iter().enumerate() {
            if pos == of {
                continue;
            }
            let dist = Self::distance(point, x.row(row));
            heap.push(DistIdx(dist, pos));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut neighbors: Vec<usize> = heap.into_iter().map(|DistIdx(_, i)| i).collect();
        neighbors.sort_unstable();
        neighbors
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ResampleResult> {
        if x.nrows() != y.len() {
            return Err(SwiftPredictError::SchemaMismatch {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(SwiftPredictError::Training(
                "SMOTE needs at least two classes".to_string(),
            ));
        }
        let max_count = counts.values().copied().max().unwrap_or(0);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let n_features = x.ncols();
        let mut synthetic_x: Vec<f64> = Vec::new();
        let mut synthetic_y: Vec<f64> = Vec::new();
        let mut n_synthetic = Vec::with_capacity(counts.len());

        for (class, rows) in class_indices(y) {
            let n_to_generate = max_count - rows.len();
            n_synthetic.push(n_to_generate);
            if n_to_generate == 0 {
                continue;
            }

            let k = self.k_neighbors.min(rows.len().saturating_sub(1));
            let neighbors: Vec<Vec<usize>> = (0..rows.len())
                .map(|pos| Self::find_neighbors(x, &rows, pos, k))
                .collect();

            for _ in 0..n_to_generate {
                let pos = rng.gen_range(0..rows.len());
                let sample = x.row(rows[pos]);
                // a lone class member is duplicated
                let neighbor = match neighbors[pos].as_slice() {
                    [] => sample,
                    nn => x.row(rows[nn[rng.gen_range(0..nn.len())]]),
                };
                let gap: f64 = rng.gen();
                synthetic_x.extend(
                    sample
                        .iter()
                        .zip(neighbor.iter())
                        .map(|(&p, &n)| p + gap * (n - p)),
                );
                synthetic_y.push(class as f64);
            }
        }

        let n_new = synthetic_y.len();
        let synthetic = Array2::from_shape_vec((n_new, n_features), synthetic_x)?;
        let synthetic_y = Array1::from(synthetic_y);
        let x_out = concatenate(Axis(0), &[x.view(), synthetic.view()])?;
        let y_out = concatenate(Axis(0), &[y.view(), synthetic_y.view()])?;

        Ok(ResampleResult {
            x: x_out,
            y: y_out,
            n_synthetic,
        })
    }
}
