//! Exact-collinearity pruning

use crate::error::{Result, SwiftPredictError};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Pairwise Pearson correlation of the columns of `x`.
///
/// Entries involving a constant column are NaN.
pub fn correlation_matrix(x: &Array2<f64>) -> Array2<f64> {
    let n = x.ncols();
    let mut corr = Array2::from_elem((n, n), f64::NAN);
    for i in 0..n {
        for j in i..n {
            let r = pearson(x.column(i), x.column(j));
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}

fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let n = a.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean_a = a.sum() / n as f64;
    let mean_b = b.sum() / n as f64;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Ordered list of columns dropped for perfect collinearity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrunedColumns {
    pub dropped: Vec<String>,
}

impl PrunedColumns {
    pub fn is_empty(&self) -> bool {
        self.dropped.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dropped.iter().any(|d| d == name)
    }

    /// Drop the recorded columns from a matrix whose columns are `names`
    pub fn apply(&self, x: &Array2<f64>, names: &[String]) -> Result<(Array2<f64>, Vec<String>)> {
        if x.ncols() != names.len() {
            return Err(SwiftPredictError::SchemaMismatch {
                expected: format!("{} columns", names.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        for name in &self.dropped {
            if !names.contains(name) {
                return Err(SwiftPredictError::SchemaMismatch {
                    expected: format!("column '{}'", name),
                    actual: "column absent".to_string(),
                });
            }
        }

        let keep: Vec<usize> = (0..names.len()).filter(|&i| !self.contains(&names[i])).collect();
        let kept_names = keep.iter().map(|&i| names[i].clone()).collect();
        Ok((x.select(Axis(1), &keep), kept_names))
    }
}

/// Removes columns whose maximum absolute correlation with another column is 1.
///
/// Candidates are taken in column order; the first half (rounded down)
/// survives and the remainder is dropped.
#[derive(Debug, Clone)]
pub struct CorrelationPruner {
    tolerance: f64,
}

impl Default for CorrelationPruner {
    fn default() -> Self {
        Self { tolerance: 1e-10 }
    }
}

impl CorrelationPruner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Columns whose largest off-diagonal |r| equals 1
    pub fn candidates(&self, x: &Array2<f64>) -> Vec<usize> {
        let corr = correlation_matrix(x);
        (0..x.ncols())
            .filter(|&i| {
                (0..x.ncols())
                    .filter(|&j| j != i)
                    .map(|j| corr[[i, j]].abs())
                    .filter(|r| !r.is_nan())
                    .any(|r| (1.0 - r).abs() <= self.tolerance)
            })
            .collect()
    }

    pub fn fit(&self, x: &Array2<f64>, names: &[String]) -> PrunedColumns {
        let candidates = self.candidates(x);
        let retain = candidates.len() / 2;
        let dropped: Vec<String> = candidates[retain..].iter().map(|&i| names[i].clone()).collect();
        if !dropped.is_empty() {
            info!(dropped = ?dropped, "Pruned perfectly collinear columns");
        }
        PrunedColumns { dropped }
    }

    pub fn fit_transform(
        &self,
        x: &Array2<f64>,
        names: &[String],
    ) -> Result<(Array2<f64>, Vec<String>, PrunedColumns)> {
        let pruned = self.fit(x, names);
        let (x, kept) = pruned.apply(x, names)?;
        Ok((x, kept, pruned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_duplicate_pair_keeps_one() {
        let x = array![
            [1.0, 2.0, 5.0],
            [2.0, 4.0, 3.0],
            [3.0, 6.0, 4.0],
            [4.0, 8.0, 1.0]
        ];
        let (pruned_x, kept, pruned) = CorrelationPruner::new()
            .fit_transform(&x, &names(&["a", "b", "c"]))
            .unwrap();
        assert_eq!(pruned.dropped, vec!["b"]);
        assert_eq!(kept, names(&["a", "c"]));
        assert_eq!(pruned_x.ncols(), 2);
    }

    #[test]
    fn test_negative_collinearity_counts() {
        let x = array![[1.0, -1.0], [2.0, -2.0], [3.0, -3.0]];
        let pruned = CorrelationPruner::new().fit(&x, &names(&["a", "b"]));
        assert_eq!(pruned.dropped, vec!["b"]);
    }

    #[test]
    fn test_no_candidates_no_drops() {
        let x = array![[1.0, 3.0], [2.0, 1.0], [3.0, 2.0]];
        let pruned = CorrelationPruner::new().fit(&x, &names(&["a", "b"]));
        assert!(pruned.is_empty());
    }

    #[test]
    fn test_constant_column_is_not_a_candidate() {
        let x = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0]];
        assert!(CorrelationPruner::new().candidates(&x).is_empty());
    }

    #[test]
    fn test_apply_requires_dropped_column() {
        let pruned = PrunedColumns { dropped: names(&["z"]) };
        let x = array![[1.0, 2.0]];
        let err = pruned.apply(&x, &names(&["a", "b"])).unwrap_err();
        assert!(matches!(err, SwiftPredictError::SchemaMismatch { .. }));
    }
}
