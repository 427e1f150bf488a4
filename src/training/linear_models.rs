//! Linear model implementations

use super::{argmax_rows, check_fit_input, check_n_features, sigmoid, OneVsRest};
use crate::error::{Result, SwiftPredictError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve a symmetric positive semi-definite system `a x = b` with Cholesky.
///
/// A growing ridge is added to the diagonal until the factorisation succeeds.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }
    let scale = (a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64).max(1.0);

    for ridge in [0.0, 1e-10, 1e-8, 1e-6, 1e-4] {
        let mut l = Array2::<f64>::zeros((n, n));
        let mut ok = true;
        'factor: for i in 0..n {
            for j in 0..=i {
                let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
                if i == j {
                    let diag = a[[i, i]] + ridge * scale - sum;
                    if diag <= 0.0 {
                        ok = false;
                        break 'factor;
                    }
                    l[[i, j]] = diag.sqrt();
                } else {
                    l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
                }
            }
        }
        if !ok {
            continue;
        }

        // Forward substitution: L y = b
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
            y[i] = (b[i] - sum) / l[[i, i]];
        }
        // Backward substitution: L^T x = y
        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
            x[i] = (y[i] - sum) / l[[i, i]];
        }
        return Some(x);
    }
    None
}

/// Ordinary least squares
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solve the centred normal equations; the intercept absorbs the means
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let x_mean = x.mean_axis(Axis(0)).ok_or(SwiftPredictError::ModelNotFitted)?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let xtx = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);
        let coef = cholesky_solve(&xtx, &xty).ok_or_else(|| {
            SwiftPredictError::Training("normal equations are singular".to_string())
        })?;

        self.intercept = y_mean - x_mean.dot(&coef);
        self.coefficients = Some(coef);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self.coefficients.as_ref().ok_or(SwiftPredictError::ModelNotFitted)?;
        check_n_features(coef.len(), x)?;
        Ok(x.dot(coef) + self.intercept)
    }
}

/// Binary logistic model fitted by gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryLogistic {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl BinaryLogistic {
    fn proba(&self, x: &Array2<f64>) -> Array1<f64> {
        (x.dot(&self.coefficients) + self.intercept).mapv(sigmoid)
    }
}

/// L2-regularised logistic regression, one-vs-rest for more than two classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    n_classes: usize,
    /// Inverse regularisation strength
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub learning_rate: f64,
    model: Option<OneVsRest<BinaryLogistic>>,
}

impl LogisticRegression {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            c: 1.0,
            max_iter: 500,
            tol: 1e-6,
            learning_rate: 0.5,
            model: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let model = OneVsRest::fit_with(y, self.n_classes, |target| Ok(self.fit_binary(x, target)))?;
        self.model = Some(model);
        Ok(())
    }

    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>) -> BinaryLogistic {
        let n = x.nrows() as f64;
        let penalty = 1.0 / (self.c * n);
        let mut w = Array1::<f64>::zeros(x.ncols());
        let mut b = 0.0;

        for _ in 0..self.max_iter {
            let p = (x.dot(&w) + b).mapv(sigmoid);
            let err = &p - y;
            let grad_w = x.t().dot(&err) / n + &w * penalty;
            let grad_b = err.sum() / n;

            w = &w - &(&grad_w * self.learning_rate);
            b -= self.learning_rate * grad_b;

            let step = grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b;
            if step.sqrt() < self.tol {
                break;
            }
        }

        BinaryLogistic {
            coefficients: w,
            intercept: b,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self.model.as_ref().ok_or(SwiftPredictError::ModelNotFitted)?;
        if let Some(first) = model.models.first() {
            check_n_features(first.coefficients.len(), x)?;
        }
        model.proba_with(x, |m, x| Ok(m.proba(x)))
    }
}
