//! Standard scaling of the final feature matrix

use crate::error::{Result, SwiftPredictError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Standard scaler: (x - mean) / std with population std.
///
/// Zero-variance columns are centred but not scaled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit on a matrix whose columns are `feature_names`
    pub fn fit(&mut self, x: &Array2<f64>, feature_names: &[String]) -> Result<&mut Self> {
        if x.ncols() != feature_names.len() {
            return Err(SwiftPredictError::SchemaMismatch {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(SwiftPredictError::dataset_quality("cannot fit scaler on zero rows"));
        }

        let means = x.mean_axis(Axis(0)).ok_or_else(|| {
            SwiftPredictError::dataset_quality("cannot fit scaler on zero rows")
        })?;
        let stds = x.std_axis(Axis(0), 0.0);

        self.means = means.to_vec();
        self.scales = stds
            .iter()
            .map(|&s| if s > f64::EPSILON { s } else { 1.0 })
            .collect();
        self.feature_names = feature_names.to_vec();
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check(x.ncols())?;
        let means = Array1::from(self.means.clone());
        let scales = Array1::from(self.scales.clone());
        Ok((x - &means) / &scales)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>, feature_names: &[String]) -> Result<Array2<f64>> {
        self.fit(x, feature_names)?;
        self.transform(x)
    }

    /// Scale one feature row
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check(row.len())?;
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect())
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn check(&self, n_features: usize) -> Result<()> {
        if !self.is_fitted {
            return Err(SwiftPredictError::ModelNotFitted);
        }
        if n_features != self.means.len() {
            return Err(SwiftPredictError::SchemaMismatch {
                expected: format!("{} features", self.means.len()),
                actual: format!("{} features", n_features),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardizes_columns() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0]];
        let names = vec!["a".to_string(), "b".to_string()];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x, &names).unwrap();

        let col = scaled.column(0);
        assert!((col.sum()).abs() < 1e-12);
        let expected = 1.0 / (2.0f64 / 3.0).sqrt();
        assert!((col[2] - expected).abs() < 1e-12);
        // constant column is centred only
        assert_eq!(scaled.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_row_matches_matrix() {
        let x = array![[1.0, 4.0], [3.0, 8.0], [5.0, 6.0]];
        let names = vec!["a".to_string(), "b".to_string()];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x, &names).unwrap();
        let row = scaler.transform_row(x.row(1)).unwrap();
        assert_eq!(row, scaled.row(1).to_owned());
    }

    #[test]
    fn test_unfitted_and_width_errors() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(SwiftPredictError::ModelNotFitted)
        ));

        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0]], &["a".to_string(), "b".to_string()]).unwrap();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(SwiftPredictError::SchemaMismatch { .. })
        ));
    }
}
