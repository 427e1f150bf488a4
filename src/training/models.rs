//! Candidate model catalogue
//!
//! Each task type has a fixed list of candidates. A candidate is a value (a
//! name plus a constructor), and every constructed model is one variant of
//! [`Estimator`], which exposes the shared fit/predict/params capability.

use super::lightgbm::{LightGBMClassifier, LightGBMConfig, LightGBMRegressor};
use super::linear_models::{LinearRegression, LogisticRegression};
use super::naive_bayes::GaussianNaiveBayes;
use super::random_forest::RandomForest;
use super::xgboost::{XGBoostClassifier, XGBoostConfig, XGBoostRegressor};
use crate::autopipeline::{AutoMlConfig, TaskType};
use crate::error::Result;
use crate::tracking::Params;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Shared hyperparameters the catalogue constructors read
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Zero for regression
    pub n_classes: usize,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub random_state: u64,
}

impl ModelSettings {
    pub fn from_config(config: &AutoMlConfig, n_classes: usize) -> Self {
        Self {
            n_classes,
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            learning_rate: config.learning_rate,
            random_state: config.random_state,
        }
    }

    fn xgboost(&self) -> XGBoostConfig {
        XGBoostConfig {
            n_estimators: self.n_estimators,
            learning_rate: self.learning_rate,
            max_depth: self.max_depth,
            random_state: Some(self.random_state),
            ..Default::default()
        }
    }

    fn lightgbm(&self) -> LightGBMConfig {
        LightGBMConfig {
            n_estimators: self.n_estimators,
            learning_rate: self.learning_rate,
            random_state: Some(self.random_state),
            ..Default::default()
        }
    }
}

/// A fitted or unfitted catalogue model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", content = "state")]
pub enum Estimator {
    GaussianNaiveBayes(GaussianNaiveBayes),
    XGBoostClassifier(XGBoostClassifier),
    LightGBMClassifier(LightGBMClassifier),
    RandomForestClassifier(RandomForest),
    LogisticRegression(LogisticRegression),
    LinearRegression(LinearRegression),
    XGBoostRegressor(XGBoostRegressor),
    LightGBMRegressor(LightGBMRegressor),
    RandomForestRegressor(RandomForest),
}

impl Estimator {
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::GaussianNaiveBayes(m) => m.fit(x, y),
            Estimator::XGBoostClassifier(m) => m.fit(x, y),
            Estimator::LightGBMClassifier(m) => m.fit(x, y),
            Estimator::RandomForestClassifier(m) | Estimator::RandomForestRegressor(m) => m.fit(x, y).map(|_| ()),
            Estimator::LogisticRegression(m) => m.fit(x, y),
            Estimator::LinearRegression(m) => m.fit(x, y),
            Estimator::XGBoostRegressor(m) => m.fit(x, y),
            Estimator::LightGBMRegressor(m) => m.fit(x, y),
        }
    }

    /// Class indices for classifiers, values for regressors
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::GaussianNaiveBayes(m) => m.predict(x),
            Estimator::XGBoostClassifier(m) => m.predict(x),
            Estimator::LightGBMClassifier(m) => m.predict(x),
            Estimator::RandomForestClassifier(m) | Estimator::RandomForestRegressor(m) => m.predict(x),
            Estimator::LogisticRegression(m) => m.predict(x),
            Estimator::LinearRegression(m) => m.predict(x),
            Estimator::XGBoostRegressor(m) => m.predict(x),
            Estimator::LightGBMRegressor(m) => m.predict(x),
        }
    }

    /// Class probabilities (`n_rows x n_classes`); `None` for regressors
    pub fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        match self {
            Estimator::GaussianNaiveBayes(m) => Some(m.predict_proba(x)),
            Estimator::XGBoostClassifier(m) => Some(m.predict_proba(x)),
            Estimator::LightGBMClassifier(m) => Some(m.predict_proba(x)),
            Estimator::RandomForestClassifier(m) => Some(m.predict_proba(x)),
            Estimator::LogisticRegression(m) => Some(m.predict_proba(x)),
            Estimator::LinearRegression(_)
            | Estimator::XGBoostRegressor(_)
            | Estimator::LightGBMRegressor(_)
            | Estimator::RandomForestRegressor(_) => None,
        }
    }

    pub fn is_classifier(&self) -> bool {
        matches!(
            self,
            Estimator::GaussianNaiveBayes(_)
                | Estimator::XGBoostClassifier(_)
                | Estimator::LightGBMClassifier(_)
                | Estimator::RandomForestClassifier(_)
                | Estimator::LogisticRegression(_)
        )
    }

    /// Hyperparameters as loggable strings
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        let mut put = |k: &str, v: String| {
            params.insert(k.to_string(), v);
        };
        match self {
            Estimator::GaussianNaiveBayes(_) => put("var_smoothing", "1e-9".to_string()),
            Estimator::XGBoostClassifier(XGBoostClassifier { config, .. })
            | Estimator::XGBoostRegressor(XGBoostRegressor { config, .. }) => {
                put("n_estimators", config.n_estimators.to_string());
                put("learning_rate", config.learning_rate.to_string());
                put("max_depth", config.max_depth.to_string());
                put("reg_lambda", config.reg_lambda.to_string());
                put("min_child_weight", config.min_child_weight.to_string());
            }
            Estimator::LightGBMClassifier(LightGBMClassifier { config, .. })
            | Estimator::LightGBMRegressor(LightGBMRegressor { config, .. }) => {
                put("n_estimators", config.n_estimators.to_string());
                put("learning_rate", config.learning_rate.to_string());
                put("max_leaves", config.max_leaves.to_string());
                put("min_child_samples", config.min_child_samples.to_string());
            }
            Estimator::RandomForestClassifier(m) | Estimator::RandomForestRegressor(m) => {
                put("n_estimators", m.n_estimators.to_string());
                put(
                    "max_depth",
                    m.max_depth.map_or_else(|| "None".to_string(), |d| d.to_string()),
                );
                put("max_features", format!("{:?}", m.max_features));
                put("bootstrap", m.bootstrap.to_string());
            }
            Estimator::LogisticRegression(m) => {
                put("C", m.c.to_string());
                put("max_iter", m.max_iter.to_string());
            }
            Estimator::LinearRegression(_) => put("fit_intercept", "true".to_string()),
        }
        params
    }
}

/// One catalogue entry
#[derive(Debug, Clone, Copy)]
pub struct CandidateSpec {
    pub name: &'static str,
    pub build: fn(&ModelSettings) -> Estimator,
}

impl CandidateSpec {
    pub fn build(&self, settings: &ModelSettings) -> Estimator {
        (self.build)(settings)
    }
}

const CLASSIFIERS: [CandidateSpec; 5] = [
    CandidateSpec {
        name: "GaussianNB",
        build: |s| Estimator::GaussianNaiveBayes(GaussianNaiveBayes::new(s.n_classes)),
    },
    CandidateSpec {
        name: "XGBClassifier",
        build: |s| Estimator::XGBoostClassifier(XGBoostClassifier::new(s.xgboost(), s.n_classes)),
    },
    CandidateSpec {
        name: "LGBMClassifier",
        build: |s| Estimator::LightGBMClassifier(LightGBMClassifier::new(s.lightgbm(), s.n_classes)),
    },
    CandidateSpec {
        name: "RandomForestClassifier",
        build: |s| {
            Estimator::RandomForestClassifier(
                RandomForest::new_classifier(s.n_estimators, s.n_classes).with_random_state(s.random_state),
            )
        },
    },
    CandidateSpec {
        name: "LogisticRegression",
        build: |s| Estimator::LogisticRegression(LogisticRegression::new(s.n_classes)),
    },
];

const REGRESSORS: [CandidateSpec; 4] = [
    CandidateSpec {
        name: "LinearRegression",
        build: |_| Estimator::LinearRegression(LinearRegression::new()),
    },
    CandidateSpec {
        name: "XGBRegressor",
        build: |s| Estimator::XGBoostRegressor(XGBoostRegressor::new(s.xgboost())),
    },
    CandidateSpec {
        name: "LGBMRegressor",
        build: |s| Estimator::LightGBMRegressor(LightGBMRegressor::new(s.lightgbm())),
    },
    CandidateSpec {
        name: "RandomForestRegressor",
        build: |s| {
            Estimator::RandomForestRegressor(
                RandomForest::new_regressor(s.n_estimators).with_random_state(s.random_state),
            )
        },
    },
];

/// Fixed candidate list for a task, in evaluation order
pub fn catalogue(task: TaskType) -> &'static [CandidateSpec] {
    match task {
        TaskType::Classification => &CLASSIFIERS,
        TaskType::Regression => &REGRESSORS,
    }
}

/// A catalogue model fitted on the full training split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub name: String,
    pub estimator: Estimator,
}

impl FittedModel {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.estimator.predict(x)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Option<Result<Array2<f64>>> {
        self.estimator.predict_proba(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn settings(n_classes: usize) -> ModelSettings {
        ModelSettings {
            n_classes,
            n_estimators: 5,
            max_depth: 3,
            learning_rate: 0.3,
            random_state: 42,
        }
    }

    #[test]
    fn test_catalogue_shapes() {
        let names: Vec<&str> = catalogue(TaskType::Classification).iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec!["GaussianNB", "XGBClassifier", "LGBMClassifier", "RandomForestClassifier", "LogisticRegression"]
        );
        assert_eq!(catalogue(TaskType::Regression).len(), 4);
        assert!(catalogue(TaskType::Regression)
            .iter()
            .all(|c| !c.build(&settings(0)).is_classifier()));
    }

    #[test]
    fn test_every_classifier_fits_and_scores() {
        let x = array![[0.0, 0.1], [0.2, 0.0], [0.1, 0.3], [3.0, 3.1], [3.2, 2.9], [2.9, 3.3]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        for spec in catalogue(TaskType::Classification) {
            let mut model = spec.build(&settings(2));
            model.fit(&x, &y).unwrap();
            assert_eq!(model.predict(&x).unwrap().len(), 6, "{}", spec.name);
            let proba = model.predict_proba(&x).unwrap().unwrap();
            assert_eq!(proba.dim(), (6, 2), "{}", spec.name);
            assert!(!model.params().is_empty());
        }
    }

    #[test]
    fn test_estimator_serde_roundtrip() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![2.0, 4.0, 6.0];
        let mut model = (catalogue(TaskType::Regression)[0].build)(&settings(0));
        model.fit(&x, &y).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: Estimator = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict(&x).unwrap(), model.predict(&x).unwrap());
    }
}
