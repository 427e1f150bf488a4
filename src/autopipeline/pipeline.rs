//! End-to-end training run: raw frame in, fitted pipeline and winning models out

use super::config::AutoMlConfig;
use super::detector::{regression_target, TargetEncoding, TaskDetector, TaskType};
use crate::error::{Result, SwiftPredictError};
use crate::inference::{FeatureSchema, FittedPipeline};
use crate::preprocessing::{
    frame_to_matrix, missing_mask, ColumnProfile, CorrelationPruner, Encoder, NullImputer, NullPolicy,
    StandardScaler,
};
use crate::synthetic::{ImbalanceCorrector, SMOTE};
use crate::tracking::ExperimentLogger;
use crate::training::{
    select_best, CVStrategy, CrossValidatedTrainer, CrossValidator, ModelSettings, ScoringMetric, TrainedModels,
};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Cross-validation outcome of one candidate, without the fitted model
#[derive(Debug, Clone)]
pub struct CandidateSummary {
    pub name: String,
    pub run_id: String,
    pub mean_scores: BTreeMap<ScoringMetric, f64>,
}

/// Everything a finished training run hands back
#[derive(Debug, Clone)]
pub struct RunArtifact {
    pub session_id: String,
    pub task: TaskType,
    pub target: String,
    /// Class labels for classification, `None` for regression
    pub labels: Option<TargetEncoding>,
    pub pipeline: FittedPipeline,
    pub models: TrainedModels,
    pub candidates: Vec<CandidateSummary>,
    pub null_policy: NullPolicy,
    /// Held-out split, already encoded, pruned and scaled
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

impl RunArtifact {
    /// Score a stored entry on the held-out split.
    ///
    /// Metrics that cannot be computed on the split are left out.
    pub fn evaluate(&self, key: &str) -> Result<BTreeMap<ScoringMetric, f64>> {
        let entry = self.models.get(key)?;
        let model = entry.primary().ok_or(SwiftPredictError::ModelNotFitted)?;
        let y_pred = model.predict(&self.x_test)?;
        let proba = model.predict_proba(&self.x_test).transpose()?;

        let n_classes = self.labels.as_ref().map_or(0, TargetEncoding::n_classes);
        let mut scores = BTreeMap::new();
        for &metric in ScoringMetric::for_task(self.task) {
            match metric.score(&self.y_test, &y_pred, proba.as_ref(), n_classes, 0) {
                Ok(v) => {
                    scores.insert(metric, v);
                }
                Err(e) => warn!(key, metric = metric.scoring_name(), error = %e, "Held-out metric skipped"),
            }
        }
        Ok(scores)
    }
}

/// Seeded shuffled train/test split of row indices.
///
/// Classification splits per class so every class keeps at least one
/// training row; regression holds out `ceil(n * test_size)` rows.
pub fn train_test_split(
    y: &Array1<f64>,
    task: TaskType,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    match task {
        TaskType::Classification => {
            let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
            for (i, &v) in y.iter().enumerate() {
                by_class.entry(v.round() as i64).or_default().push(i);
            }
            for rows in by_class.values_mut() {
                rows.shuffle(&mut rng);
                let n_test = ((rows.len() as f64 * test_size).round() as usize).min(rows.len() - 1);
                test.extend_from_slice(&rows[..n_test]);
                train.extend_from_slice(&rows[n_test..]);
            }
        }
        TaskType::Regression => {
            let mut rows: Vec<usize> = (0..y.len()).collect();
            rows.shuffle(&mut rng);
            let n_test = ((rows.len() as f64 * test_size).ceil() as usize).min(rows.len().saturating_sub(1));
            test.extend_from_slice(&rows[..n_test]);
            train.extend_from_slice(&rows[n_test..]);
        }
    }

    if test.is_empty() || train.is_empty() {
        return Err(SwiftPredictError::dataset_quality(format!(
            "{} rows are too few for a train/test split with test_size {}",
            y.len(),
            test_size
        )));
    }
    Ok((train, test))
}

fn drop_missing_target(df: &DataFrame, target: &str) -> Result<DataFrame> {
    let mask = missing_mask(df.column(target)?.as_materialized_series());
    let n_missing = mask.iter().filter(|&&m| m).count();
    if n_missing == 0 {
        return Ok(df.clone());
    }
    let keep: Vec<bool> = mask.iter().map(|&m| !m).collect();
    let frame = df.filter(&BooleanChunked::from_slice("keep".into(), &keep))?;
    info!(target_column = target, dropped = n_missing, "Dropped rows with a missing target");
    Ok(frame)
}

/// Runs the full training flow for one dataset and target
pub struct TrainingPipeline {
    config: AutoMlConfig,
    logger: Arc<dyn ExperimentLogger>,
    session_id: String,
}

impl TrainingPipeline {
    pub fn new(config: AutoMlConfig, logger: Arc<dyn ExperimentLogger>) -> Self {
        let session_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            config,
            logger,
            session_id,
        }
    }

    /// Prefix of the per-candidate tracking run ids
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &AutoMlConfig {
        &self.config
    }

    pub fn run(&self, df: &DataFrame, target: &str) -> Result<RunArtifact> {
        let start = Instant::now();
        self.config.validate()?;
        if df.height() == 0 || df.width() == 0 {
            return Err(SwiftPredictError::dataset_quality("dataset is empty"));
        }
        info!(rows = df.height(), columns = df.width(), target_column = target, "Starting training run");

        let task = TaskDetector::new(self.config.max_classification_cardinality).detect(df, target)?;
        let df = drop_missing_target(df, target)?;

        let profile = ColumnProfile::from_frame(&df);
        info!(
            categorical = profile.categorical.len(),
            numeric = profile.numeric.len(),
            date = profile.date.len(),
            boolean = profile.boolean.len(),
            "Profiled columns"
        );

        let imputed = NullImputer::new(self.config.null_drop_threshold).apply(&df)?;
        let df = imputed.frame;
        if df.height() == 0 {
            return Err(SwiftPredictError::dataset_quality("no rows left after null handling"));
        }

        let target_series = df.column(target)?.as_materialized_series().clone();
        let (labels, y) = match task {
            TaskType::Classification => {
                let encoding = TargetEncoding::fit(&target_series)?;
                if encoding.n_classes() < 2 {
                    return Err(SwiftPredictError::column_quality(
                        target,
                        "classification target needs at least two classes",
                    ));
                }
                let y = encoding.encode(&target_series)?;
                (Some(encoding), y)
            }
            TaskType::Regression => (None, regression_target(&target_series)?),
        };

        let features = df.drop(target)?;
        if features.width() == 0 {
            return Err(SwiftPredictError::dataset_quality("no feature columns besides the target"));
        }
        let schema = FeatureSchema::from_frame(&features);

        let (encoded, encoding) = Encoder::new(self.config.max_onehot_levels).fit_transform(&features)?;
        if encoded.width() == 0 {
            return Err(SwiftPredictError::dataset_quality("no usable feature columns after encoding"));
        }
        let (x, names) = frame_to_matrix(&encoded)?;
        let (x, names, pruned) = CorrelationPruner::new().fit_transform(&x, &names)?;
        let profile = ColumnProfile::from_frame(&encoded.select(names.iter().map(String::as_str))?);
        info!(features = profile.len(), "Feature matrix ready");

        let (train_idx, test_idx) = train_test_split(&y, task, self.config.test_size, self.config.random_state)?;
        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), &test_idx);
        let y_test = y.select(Axis(0), &test_idx);

        let mut scaler = StandardScaler::new();
        let x_train = scaler.fit_transform(&x_train, &names)?;
        let x_test = scaler.transform(&x_test)?;

        let (x_train, y_train) = match task {
            TaskType::Classification => {
                let smote = SMOTE::new()
                    .with_k_neighbors(self.config.smote_k_neighbors)
                    .with_seed(self.config.random_state);
                match ImbalanceCorrector::new(self.config.imbalance_threshold, smote).correct(&x_train, &y_train)? {
                    Some(resampled) => (resampled.x, resampled.y),
                    None => (x_train, y_train),
                }
            }
            TaskType::Regression => (x_train, y_train),
        };

        let n_classes = labels.as_ref().map_or(0, TargetEncoding::n_classes);
        let strategy = match task {
            TaskType::Classification => CVStrategy::StratifiedKFold {
                n_splits: self.config.cv_folds,
                shuffle: true,
            },
            TaskType::Regression => CVStrategy::KFold {
                n_splits: self.config.cv_folds,
                shuffle: false,
            },
        };
        let trainer = CrossValidatedTrainer::new(
            task,
            ModelSettings::from_config(&self.config, n_classes),
            CrossValidator::new(strategy).with_random_state(self.config.random_state),
            Arc::clone(&self.logger),
        )
        .with_session_id(self.session_id.as_str())
        .with_parallel_folds(self.config.parallel_folds);

        let results = trainer.train(&x_train, &y_train)?;
        let selection = select_best(&results, trainer.metrics())?;
        let models = TrainedModels::from_selection(&results, &selection);

        info!(
            session = %self.session_id,
            task = %task,
            candidates = results.len(),
            overall = ?models.overall()?.names(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training run finished"
        );

        let candidates = results
            .into_iter()
            .map(|r| CandidateSummary {
                name: r.name,
                run_id: r.run_id,
                mean_scores: r.mean_scores,
            })
            .collect();

        Ok(RunArtifact {
            session_id: self.session_id.clone(),
            task,
            target: target.to_string(),
            labels,
            pipeline: FittedPipeline {
                schema,
                encoding,
                pruned,
                scaler,
            },
            models,
            candidates,
            null_policy: imputed.policy,
            x_test,
            y_test,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::ExperimentTracker;

    #[test]
    fn test_stratified_split_keeps_every_class_in_train() {
        let y = Array1::from_shape_fn(23, |i| if i < 20 { 0.0 } else { 1.0 });
        let (train, test) = train_test_split(&y, TaskType::Classification, 0.2, 7).unwrap();
        assert_eq!(train.len() + test.len(), 23);
        assert_eq!(test.iter().filter(|&&i| y[i] == 0.0).count(), 4);
        assert_eq!(test.iter().filter(|&&i| y[i] == 1.0).count(), 1);
        assert_eq!(train.iter().filter(|&&i| y[i] == 1.0).count(), 2);

        let again = train_test_split(&y, TaskType::Classification, 0.2, 7).unwrap();
        assert_eq!(again.1, test);
    }

    #[test]
    fn test_split_needs_two_rows() {
        let y = Array1::from_elem(1, 3.0);
        assert!(train_test_split(&y, TaskType::Regression, 0.2, 0).is_err());
    }

    #[test]
    fn test_missing_target_column_fails_before_training() {
        let df = df!("a" => &[1.0, 2.0, 3.0]).unwrap();
        let pipeline = TrainingPipeline::new(AutoMlConfig::default(), Arc::new(ExperimentTracker::new("t")));
        let err = pipeline.run(&df, "label").unwrap_err();
        assert!(matches!(err, SwiftPredictError::DataQuality { .. }));
    }

    #[test]
    fn test_constant_categorical_features_fail_cleanly() {
        let labels: Vec<&str> = (0..40).map(|i| if i % 2 == 0 { "a" } else { "b" }).collect();
        let df = df!("c" => vec!["k"; 40], "y" => labels).unwrap();

        let config = AutoMlConfig::default().with_cv_folds(3);
        let pipeline = TrainingPipeline::new(config, Arc::new(ExperimentTracker::new("t")));
        match pipeline.run(&df, "y").unwrap_err() {
            SwiftPredictError::DataQuality { column, reason } => {
                assert!(column.is_none());
                assert!(reason.contains("after encoding"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_regression_run_produces_error_metric_keys() {
        let n = 60;
        let x1: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let x2: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64).collect();
        let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 2.0 * a - b + 0.5).collect();
        let df = df!("x1" => &x1, "x2" => &x2, "y" => &y).unwrap();

        let config = AutoMlConfig::default()
            .with_cv_folds(3)
            .with_n_estimators(5)
            .with_parallel_folds(false);
        let tracker = Arc::new(ExperimentTracker::new("t"));
        let artifact = TrainingPipeline::new(config, tracker.clone())
            .with_session_id("reg")
            .run(&df, "y")
            .unwrap();

        assert_eq!(artifact.task, TaskType::Regression);
        assert_eq!(artifact.models.keys(), vec!["MAE", "MSE", "R2", "overall"]);
        assert_eq!(artifact.x_test.nrows(), 12);
        assert!(artifact.labels.is_none());
        assert_eq!(
            tracker.metric_history("reg/LinearRegression", "r2").unwrap().len(),
            3
        );
        let held_out = artifact.evaluate("R2").unwrap();
        assert!(held_out.contains_key(&ScoringMetric::NegMeanSquaredError));
    }
}
