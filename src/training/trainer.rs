//! Cross-validated training of the candidate catalogue

use super::cross_validation::{CVSplit, CrossValidator};
use super::metrics::ScoringMetric;
use super::models::{catalogue, CandidateSpec, FittedModel, ModelSettings};
use crate::autopipeline::TaskType;
use crate::error::{Result, SwiftPredictError};
use crate::tracking::ExperimentLogger;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Cross-validation outcome for one candidate
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub name: String,
    /// Tracking run the fold values were logged under
    pub run_id: String,
    /// Mean over the folds where the metric could be computed
    pub mean_scores: BTreeMap<ScoringMetric, f64>,
    /// Per-fold values; `None` where the metric failed
    pub fold_scores: BTreeMap<ScoringMetric, Vec<Option<f64>>>,
    /// Candidate refitted on the full training split
    pub model: FittedModel,
}

impl CandidateResult {
    pub fn mean(&self, metric: ScoringMetric) -> Option<f64> {
        self.mean_scores.get(&metric).copied()
    }
}

type FoldOutcome = Vec<(ScoringMetric, Result<f64>)>;

/// Runs every catalogue candidate for a task through k-fold cross-validation
pub struct CrossValidatedTrainer {
    task: TaskType,
    settings: ModelSettings,
    validator: CrossValidator,
    parallel_folds: bool,
    session_id: String,
    logger: Arc<dyn ExperimentLogger>,
}

impl CrossValidatedTrainer {
    pub fn new(
        task: TaskType,
        settings: ModelSettings,
        validator: CrossValidator,
        logger: Arc<dyn ExperimentLogger>,
    ) -> Self {
        Self {
            task,
            settings,
            validator,
            parallel_folds: true,
            session_id: "session".to_string(),
            logger,
        }
    }

    /// Prefix of every candidate's tracking run id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_parallel_folds(mut self, parallel: bool) -> Self {
        self.parallel_folds = parallel;
        self
    }

    pub fn metrics(&self) -> &'static [ScoringMetric] {
        ScoringMetric::for_task(self.task)
    }

    pub fn run_id_for(&self, candidate: &str) -> String {
        format!("{}/{}", self.session_id, candidate)
    }

    /// Evaluate and refit every candidate, in catalogue order.
    ///
    /// A candidate whose full-split refit fails is skipped; the call fails
    /// only when no candidate survives.
    pub fn train(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<CandidateResult>> {
        let splits = self.validator.split(y)?;
        let mut results = Vec::new();
        let mut last_error = None;

        for spec in catalogue(self.task) {
            match self.evaluate(spec, &splits, x, y) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(model = spec.name, error = %e, "Candidate skipped");
                    last_error = Some(e);
                }
            }
        }

        if results.is_empty() {
            return Err(SwiftPredictError::Training(format!(
                "every candidate failed to train{}",
                last_error.map(|e| format!(" (last error: {})", e)).unwrap_or_default()
            )));
        }
        Ok(results)
    }

    fn evaluate(&self, spec: &CandidateSpec, splits: &[CVSplit], x: &Array2<f64>, y: &Array1<f64>) -> Result<CandidateResult> {
        let start = Instant::now();
        let metrics = self.metrics();
        let run = |split: &CVSplit| score_fold(spec, &self.settings, split, x, y, metrics);
        let outcomes: Vec<FoldOutcome> = if self.parallel_folds {
            splits.par_iter().map(run).collect()
        } else {
            splits.iter().map(run).collect()
        };

        let run_id = self.run_id_for(spec.name);
        let mut estimator = spec.build(&self.settings);
        let mut params = estimator.params();
        params.insert("model".to_string(), spec.name.to_string());
        self.logger.log_params(&run_id, &params);

        // fold order, whatever order the pool finished in
        let mut fold_scores: BTreeMap<ScoringMetric, Vec<Option<f64>>> = BTreeMap::new();
        for (fold, outcome) in outcomes.into_iter().enumerate() {
            for (metric, value) in outcome {
                let slot = fold_scores.entry(metric).or_default();
                match value {
                    Ok(v) => {
                        self.logger.log_metric(&run_id, fold, metric.scoring_name(), v);
                        slot.push(Some(v));
                    }
                    Err(e) => {
                        warn!(model = spec.name, fold, metric = metric.scoring_name(), error = %e, "Metric excluded from mean");
                        slot.push(None);
                    }
                }
            }
        }

        let mean_scores: BTreeMap<ScoringMetric, f64> = fold_scores
            .iter()
            .filter_map(|(&metric, values)| {
                let ok: Vec<f64> = values.iter().flatten().copied().collect();
                (!ok.is_empty()).then(|| (metric, ok.iter().sum::<f64>() / ok.len() as f64))
            })
            .collect();

        estimator.fit(x, y)?;

        info!(
            model = spec.name,
            folds = splits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            scores = ?mean_scores,
            "Candidate cross-validated"
        );

        Ok(CandidateResult {
            name: spec.name.to_string(),
            run_id,
            mean_scores,
            fold_scores,
            model: FittedModel {
                name: spec.name.to_string(),
                estimator,
            },
        })
    }
}

/// Fit a fresh candidate on the fold's train rows and score its test rows.
/// A failed fit fails every metric of the fold.
fn score_fold(
    spec: &CandidateSpec,
    settings: &ModelSettings,
    split: &CVSplit,
    x: &Array2<f64>,
    y: &Array1<f64>,
    metrics: &[ScoringMetric],
) -> FoldOutcome {
    let fold = split.fold_idx;
    let x_train = x.select(Axis(0), &split.train_indices);
    let y_train = y.select(Axis(0), &split.train_indices);
    let x_test = x.select(Axis(0), &split.test_indices);
    let y_test = y.select(Axis(0), &split.test_indices);

    let fail = |metric: ScoringMetric, reason: String| SwiftPredictError::MetricComputation {
        metric: metric.scoring_name().to_string(),
        fold,
        reason,
    };

    let mut model = spec.build(settings);
    let predicted = model.fit(&x_train, &y_train).and_then(|_| model.predict(&x_test));
    let y_pred = match predicted {
        Ok(p) => p,
        Err(e) => {
            return metrics
                .iter()
                .map(|&m| (m, Err(fail(m, format!("fold fit failed: {}", e)))))
                .collect();
        }
    };

    let proba = if metrics.iter().any(|m| m.needs_proba()) {
        model.predict_proba(&x_test)
    } else {
        None
    };

    metrics
        .iter()
        .map(|&metric| {
            let value = match (&proba, metric.needs_proba()) {
                (Some(Err(e)), true) => Err(fail(metric, e.to_string())),
                (Some(Ok(p)), true) => metric.score(&y_test, &y_pred, Some(p), settings.n_classes, fold),
                _ => metric.score(&y_test, &y_pred, None, settings.n_classes, fold),
            };
            (metric, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{CVStrategy, ModelSettings};
    use crate::tracking::ExperimentTracker;

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
    fn test_regression_candidates_log_every_fold() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i * (j + 1)) as f64 * 0.1);
        let y = Array1::from_shape_fn(40, |i| 3.0 * i as f64 + 1.0);
        let tracker = Arc::new(ExperimentTracker::new("test"));
        let validator = CrossValidator::new(CVStrategy::KFold { n_splits: 4, shuffle: false });
        let trainer = CrossValidatedTrainer::new(TaskType::Regression, settings(0), validator, tracker.clone())
            .with_session_id("abc");

        let results = trainer.train(&x, &y).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].name, "LinearRegression");

        for r in &results {
            assert_eq!(r.run_id, format!("abc/{}", r.name));
            let mse = tracker.metric_history(&r.run_id, "neg_mean_squared_error").unwrap();
            assert_eq!(mse.steps, vec![0, 1, 2, 3]);
            assert_eq!(tracker.get_run(&r.run_id).unwrap().params["model"], r.name);
        }
    }

    #[test]
    fn test_single_class_folds_drop_only_roc_auc() {
        // KFold without shuffling over sorted labels puts one class per fold
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 0.0 } else { 1.0 });
        let tracker = Arc::new(ExperimentTracker::new("test"));
        let validator = CrossValidator::new(CVStrategy::KFold { n_splits: 2, shuffle: false });
        let trainer = CrossValidatedTrainer::new(TaskType::Classification, settings(2), validator, tracker)
            .with_parallel_folds(false);

        let results = trainer.train(&x, &y).unwrap();
        assert_eq!(results.len(), 5);
        for r in &results {
            assert!(r.mean(ScoringMetric::RocAuc).is_none());
            assert!(r.mean(ScoringMetric::Accuracy).is_some());
            assert_eq!(r.fold_scores[&ScoringMetric::RocAuc], vec![None, None]);
        }
    }
}
