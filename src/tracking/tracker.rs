//! Experiment tracker implementation
//!
//! Track runs, their parameters and per-step metric series.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::storage::StorageBackend;
use super::{ExperimentLogger, Params};
use crate::error::{Result, SwiftPredictError};

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Values logged for one metric key, in logging order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub steps: Vec<usize>,
    pub values: Vec<f64>,
}

impl MetricSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// A single tracked run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub project_name: String,
    pub created_at: DateTime<Utc>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, MetricSeries>,
    pub status: RunStatus,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

impl Run {
    pub fn new(run_id: impl Into<String>, project_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            project_name: project_name.into(),
            created_at: Utc::now(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            status: RunStatus::Running,
            notes: None,
            tags: Vec::new(),
        }
    }
}

/// Thread-safe in-process run store.
///
/// Runs are created on first write; every write touches exactly one run
/// under the store's lock, so writes for different run ids never interleave.
pub struct ExperimentTracker {
    project_name: String,
    runs: RwLock<BTreeMap<String, Run>>,
    storage: Option<Box<dyn StorageBackend>>,
}

impl ExperimentTracker {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            runs: RwLock::new(BTreeMap::new()),
            storage: None,
        }
    }

    /// Persist the store on every `finalize_run`
    pub fn with_storage(mut self, storage: impl StorageBackend + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Restore previously saved runs and keep saving to the same backend
    pub fn load(project_name: impl Into<String>, storage: impl StorageBackend + 'static) -> Result<Self> {
        let runs = storage.load_runs()?;
        let tracker = Self::new(project_name).with_storage(storage);
        {
            let mut map = tracker.runs.write();
            for run in runs {
                map.insert(run.run_id.clone(), run);
            }
        }
        Ok(tracker)
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Open a run; a fresh id is generated when none is given
    pub fn start_run(&self, run_id: Option<&str>) -> String {
        let run_id = run_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.runs
            .write()
            .entry(run_id.clone())
            .or_insert_with(|| Run::new(run_id.as_str(), self.project_name.as_str()));
        info!(run_id = %run_id, project = %self.project_name, "Run started");
        run_id
    }

    fn with_run<T>(&self, run_id: &str, f: impl FnOnce(&mut Run) -> T) -> T {
        let mut runs = self.runs.write();
        let run = runs
            .entry(run_id.to_string())
            .or_insert_with(|| Run::new(run_id, self.project_name.as_str()));
        f(run)
    }

    pub fn log_param(&self, run_id: &str, key: &str, value: impl ToString) {
        self.with_run(run_id, |run| {
            run.params.insert(key.to_string(), value.to_string());
        });
    }

    /// Metric keys are stored lower-cased
    pub fn log_metric(&self, run_id: &str, step: usize, key: &str, value: f64) {
        self.with_run(run_id, |run| {
            let series = run.metrics.entry(key.to_lowercase()).or_default();
            series.steps.push(step);
            series.values.push(value);
        });
        debug!(run_id, step, key, value, "Metric logged");
    }

    /// Close a run and save the store when a backend is attached
    pub fn finalize_run(&self, run_id: &str, status: RunStatus, notes: Option<String>, tags: Vec<String>) -> Result<()> {
        {
            let mut runs = self.runs.write();
            let run = runs
                .get_mut(run_id)
                .ok_or_else(|| SwiftPredictError::Data(format!("unknown run '{}'", run_id)))?;
            run.status = status;
            run.notes = notes;
            run.tags = tags;
        }
        info!(run_id, status = ?status, "Run finalized");
        self.save()
    }

    /// Write all runs to the attached backend; a no-op without one
    pub fn save(&self) -> Result<()> {
        if let Some(storage) = &self.storage {
            let runs: Vec<Run> = self.runs.read().values().cloned().collect();
            storage.save_runs(&runs)?;
        }
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> Option<Run> {
        self.runs.read().get(run_id).cloned()
    }

    pub fn run_ids(&self) -> Vec<String> {
        self.runs.read().keys().cloned().collect()
    }

    /// Runs of one project ordered by creation time
    pub fn project_runs(&self, project_name: &str) -> Vec<Run> {
        let mut runs: Vec<Run> = self
            .runs
            .read()
            .values()
            .filter(|r| r.project_name == project_name)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.created_at);
        runs
    }

    pub fn projects(&self) -> Vec<String> {
        let names: BTreeSet<String> = self.runs.read().values().map(|r| r.project_name.clone()).collect();
        names.into_iter().collect()
    }

    pub fn metric_history(&self, run_id: &str, key: &str) -> Option<MetricSeries> {
        self.runs
            .read()
            .get(run_id)
            .and_then(|r| r.metrics.get(&key.to_lowercase()).cloned())
    }
}

impl ExperimentLogger for ExperimentTracker {
    fn log_params(&self, run_id: &str, params: &Params) {
        self.with_run(run_id, |run| {
            for (k, v) in params {
                run.params.insert(k.clone(), v.clone());
            }
        });
    }

    fn log_metric(&self, run_id: &str, step: usize, key: &str, value: f64) {
        ExperimentTracker::log_metric(self, run_id, step, key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::LocalStorage;
    use std::sync::Arc;

    #[test]
    fn test_lazy_run_and_lowercase_keys() {
        let tracker = ExperimentTracker::new("demo");
        tracker.log_metric("r1", 0, "Accuracy", 0.5);
        tracker.log_metric("r1", 1, "accuracy", 0.7);
        let series = tracker.metric_history("r1", "ACCURACY").unwrap();
        assert_eq!(series.steps, vec![0, 1]);
        assert_eq!(series.last(), Some(0.7));
        assert_eq!(tracker.get_run("r1").unwrap().status, RunStatus::Running);
    }

    #[test]
    fn test_params_are_strings() {
        let tracker = ExperimentTracker::new("demo");
        let id = tracker.start_run(None);
        tracker.log_param(&id, "max_iter", 500);
        let mut params = Params::new();
        params.insert("model".to_string(), "LogisticRegression".to_string());
        ExperimentLogger::log_params(&tracker, &id, &params);

        let run = tracker.get_run(&id).unwrap();
        assert_eq!(run.params["max_iter"], "500");
        assert_eq!(run.params["model"], "LogisticRegression");
    }

    #[test]
    fn test_concurrent_writes_stay_per_run() {
        let tracker = Arc::new(ExperimentTracker::new("demo"));
        std::thread::scope(|s| {
            for t in 0..4 {
                let tracker = Arc::clone(&tracker);
                s.spawn(move || {
                    let run = format!("run-{}", t);
                    for step in 0..50 {
                        tracker.log_metric(&run, step, "loss", t as f64);
                    }
                });
            }
        });
        for t in 0..4 {
            let series = tracker.metric_history(&format!("run-{}", t), "loss").unwrap();
            assert_eq!(series.steps, (0..50).collect::<Vec<_>>());
            assert!(series.values.iter().all(|&v| v == t as f64));
        }
    }

    #[test]
    fn test_finalize_persists_and_load_restores() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::new("demo").with_storage(LocalStorage::new(dir.path()));
        tracker.log_metric("r1", 0, "r2", 0.9);
        tracker
            .finalize_run("r1", RunStatus::Finished, Some("done".to_string()), vec!["best".to_string()])
            .unwrap();

        let restored = ExperimentTracker::load("demo", LocalStorage::new(dir.path())).unwrap();
        let run = restored.get_run("r1").unwrap();
        assert_eq!(run.status, RunStatus::Finished);
        assert_eq!(run.tags, vec!["best".to_string()]);
        assert_eq!(restored.projects(), vec!["demo".to_string()]);
        assert_eq!(restored.project_runs("demo").len(), 1);
    }

    #[test]
    fn test_finalize_unknown_run_fails() {
        let tracker = ExperimentTracker::new("demo");
        assert!(tracker.finalize_run("nope", RunStatus::Failed, None, Vec::new()).is_err());
    }
}
