//! Experiment tracking
//!
//! The training pipeline only needs the two-method [`ExperimentLogger`]
//! capability; [`ExperimentTracker`] is the in-process implementation, with
//! optional JSON persistence through [`LocalStorage`].

mod storage;
mod tracker;

pub use storage::{LocalStorage, StorageBackend};
pub use tracker::{ExperimentTracker, MetricSeries, Run, RunStatus};

use std::collections::BTreeMap;
use std::sync::Arc;

/// Parameter name to value, stored as strings
pub type Params = BTreeMap<String, String>;

/// Sink for run parameters and per-step metric values
pub trait ExperimentLogger: Send + Sync {
    fn log_params(&self, run_id: &str, params: &Params);

    fn log_metric(&self, run_id: &str, step: usize, key: &str, value: f64);
}

impl<T: ExperimentLogger + ?Sized> ExperimentLogger for Arc<T> {
    fn log_params(&self, run_id: &str, params: &Params) {
        (**self).log_params(run_id, params)
    }

    fn log_metric(&self, run_id: &str, step: usize, key: &str, value: f64) {
        (**self).log_metric(run_id, step, key, value)
    }
}
