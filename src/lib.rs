//! SwiftPredict - experiment tracking and AutoML training
//!
//! This crate ingests a tabular dataset, infers the learning task, cleans and
//! encodes the features, trains a fixed catalogue of candidate models under
//! cross-validation and selects the best model per scoring metric.
//!
//! # Modules
//!
//! ## Pipeline
//! - [`autopipeline`] - Task detection, run orchestration and the [`autopipeline::AutoMl`] front end
//! - [`preprocessing`] - Profiling, null handling, encoding, pruning, scaling
//! - [`synthetic`] - Minority oversampling (SMOTE)
//! - [`training`] - Candidate models, cross-validation, metrics, selection
//!
//! ## Serving
//! - [`inference`] - Replay of the fitted transforms on raw rows
//! - [`export`] - Exported model bundles
//!
//! ## Infrastructure
//! - [`tracking`] - Experiment logger capability and run store
//! - [`utils`] - Dataset loading
//! - [`cli`] - Command-line interface

pub mod error;

pub mod autopipeline;
pub mod preprocessing;
pub mod synthetic;
pub mod training;

pub mod export;
pub mod inference;

pub mod cli;
pub mod tracking;
pub mod utils;

pub use error::{Result, SwiftPredictError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Result, SwiftPredictError};

    pub use crate::autopipeline::{AutoMl, AutoMlConfig, RunArtifact, TaskType, TrainingPipeline};
    pub use crate::export::ExportedModel;
    pub use crate::inference::{FeatureValue, FittedPipeline, Prediction};
    pub use crate::preprocessing::{ColumnProfile, DtypeClass};
    pub use crate::tracking::{ExperimentLogger, ExperimentTracker, LocalStorage, RunStatus};
    pub use crate::training::{ModelEntry, ScoringMetric, TrainedModels, OVERALL_KEY};
    pub use crate::utils::DataLoader;
}
