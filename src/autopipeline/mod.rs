//! Automated ML Pipeline module
//!
//! Drives a training run end to end:
//! - Task detection from the target column
//! - Profiling, null handling, encoding and collinearity pruning
//! - Train/test split, scaling and minority oversampling
//! - Cross-validated training of the candidate catalogue and model selection

mod automl;
mod config;
mod detector;
mod pipeline;

pub use automl::AutoMl;
pub use config::AutoMlConfig;
pub use detector::{regression_target, TargetEncoding, TaskDetector, TaskType};
pub use pipeline::{train_test_split, CandidateSummary, RunArtifact, TrainingPipeline};
