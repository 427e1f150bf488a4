//! Single-object front end over a dataset: fit, export, predict

use super::config::AutoMlConfig;
use super::pipeline::{RunArtifact, TrainingPipeline};
use crate::error::{Result, SwiftPredictError};
use crate::export::ExportedModel;
use crate::inference::{predict_decoded, FeatureValue, Prediction};
use crate::tracking::{ExperimentTracker, RunStatus};
use crate::training::OVERALL_KEY;
use crate::utils::DataLoader;
use polars::prelude::DataFrame;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// AutoML session over one dataset.
///
/// Every candidate trained by [`AutoMl::fit`] is tracked as a run of the
/// session's project and finalized once selection is done.
pub struct AutoMl {
    project: String,
    data: DataFrame,
    config: AutoMlConfig,
    tracker: Arc<ExperimentTracker>,
    artifact: Option<RunArtifact>,
}

impl AutoMl {
    pub fn new(project: impl Into<String>, data: DataFrame) -> Self {
        let project = project.into();
        Self {
            tracker: Arc::new(ExperimentTracker::new(project.as_str())),
            project,
            data,
            config: AutoMlConfig::default(),
            artifact: None,
        }
    }

    /// Load the dataset from a CSV/TSV, Parquet or JSON file
    pub fn from_path(project: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let data = DataLoader::new().load_auto(path)?;
        Ok(Self::new(project, data))
    }

    pub fn with_config(mut self, config: AutoMlConfig) -> Self {
        self.config = config;
        self
    }

    /// Log into a shared tracker instead of a private one
    pub fn with_tracker(mut self, tracker: Arc<ExperimentTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn tracker(&self) -> &Arc<ExperimentTracker> {
        &self.tracker
    }

    /// Train every candidate for `target` and keep the winners
    pub fn fit(&mut self, target: &str) -> Result<&RunArtifact> {
        let logger = Arc::clone(&self.tracker);
        let artifact = TrainingPipeline::new(self.config.clone(), logger).run(&self.data, target)?;

        for candidate in &artifact.candidates {
            let won: Vec<String> = artifact
                .models
                .iter()
                .filter(|(_, entry)| entry.names().contains(&candidate.name.as_str()))
                .map(|(key, _)| key.to_string())
                .collect();
            let notes = format!("{} / target '{}'", artifact.task, artifact.target);
            self.tracker
                .finalize_run(&candidate.run_id, RunStatus::Finished, Some(notes), won)?;
        }

        info!(project = %self.project, session = %artifact.session_id, "AutoML fit complete");
        let stored = self.artifact.insert(artifact);
        Ok(&*stored)
    }

    pub fn artifact(&self) -> Result<&RunArtifact> {
        self.artifact.as_ref().ok_or(SwiftPredictError::ModelNotFitted)
    }

    /// Write one TrainedModel entry to `path`; `None` exports `overall`
    pub fn export_model(&self, path: impl AsRef<Path>, key: Option<&str>) -> Result<ExportedModel> {
        let exported = ExportedModel::from_artifact(self.artifact()?, key)?;
        exported.save(path)?;
        Ok(exported)
    }

    /// Predict one raw feature row with the entry stored under `key`
    pub fn predict(&self, key: &str, row: &[FeatureValue]) -> Result<Prediction> {
        let artifact = self.artifact()?;
        let model = artifact
            .models
            .get(key)?
            .primary()
            .ok_or(SwiftPredictError::ModelNotFitted)?;
        let x = artifact.pipeline.transform_row(row)?.insert_axis(ndarray::Axis(0));
        predict_decoded(model, &x, artifact.labels.as_ref())?
            .pop()
            .ok_or_else(|| SwiftPredictError::Data("model returned no prediction".to_string()))
    }

    /// Predict with the overall winner
    pub fn predict_overall(&self, row: &[FeatureValue]) -> Result<Prediction> {
        self.predict(OVERALL_KEY, row)
    }
}
