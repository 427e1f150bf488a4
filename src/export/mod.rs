//! Model export
//!
//! A run's winning model(s) are exported together with the fitted feature
//! pipeline as one JSON document, so a loaded bundle can predict raw rows
//! without the training data.

use crate::autopipeline::{RunArtifact, TargetEncoding, TaskType};
use crate::error::{Result, SwiftPredictError};
use crate::inference::{predict_decoded, FeatureValue, FittedPipeline, Prediction};
use crate::training::{FittedModel, ModelEntry, OVERALL_KEY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Bumped whenever the exported layout changes
pub const FORMAT_VERSION: u32 = 1;

/// One exported TrainedModel entry plus the state needed to replay inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedModel {
    pub format_version: u32,
    pub session_id: String,
    pub task: TaskType,
    /// Metric key the entry was stored under
    pub key: String,
    pub target: String,
    pub labels: Option<TargetEncoding>,
    pub pipeline: FittedPipeline,
    pub entry: ModelEntry,
    pub exported_at: DateTime<Utc>,
}

impl ExportedModel {
    /// Bundle one entry of a run; `None` selects the overall winner
    pub fn from_artifact(artifact: &RunArtifact, key: Option<&str>) -> Result<Self> {
        let key = key.unwrap_or(OVERALL_KEY);
        let entry = artifact.models.get(key)?.clone();
        Ok(Self {
            format_version: FORMAT_VERSION,
            session_id: artifact.session_id.clone(),
            task: artifact.task,
            key: key.to_string(),
            target: artifact.target.clone(),
            labels: artifact.labels.clone(),
            pipeline: artifact.pipeline.clone(),
            entry,
            exported_at: Utc::now(),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        info!(path = %path.display(), key = %self.key, models = ?self.entry.names(), "Exported model");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let model: Self = serde_json::from_reader(BufReader::new(file))?;
        if model.format_version != FORMAT_VERSION {
            return Err(SwiftPredictError::Serialization(format!(
                "unsupported export format version {} (expected {})",
                model.format_version, FORMAT_VERSION
            )));
        }
        Ok(model)
    }

    /// The model predictions come from; the first one on an overall tie
    pub fn model(&self) -> Result<&FittedModel> {
        self.entry.primary().ok_or(SwiftPredictError::ModelNotFitted)
    }

    pub fn predict_row(&self, row: &[FeatureValue]) -> Result<Prediction> {
        let x = self.pipeline.transform_row(row)?.insert_axis(ndarray::Axis(0));
        predict_decoded(self.model()?, &x, self.labels.as_ref())?
            .pop()
            .ok_or_else(|| SwiftPredictError::Data("model returned no prediction".to_string()))
    }

    pub fn predict_rows(&self, rows: &[Vec<FeatureValue>]) -> Result<Vec<Prediction>> {
        let x = self.pipeline.transform_rows(rows)?;
        predict_decoded(self.model()?, &x, self.labels.as_ref())
    }
}
