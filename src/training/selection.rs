//! Best-model selection per metric and overall

use super::metrics::ScoringMetric;
use super::models::FittedModel;
use super::trainer::CandidateResult;
use crate::error::{Result, SwiftPredictError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Key of the consensus winner in [`TrainedModels`]
pub const OVERALL_KEY: &str = "overall";

/// Winning candidate indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Metric to the candidate with the highest mean score
    pub winners: BTreeMap<ScoringMetric, usize>,
    /// Most frequent per-metric winner(s), in candidate order
    pub overall: Vec<usize>,
}

/// Statistical mode of the winner indices; every index tied for the mode
/// is returned, ascending
pub fn overall_winners(winners: &[usize]) -> Vec<usize> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &w in winners {
        *counts.entry(w).or_default() += 1;
    }
    let Some(&top) = counts.values().max() else {
        return Vec::new();
    };
    counts
        .into_iter()
        .filter(|&(_, c)| c == top)
        .map(|(idx, _)| idx)
        .collect()
}

/// Pick the argmax candidate for each metric; the earlier candidate wins a tie.
/// Metrics no candidate could score are left out.
pub fn select_best(results: &[CandidateResult], metrics: &[ScoringMetric]) -> Result<Selection> {
    let mut winners = BTreeMap::new();
    for &metric in metrics {
        let mut best: Option<(usize, f64)> = None;
        for (idx, result) in results.iter().enumerate() {
            if let Some(score) = result.mean(metric) {
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((idx, score));
                }
            }
        }
        match best {
            Some((idx, score)) => {
                info!(metric = metric.scoring_name(), model = %results[idx].name, score, "Metric winner");
                winners.insert(metric, idx);
            }
            None => warn!(metric = metric.scoring_name(), "No candidate could be scored"),
        }
    }

    if winners.is_empty() {
        return Err(SwiftPredictError::Training(
            "no metric could be computed for any candidate".to_string(),
        ));
    }

    // metric order, as the winners were determined
    let ordered: Vec<usize> = metrics.iter().filter_map(|m| winners.get(m).copied()).collect();
    let overall = overall_winners(&ordered);
    Ok(Selection { winners, overall })
}

/// A stored model, or several when the overall vote ties
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "models", rename_all = "snake_case")]
pub enum ModelEntry {
    Single(FittedModel),
    Tied(Vec<FittedModel>),
}

impl ModelEntry {
    /// The model used for prediction: the first tied candidate on ties
    pub fn primary(&self) -> Option<&FittedModel> {
        match self {
            ModelEntry::Single(m) => Some(m),
            ModelEntry::Tied(models) => models.first(),
        }
    }

    pub fn models(&self) -> Vec<&FittedModel> {
        match self {
            ModelEntry::Single(m) => vec![m],
            ModelEntry::Tied(models) => models.iter().collect(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.models().into_iter().map(|m| m.name.as_str()).collect()
    }
}

/// Metric key (`accuracy`, `MSE`, ..., `overall`) to the winning model(s)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainedModels {
    entries: BTreeMap<String, ModelEntry>,
}

impl TrainedModels {
    pub fn from_selection(results: &[CandidateResult], selection: &Selection) -> Self {
        let mut entries = BTreeMap::new();
        for (metric, &idx) in &selection.winners {
            entries.insert(metric.model_key().to_string(), ModelEntry::Single(results[idx].model.clone()));
        }
        let overall = match selection.overall.as_slice() {
            [single] => ModelEntry::Single(results[*single].model.clone()),
            tied => ModelEntry::Tied(tied.iter().map(|&i| results[i].model.clone()).collect()),
        };
        entries.insert(OVERALL_KEY.to_string(), overall);
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Result<&ModelEntry> {
        self.entries
            .get(key)
            .ok_or_else(|| SwiftPredictError::UnknownModelKey(key.to_string()))
    }

    pub fn overall(&self) -> Result<&ModelEntry> {
        self.get(OVERALL_KEY)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
