//! SwiftPredict CLI Module
//!
//! Command-line interface for training, profiling and prediction.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::autopipeline::{AutoMl, AutoMlConfig};
use crate::export::ExportedModel;
use crate::inference::FeatureValue;
use crate::preprocessing::{missing_mask, ColumnProfile, DtypeClass, NullImputer};
use crate::tracking::{ExperimentTracker, LocalStorage};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "swiftpredict")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AutoML training with experiment tracking")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the candidate catalogue and select the best models
    Train {
        /// Input data file (CSV, TSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Project the tracked runs belong to
        #[arg(short, long, default_value = "default")]
        project: String,

        /// JSON file with pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the selected model bundle to this path
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Metric key to export (accuracy, f1, roc_auc, precision, MAE, MSE, R2, overall)
        #[arg(short, long)]
        key: Option<String>,

        /// Directory to persist tracked runs in
        #[arg(long)]
        runs_dir: Option<PathBuf>,
    },

    /// Show column dtype classes and missing values
    Profile {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Predict one raw feature row with an exported model
    Predict {
        /// Exported model bundle
        #[arg(short, long)]
        model: PathBuf,

        /// Feature values as a JSON array, in training column order
        #[arg(short, long)]
        row: String,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    target: &str,
    project: &str,
    config_path: Option<&Path>,
    export: Option<&Path>,
    key: Option<&str>,
    runs_dir: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let config = match config_path {
        Some(path) => AutoMlConfig::from_json_file(path)?,
        None => AutoMlConfig::default(),
    };
    config.validate()?;

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_auto(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let tracker = match runs_dir {
        Some(dir) => ExperimentTracker::load(project, LocalStorage::new(dir))?,
        None => ExperimentTracker::new(project),
    };

    let mut automl = AutoMl::new(project, df)
        .with_config(config)
        .with_tracker(Arc::new(tracker));

    step_run(&format!("Training on target {}", target.cyan()));
    let start = Instant::now();
    let artifact = automl.fit(target)?;
    step_done(&format!("{} task in {:?}", artifact.task, start.elapsed()));

    section("Candidates");
    for candidate in &artifact.candidates {
        let scores: Vec<String> = candidate
            .mean_scores
            .iter()
            .map(|(metric, v)| format!("{}={:.4}", metric.model_key(), v))
            .collect();
        println!("  {:<24} {}", muted(&candidate.name), scores.join("  "));
    }

    section("Winners");
    for (key, entry) in artifact.models.iter() {
        println!("  {:<12} {}", muted(key), entry.names().join(", ").white().bold());
    }

    if let Some(path) = export {
        step_run(&format!("Exporting → {}", path.display()));
        let exported = automl.export_model(path, key)?;
        step_done(&format!("key {}", exported.key));
    }

    println!();
    Ok(())
}

pub fn cmd_profile(data_path: &Path) -> anyhow::Result<()> {
    section("Profile");

    let df = DataLoader::new().load_auto(data_path)?;
    let profile = ColumnProfile::from_frame(&df);

    for class in [DtypeClass::Categorical, DtypeClass::Numeric, DtypeClass::Date, DtypeClass::Boolean] {
        println!("  {:<12} {}", muted(class.as_str()), profile.columns(class).join(", "));
    }

    section("Missing values");
    for column in df.get_columns() {
        let missing = missing_mask(column.as_materialized_series()).iter().filter(|&&m| m).count();
        if missing > 0 {
            println!("  {:<24} {}", muted(column.name().as_str()), missing);
        }
    }
    println!(
        "  {:<24} {:.1}%",
        muted("rows with nulls"),
        NullImputer::null_row_fraction(&df) * 100.0
    );
    println!();
    Ok(())
}

pub fn cmd_predict(model_path: &Path, row: &str) -> anyhow::Result<()> {
    let model = ExportedModel::load(model_path)?;
    let values: Vec<FeatureValue> = serde_json::from_str(row)?;
    let prediction = model.predict_row(&values)?;
    println!("{}", prediction);
    Ok(())
}
