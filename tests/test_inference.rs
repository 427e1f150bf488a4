//! Integration tests: exported bundles and row-level inference

use polars::prelude::*;
use swiftpredict::autopipeline::{AutoMl, AutoMlConfig};
use swiftpredict::export::ExportedModel;
use swiftpredict::inference::{FeatureValue, Prediction};
use swiftpredict::training::OVERALL_KEY;
use swiftpredict::SwiftPredictError;

fn fitted_automl() -> AutoMl {
    let n = 120;
    let size: Vec<f64> = (0..n).map(|i| (i % 3) as f64 * 10.0 + (i % 5) as f64).collect();
    let color: Vec<&str> = (0..n).map(|i| ["red", "green", "blue"][i % 3]).collect();
    let city: Vec<String> = (0..n).map(|i| format!("city_{}", i % 8)).collect();
    let member: Vec<&str> = (0..n).map(|i| if i % 4 == 0 { "Yes" } else { "No" }).collect();
    let kind: Vec<&str> = (0..n).map(|i| ["small", "medium", "large"][i % 3]).collect();

    let df = df!(
        "size" => &size,
        "color" => &color,
        "city" => &city,
        "member" => &member,
        "kind" => &kind
    )
    .unwrap();

    let config = AutoMlConfig::default().with_cv_folds(3).with_n_estimators(10).with_max_depth(3);
    let mut automl = AutoMl::new("shapes", df).with_config(config);
    automl.fit("kind").unwrap();
    automl
}

fn raw_row(size: f64, color: &str) -> Vec<FeatureValue> {
    vec![size.into(), color.into(), "city_3".into(), "no".into()]
}

#[test]
fn test_export_load_and_predict_labels() {
    let automl = fitted_automl();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("overall.json");

    let exported = automl.export_model(&path, None).unwrap();
    assert_eq!(exported.key, OVERALL_KEY);

    let loaded = ExportedModel::load(&path).unwrap();
    assert_eq!(loaded.pipeline, exported.pipeline);

    let row = raw_row(21.0, "blue");
    let from_bundle = loaded.predict_row(&row).unwrap();
    let in_process = automl.predict(OVERALL_KEY, &row).unwrap();
    assert_eq!(from_bundle, in_process);
    assert!(matches!(from_bundle, Prediction::Label(ref l) if ["small", "medium", "large"].contains(&l.as_str())));

    let batch = loaded.predict_rows(&[raw_row(0.0, "red"), raw_row(11.0, "green")]).unwrap();
    assert_eq!(batch.len(), 2);
}

#[test]
fn test_export_specific_metric_key() {
    let automl = fitted_automl();
    let dir = tempfile::tempdir().unwrap();

    let exported = automl.export_model(dir.path().join("f1.json"), Some("f1")).unwrap();
    assert_eq!(exported.key, "f1");
    assert_eq!(exported.entry.names().len(), 1);

    let err = automl.export_model(dir.path().join("mse.json"), Some("MSE")).unwrap_err();
    assert!(matches!(err, SwiftPredictError::UnknownModelKey(ref k) if k == "MSE"));
}

#[test]
fn test_pipeline_replay_is_idempotent_and_checks_schema() {
    let automl = fitted_automl();
    let pipeline = &automl.artifact().unwrap().pipeline;

    let row = raw_row(12.0, "purple");
    assert_eq!(pipeline.transform_row(&row).unwrap(), pipeline.transform_row(&row).unwrap());

    let short = vec![FeatureValue::Float(12.0)];
    assert!(matches!(pipeline.transform_row(&short), Err(SwiftPredictError::SchemaMismatch { .. })));

    let wrong_type = vec!["big".into(), "red".into(), "city_1".into(), "yes".into()];
    assert!(matches!(pipeline.transform_row(&wrong_type), Err(SwiftPredictError::SchemaMismatch { .. })));
}

#[test]
fn test_rows_from_json_text() {
    let automl = fitted_automl();
    let row: Vec<FeatureValue> = serde_json::from_str(r#"[5, "red", "city_0", "Yes"]"#).unwrap();
    assert!(automl.predict(OVERALL_KEY, &row).is_ok());
}
