use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use std::sync::Arc;
use swiftpredict::autopipeline::{AutoMlConfig, TaskType, TrainingPipeline};
use swiftpredict::inference::FeatureValue;
use swiftpredict::tracking::ExperimentTracker;
use swiftpredict::training::{CVStrategy, CrossValidatedTrainer, CrossValidator, ModelSettings};

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = rand::thread_rng();
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y = x.rows().into_iter().map(|r| r.sum() + rng.gen::<f64>() * 0.1).collect();
    (x, y)
}

fn create_frame(n_rows: usize) -> DataFrame {
    let mut rng = rand::thread_rng();
    let a: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>()).collect();
    let b: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 5.0).collect();
    let color: Vec<&str> = (0..n_rows).map(|i| ["red", "green", "blue"][i % 3]).collect();
    let target: Vec<f64> = a.iter().zip(&b).map(|(a, b)| 3.0 * a + b).collect();
    df!("a" => &a, "b" => &b, "color" => &color, "target" => &target).unwrap()
}

fn bench_cross_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_validation");
    group.sample_size(10);

    let settings = ModelSettings {
        n_classes: 0,
        n_estimators: 20,
        max_depth: 4,
        learning_rate: 0.1,
        random_state: 42,
    };

    for n_rows in [500, 2000].iter() {
        let (x, y) = create_regression_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("regression", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let trainer = CrossValidatedTrainer::new(
                    TaskType::Regression,
                    settings,
                    CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false }),
                    Arc::new(ExperimentTracker::new("bench")),
                );
                trainer.train(black_box(x), black_box(y)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_row_replay(c: &mut Criterion) {
    let config = AutoMlConfig::default().with_cv_folds(3).with_n_estimators(10);
    let artifact = TrainingPipeline::new(config, Arc::new(ExperimentTracker::new("bench")))
        .run(&create_frame(300), "target")
        .unwrap();
    let row: Vec<FeatureValue> = vec![0.4.into(), 2.5.into(), "green".into()];

    c.bench_function("transform_row", |b| {
        b.iter(|| artifact.pipeline.transform_row(black_box(&row)).unwrap())
    });
}

criterion_group!(benches, bench_cross_validation, bench_row_replay);
criterion_main!(benches);
