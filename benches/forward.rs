//! Benchmark suite for the classifier forward pipeline
//!
//! Measures head-only inference latency over bottleneck feature batches.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use aparentar::params::CLASSIFIER_PARAM_COUNT;
use aparentar::{AgeGenderNet, ModelInput, StubBackbone, Tensor};

fn loaded_model() -> AgeGenderNet<StubBackbone> {
    let block: Vec<f32> = (0..CLASSIFIER_PARAM_COUNT)
        .map(|i| ((i % 31) as f32 - 15.0) * 0.01)
        .collect();
    let mut model = AgeGenderNet::new(StubBackbone::new());
    model.load_from_buffer(&block).unwrap();
    model
}

fn feature_batch(batch: usize) -> ModelInput {
    let data: Vec<f32> = (0..batch * 7 * 7 * 512).map(|i| (i % 97) as f32 * 0.01).collect();
    ModelInput::Features(Tensor::from_vec(vec![batch, 7, 7, 512], data).unwrap())
}

fn benchmark_infer_raw(c: &mut Criterion) {
    let model = loaded_model();
    let mut group = c.benchmark_group("infer_raw");

    for batch in [1, 4, 16].iter() {
        let input = feature_batch(*batch);
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, _| {
            b.iter(|| {
                let out = model.infer_raw(black_box(&input)).unwrap();
                black_box(out)
            });
        });
    }

    group.finish();
}

fn benchmark_predict(c: &mut Criterion) {
    let model = loaded_model();
    let input = feature_batch(1);

    c.bench_function("predict_age_and_gender", |b| {
        b.iter(|| {
            let prediction = model.predict_age_and_gender(black_box(&input)).unwrap();
            black_box(prediction)
        });
    });
}

fn benchmark_load_from_buffer(c: &mut Criterion) {
    let block: Vec<f32> = vec![0.01; CLASSIFIER_PARAM_COUNT];

    c.bench_function("load_from_buffer_classifier_only", |b| {
        b.iter(|| {
            let mut model = AgeGenderNet::new(StubBackbone::new());
            model.load_from_buffer(black_box(&block)).unwrap();
            black_box(model.is_loaded())
        });
    });
}

criterion_group!(
    benches,
    benchmark_infer_raw,
    benchmark_predict,
    benchmark_load_from_buffer
);
criterion_main!(benches);
