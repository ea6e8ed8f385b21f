// Performance benchmarks for fitting, gating and prediction
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pricegate::pipeline::train_records;
use pricegate::prelude::*;
use rand::prelude::*;

const MATERIALS: [&str; 5] = ["wool", "silk", "cotton", "pashmina", "linen"];
const STYLES: [&str; 4] = ["plain", "paisley", "kani", "sozni"];
const WORDS: [&str; 8] = ["hand", "embroidered", "woven", "soft", "warm", "border", "fine", "motif"];

fn generate_records(n: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let material = MATERIALS[rng.random_range(0..MATERIALS.len())];
            let style = STYLES[rng.random_range(0..STYLES.len())];
            let words: Vec<&str> = (0..6).map(|_| WORDS[rng.random_range(0..WORDS.len())]).collect();
            Record::new("shawl", material, "red", style, "kashmir", format!("{} {material} shawl {i}", words.join(" ")))
                .with_price(rng.random_range(500.0..5000.0))
        })
        .collect()
}

fn bench_config() -> PipelineConfig {
    PipelineConfig {
        booster: pricegate::BoosterConfig {
            n_estimators: 200,
            log_period: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn benchmark_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_preprocessor");
    group.sample_size(10);

    for size in [100, 1000].iter() {
        let records = generate_records(*size, 42);
        group.bench_with_input(BenchmarkId::new("pricegate", size), size, |b, _| {
            let preprocessor = Preprocessor::new(bench_config());
            b.iter(|| preprocessor.fit(black_box(&records)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    let config = bench_config();

    for size in [100, 1000].iter() {
        let records = generate_records(*size, 42);
        let pair = train_records(&records, &config).unwrap();
        let predictor =
            PricePredictor::new(pair.model, pair.preprocessor, SimilarityGate::from_config(&config)).unwrap();
        let queries = generate_records(100, 7);

        group.bench_with_input(BenchmarkId::new("single", size), size, |b, _| {
            b.iter(|| predictor.predict(black_box(&queries[0])));
        });
        group.bench_with_input(BenchmarkId::new("batch_100", size), size, |b, _| {
            b.iter(|| predictor.predict_batch(black_box(&queries)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_fit, benchmark_predict);
criterion_main!(benches);
