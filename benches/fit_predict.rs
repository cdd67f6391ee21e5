//! Benchmarks for model fitting and simulated prediction.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use realty_forecast::core::TimeSeries;
use realty_forecast::models::{ForecastEngine, ForecastOptions, Growth, SeasonalityMode};

fn generate_prices(n: usize) -> TimeSeries {
    let base = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
    let timestamps = (0..n).map(|i| base + Duration::days(i as i64)).collect();
    let values = (0..n)
        .map(|i| {
            let x = i as f64;
            150_000.0
                + 60.0 * x
                + 3_000.0 * (2.0 * std::f64::consts::PI * x / 365.25).sin()
                + 500.0 * (2.0 * std::f64::consts::PI * x / 7.0).cos()
                + 800.0 * (x * 0.37).sin()
        })
        .collect();
    TimeSeries::new(timestamps, values).unwrap()
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");

    for size in [200, 730, 2000].iter() {
        let series = generate_prices(*size);

        group.bench_with_input(BenchmarkId::new("linear_additive", size), size, |b, _| {
            let engine = ForecastEngine::default();
            b.iter(|| engine.fit(black_box(&series)).unwrap())
        });

        group.bench_with_input(
            BenchmarkId::new("linear_multiplicative", size),
            size,
            |b, _| {
                let engine = ForecastEngine::new(
                    ForecastOptions::default()
                        .with_seasonality_mode(SeasonalityMode::Multiplicative),
                );
                b.iter(|| engine.fit(black_box(&series)).unwrap())
            },
        );

        group.bench_with_input(BenchmarkId::new("logistic", size), size, |b, _| {
            let engine = ForecastEngine::new(
                ForecastOptions::default()
                    .with_growth(Growth::Logistic)
                    .with_cap(400_000.0),
            );
            b.iter(|| engine.fit(black_box(&series)).unwrap())
        });
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    let model = ForecastEngine::default().fit(&generate_prices(730)).unwrap();

    for days in [30_i64, 365].iter() {
        group.bench_with_input(BenchmarkId::new("simulate_1000", days), days, |b, &d| {
            b.iter(|| model.predict(black_box(Duration::days(d)), 7).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict);
criterion_main!(benches);
