//! Price-per-m² forecast for a residential complex.
//!
//! Run with: cargo run --example price_forecast [transactions.json]
//!
//! Without an argument a synthetic transaction log is generated.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realty_forecast::ingest::{count_by_complex, load_transactions, price_series, Transaction};
use realty_forecast::models::{ForecastEngine, ForecastOptions};
use realty_forecast::utils::calculate_metrics;
use tracing_subscriber::EnvFilter;

fn synthetic_transactions() -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(2024);
    let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    let mut transactions = Vec::new();

    for day in 0..3 * 365_i64 {
        let t = day as f64;
        let trend = if day < 500 {
            150_000.0 + 120.0 * t
        } else {
            210_000.0 + 30.0 * (t - 500.0)
        };
        let yearly = 4_000.0 * (2.0 * std::f64::consts::PI * t / 365.25).sin();
        for _ in 0..rng.gen_range(0..4) {
            let area: f64 = rng.gen_range(28.0..110.0);
            let per_sqm = trend + yearly + rng.gen_range(-6_000.0..6_000.0);
            transactions.push(Transaction {
                deal_date: start + Duration::days(day),
                price: per_sqm * area,
                area: Some(area),
                complex: Some("Harbour View".to_string()),
                latitude: None,
                longitude: None,
            });
        }
    }
    transactions
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== realty-forecast: price per m² ===\n");

    let transactions = match std::env::args().nth(1) {
        Some(path) => load_transactions(&path).unwrap(),
        None => synthetic_transactions(),
    };
    let complexes = count_by_complex(&transactions);
    println!("Loaded {} transactions", transactions.len());
    for (name, count) in complexes.iter().take(5) {
        println!("  {name}: {count}");
    }

    // 1. Aggregate to a daily price-per-m² series for the busiest complex
    let complex = complexes.first().map(|(name, _)| name.as_str());
    let series = price_series(&transactions, complex).unwrap();
    println!(
        "\nSeries: {} days with deals over {:.0} days",
        series.len(),
        series.span_days()
    );

    // 2. Fit
    let model = ForecastEngine::new(ForecastOptions::default())
        .fit(&series)
        .unwrap();
    for warning in model.warnings() {
        println!("warning: {warning}");
    }
    println!("\n--- Significant changepoints ---");
    for cp in model.changepoints().iter().filter(|cp| cp.delta.abs() > 1e-2) {
        println!("  {}  delta {:+.4}", cp.timestamp.date_naive(), cp.delta);
    }

    // 3. In-sample accuracy
    let metrics = calculate_metrics(series.values(), &model.fitted_values()).unwrap();
    println!("\nMAE {:.0}  RMSE {:.0}  R² {:.3}", metrics.mae, metrics.rmse, metrics.r_squared);

    // 4. One year ahead
    let forecast = model.predict(Duration::days(365), 42).unwrap();
    println!("\n--- Forecast (every 30th day) ---");
    println!("{:>12} {:>12} {:>12} {:>12}", "date", "lower", "yhat", "upper");
    println!("{:-<52}", "");
    for row in forecast.future_rows().step_by(30) {
        println!(
            "{:>12} {:>12.0} {:>12.0} {:>12.0}",
            row.timestamp.date_naive(),
            row.yhat_lower,
            row.yhat,
            row.yhat_upper
        );
    }
}
