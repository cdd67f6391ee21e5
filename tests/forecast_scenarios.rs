//! End-to-end scenarios: fit a model on a series and check the forecast table.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realty_forecast::core::TimeSeries;
use realty_forecast::ingest::{price_series, Transaction};
use realty_forecast::models::uncertainty::MIN_DRAWS;
use realty_forecast::models::{
    CancellationToken, ForecastEngine, ForecastOptions, Growth, Model, PredictConfig,
    SeasonalityMode, SeasonalitySpec, MODEL_FORMAT_VERSION, N_MIN,
};
use realty_forecast::ForecastError;
use statrs::distribution::Normal;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
}

fn daily(values: Vec<f64>) -> TimeSeries {
    let timestamps = (0..values.len())
        .map(|i| start() + Duration::days(i as i64))
        .collect();
    TimeSeries::new(timestamps, values).unwrap()
}

/// Daily price-per-m² style series: trend, yearly wave and Gaussian noise.
fn noisy_prices(n: usize, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 500.0).unwrap();
    let values = (0..n)
        .map(|i| {
            let x = i as f64;
            150_000.0
                + 40.0 * x
                + 2_000.0 * (2.0 * std::f64::consts::PI * x / 365.25).sin()
                + rng.sample(noise)
        })
        .collect();
    daily(values)
}

fn fit(series: &TimeSeries, options: ForecastOptions) -> Model {
    ForecastEngine::new(options).fit(series).unwrap()
}

fn assert_bounds_hold(forecast: &realty_forecast::core::ForecastResult) {
    for row in forecast.rows() {
        assert!(
            row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper,
            "bounds violated at {}: {} <= {} <= {}",
            row.timestamp,
            row.yhat_lower,
            row.yhat,
            row.yhat_upper
        );
    }
}

#[test]
fn linear_history_extrapolates_exactly() {
    let values: Vec<f64> = (0..400).map(|i| 1000.0 + 5.0 * i as f64).collect();
    let model = fit(&daily(values), ForecastOptions::default());
    let forecast = model.predict(Duration::days(30), 1).unwrap();

    assert_eq!(forecast.len(), 430);
    assert_eq!(forecast.history_len(), 400);
    let last = forecast.row(429).unwrap();
    assert_eq!(last.timestamp, start() + Duration::days(429));
    assert!((last.yhat - (1000.0 + 5.0 * 429.0)).abs() < 1e-3);

    let residual_scale = model.residuals().iter().map(|r| r.abs()).fold(0.0, f64::max);
    assert!(residual_scale < 1e-6);
    assert_bounds_hold(&forecast);
}

#[test]
fn gentle_slope_is_reproduced_thirty_days_out() {
    let values: Vec<f64> = (0..400).map(|day| 100.0 + 0.5 * day as f64).collect();
    let model = fit(&daily(values), ForecastOptions::default());
    let forecast = model.predict(Duration::days(31), 0).unwrap();

    let row = forecast.row(430).unwrap();
    assert_eq!(row.timestamp, start() + Duration::days(430));
    assert!((row.yhat - 315.0).abs() < 1e-3, "yhat {}", row.yhat);
}

#[test]
fn fitting_needs_minimum_observations() {
    let engine = ForecastEngine::default();
    let short = daily((0..N_MIN - 1).map(|i| 10.0 + i as f64).collect());
    assert!(matches!(
        engine.fit(&short),
        Err(ForecastError::InsufficientData { .. })
    ));

    let enough = daily((0..N_MIN).map(|i| 10.0 + i as f64).collect());
    let model = engine.fit(&enough).unwrap();
    assert!(model.predict(Duration::days(3), 0).is_ok());
}

#[test]
fn constant_history_is_rejected() {
    let series = daily(vec![95_000.0; 60]);
    assert_eq!(
        ForecastEngine::default().fit(&series).unwrap_err(),
        ForecastError::DegenerateSeries
    );
}

#[test]
fn same_seed_reproduces_forecast() {
    let model = fit(&noisy_prices(300, 5), ForecastOptions::default());

    let a = model.predict(Duration::days(60), 2024).unwrap();
    let b = model.predict(Duration::days(60), 2024).unwrap();
    assert_eq!(a, b);

    let c = model.predict(Duration::days(60), 2025).unwrap();
    assert_eq!(a.yhat()[..300], c.yhat()[..300]);
    assert_ne!(a.yhat_upper(), c.yhat_upper());
}

#[test]
fn future_rows_follow_median_interval() {
    let model = fit(&noisy_prices(120, 8), ForecastOptions::default());
    let forecast = model.predict(Duration::hours(10 * 24 + 12), 3).unwrap();

    assert_eq!(forecast.horizon(), 10);
    assert_eq!(forecast.len(), 130);
    assert!(forecast.timestamps().windows(2).all(|w| w[0] < w[1]));
    let future = &forecast.timestamps()[120..];
    assert_eq!(future[0], start() + Duration::days(120));
    assert_eq!(future[9], start() + Duration::days(129));
    assert_eq!(model.horizon_for_periods(10), Duration::days(10));
}

#[test]
fn sub_second_cadence_is_preserved() {
    let timestamps: Vec<DateTime<Utc>> = (0..20)
        .map(|i| start() + Duration::milliseconds(1_500 * i))
        .collect();
    let values = (0..20).map(|i| 50.0 + 0.25 * i as f64).collect();
    let series = TimeSeries::new(timestamps, values).unwrap();

    let model = fit(&series, ForecastOptions::default());
    assert_eq!(model.interval(), Duration::milliseconds(1_500));

    let forecast = model.predict(Duration::seconds(6), 0).unwrap();
    assert_eq!(forecast.horizon(), 4);
    let future = &forecast.timestamps()[forecast.history_len()..];
    assert_eq!(future[0], start() + Duration::milliseconds(30_000));
    assert!(future
        .windows(2)
        .all(|w| w[1] - w[0] == Duration::milliseconds(1_500)));
}

#[test]
fn invalid_horizons_are_rejected() {
    let model = fit(&noisy_prices(60, 1), ForecastOptions::default());

    for horizon in [
        Duration::zero(),
        Duration::days(-5),
        Duration::hours(12),
        Duration::days(200_000),
    ] {
        assert!(
            matches!(
                model.predict(horizon, 0),
                Err(ForecastError::InvalidHorizon(_))
            ),
            "horizon {horizon} accepted"
        );
    }
}

#[test]
fn contradictory_options_are_rejected() {
    let series = noisy_prices(60, 1);
    let no_cap = ForecastOptions::default().with_growth(Growth::Logistic);
    assert!(matches!(
        ForecastEngine::new(no_cap).fit(&series),
        Err(ForecastError::InvalidOptions(_))
    ));

    let outside = ForecastOptions::default().with_changepoints(vec![start() - Duration::days(1)]);
    assert!(matches!(
        ForecastEngine::new(outside).fit(&series),
        Err(ForecastError::InvalidOptions(_))
    ));
}

#[test]
fn intervals_widen_into_the_future() {
    let model = fit(&noisy_prices(365, 21), ForecastOptions::default());
    let forecast = model.predict(Duration::days(120), 9).unwrap();
    assert_bounds_hold(&forecast);

    let widths = forecast.widths();
    let future = &widths[forecast.history_len()..];
    for pair in future.windows(2) {
        assert!(pair[1] >= pair[0] - 1e-6, "width shrank: {pair:?}");
    }
    assert!(future[future.len() - 1] > 0.0);
}

#[test]
fn slope_change_carries_into_forecast() {
    let values: Vec<f64> = (0..300)
        .map(|i| {
            let x = i as f64;
            if x < 150.0 {
                100_000.0 + 100.0 * x
            } else {
                115_000.0 - 50.0 * (x - 150.0)
            }
        })
        .collect();
    let options = ForecastOptions::default()
        .without_seasonality()
        .with_changepoint_penalty(1e-5);
    let model = fit(&daily(values), options);
    let forecast = model.predict(Duration::days(30), 4).unwrap();

    assert!(model.changepoints().iter().any(|cp| cp.delta < 0.0));
    let yhat = forecast.yhat();
    let decline = yhat[299] - yhat[329];
    assert!((decline - 1_500.0).abs() < 300.0, "decline {decline}");
}

#[test]
fn logistic_forecast_stays_below_cap() {
    let mut rng = StdRng::seed_from_u64(77);
    let cap = 300_000.0;
    let values: Vec<f64> = (0..400)
        .map(|i| {
            let x = i as f64 / 400.0;
            let level = cap / (1.0 + (-(6.0 * x - 2.0)).exp());
            (level + rng.gen_range(-1_000.0..1_000.0)).min(cap - 100.0)
        })
        .collect();
    let options = ForecastOptions::default()
        .with_growth(Growth::Logistic)
        .with_cap(cap)
        .without_seasonality();
    let model = fit(&daily(values), options);
    let forecast = model.predict(Duration::days(365), 12).unwrap();

    assert!(forecast.trend().iter().all(|&g| g < cap));
    assert!(forecast.yhat().iter().all(|&y| y <= cap));
    assert_bounds_hold(&forecast);
}

#[test]
fn multiplicative_components_are_relative() {
    let values: Vec<f64> = (0..210)
        .map(|i| {
            let x = i as f64;
            (120_000.0 + 80.0 * x) * (1.0 + 0.03 * (2.0 * std::f64::consts::PI * x / 7.0).sin())
        })
        .collect();
    let options = ForecastOptions::default()
        .with_seasonality_mode(SeasonalityMode::Multiplicative)
        .with_seasonalities(vec![SeasonalitySpec::weekly()]);
    let model = fit(&daily(values), options);
    let forecast = model.predict(Duration::days(14), 6).unwrap();

    let weekly = forecast.component("weekly").unwrap();
    let amplitude = weekly.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    assert!(amplitude > 0.02 && amplitude < 0.04, "amplitude {amplitude}");
    assert_bounds_hold(&forecast);
}

#[test]
fn serialized_model_predicts_identically() {
    let model = fit(&noisy_prices(200, 13), ForecastOptions::default());
    let json = model.to_json().unwrap();
    let restored = Model::from_json(&json).unwrap();

    assert_eq!(restored, model);
    assert_eq!(
        restored.predict(Duration::days(30), 5).unwrap(),
        model.predict(Duration::days(30), 5).unwrap()
    );

    let prefix = format!("{{\"format_version\":{MODEL_FORMAT_VERSION},");
    assert!(json.starts_with(&prefix));
    let tampered = json.replacen(&prefix, "{\"format_version\":99,", 1);
    assert_eq!(
        Model::from_json(&tampered).unwrap_err(),
        ForecastError::IncompatibleModel {
            found: 99,
            expected: MODEL_FORMAT_VERSION
        }
    );
}

#[test]
fn cancelled_prediction_returns_partial_draws() {
    let model = fit(&noisy_prices(200, 2), ForecastOptions::default());
    let token = CancellationToken::new();
    token.cancel();

    let config = PredictConfig::new(1).with_cancellation(token);
    let forecast = model.predict_with(Duration::days(30), &config).unwrap();

    assert!(forecast.cancelled());
    assert_eq!(forecast.simulation_draws(), MIN_DRAWS);
    assert_bounds_hold(&forecast);

    let full = model.predict(Duration::days(30), 1).unwrap();
    assert!(!full.cancelled());
    assert_eq!(full.simulation_draws(), 1000);
}

#[test]
fn transactions_flow_into_a_forecast() {
    let mut rng = StdRng::seed_from_u64(99);
    let day0 = start().date_naive();
    let mut transactions = Vec::new();
    for day in 0..400_i64 {
        if rng.gen_bool(0.3) {
            continue;
        }
        for _ in 0..rng.gen_range(1..4) {
            let area: f64 = rng.gen_range(30.0..90.0);
            let per_sqm = 160_000.0 + 60.0 * day as f64 + rng.gen_range(-4_000.0..4_000.0);
            transactions.push(Transaction {
                deal_date: day0 + Duration::days(day),
                price: per_sqm * area,
                area: Some(area),
                complex: Some("Riverside".to_string()),
                latitude: None,
                longitude: None,
            });
        }
    }

    let series = price_series(&transactions, Some("Riverside")).unwrap();
    assert!(series.len() > 200);

    let model = fit(&series, ForecastOptions::default());
    let forecast = model.predict(model.horizon_for_periods(90), 17).unwrap();
    assert_eq!(forecast.horizon(), 90);
    assert_bounds_hold(&forecast);

    let last = forecast.yhat()[forecast.len() - 1];
    let expected = 160_000.0 + 60.0 * (series.span_days() + 90.0);
    assert!((last - expected).abs() / expected < 0.05);
}
