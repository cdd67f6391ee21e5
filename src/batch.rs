//! Independent forecasts for many series, e.g. one per residential complex.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::Result;
use crate::models::{ForecastEngine, ForecastOptions};
use chrono::Duration;
use rayon::prelude::*;

/// Outcome for one keyed series.
#[derive(Debug)]
pub struct BatchForecast<K> {
    pub key: K,
    pub result: Result<ForecastResult>,
}

/// Fit and predict every series on the rayon pool.
///
/// Results keep the input order. A failure in one series does not affect
/// the others; each entry carries its own `Result`.
pub fn forecast_many<K>(
    series: &[(K, TimeSeries)],
    options: &ForecastOptions,
    horizon: Duration,
    seed: u64,
) -> Vec<BatchForecast<K>>
where
    K: Clone + Send + Sync,
{
    let engine = ForecastEngine::new(options.clone());
    let results: Vec<BatchForecast<K>> = series
        .par_iter()
        .map(|(key, data)| BatchForecast {
            key: key.clone(),
            result: engine
                .fit(data)
                .and_then(|model| model.predict(horizon, seed)),
        })
        .collect();

    let failed = results.iter().filter(|r| r.result.is_err()).count();
    tracing::debug!(series = results.len(), failed, "batch forecast finished");
    results
}
