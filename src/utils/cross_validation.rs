//! Rolling-origin cross-validation on calendar time.
//!
//! Cutoffs are laid out backwards from `end - horizon` in steps of `period`
//! while at least `initial` of history precedes them. Each fold fits a fresh
//! model on observations up to the cutoff and scores the forecast at the
//! observations falling in `(cutoff, cutoff + horizon]`.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastEngine, ForecastOptions, PredictConfig, N_MIN};
use crate::utils::metrics::{calculate_metrics, interval_coverage, AccuracyMetrics};
use crate::utils::stats::{mean, std_dev};
use chrono::{DateTime, Duration, Utc};

/// Cross-validation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CVStrategy {
    /// Training window keeps the length `initial` and slides forward.
    Rolling,
    /// Training window always starts at the first observation.
    #[default]
    Expanding,
}

/// Configuration for time-based cross-validation.
#[derive(Debug, Clone)]
pub struct CVConfig {
    /// Minimum span of history before the first cutoff.
    pub initial: Duration,
    /// Spacing between cutoffs.
    pub period: Duration,
    /// Forecast horizon for each fold.
    pub horizon: Duration,
    pub strategy: CVStrategy,
    /// Simulation seed shared by all folds.
    pub seed: u64,
}

impl CVConfig {
    /// Expanding-window configuration.
    pub fn expanding(initial: Duration, horizon: Duration) -> Self {
        Self {
            initial,
            period: horizon,
            horizon,
            strategy: CVStrategy::Expanding,
            seed: 0,
        }
    }

    /// Rolling-window configuration with a fixed training span.
    pub fn rolling(window: Duration, horizon: Duration) -> Self {
        Self {
            strategy: CVStrategy::Rolling,
            ..Self::expanding(window, horizon)
        }
    }

    /// Set the spacing between cutoffs.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Outcome of one cutoff.
#[derive(Debug, Clone)]
pub struct CVFold {
    pub cutoff: DateTime<Utc>,
    pub train_len: usize,
    pub metrics: AccuracyMetrics,
    /// Share of held-out observations inside the forecast interval.
    pub coverage: f64,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

/// Aggregated metrics from cross-validation.
#[derive(Debug, Clone)]
pub struct AggregatedMetrics {
    /// Mean MAE across folds.
    pub mae: f64,
    /// Mean RMSE across folds.
    pub rmse: f64,
    /// Mean SMAPE across folds.
    pub smape: f64,
    /// Mean MAPE across folds (None if any fold had zeros).
    pub mape: Option<f64>,
    /// Mean interval coverage across folds.
    pub coverage: f64,
    /// Standard deviation of MAE across folds.
    pub mae_std: f64,
}

/// Results from cross-validation.
#[derive(Debug, Clone)]
pub struct CVResults {
    pub folds: Vec<CVFold>,
    pub aggregated: AggregatedMetrics,
}

impl CVResults {
    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }
}

/// Cutoff timestamps for `series`, oldest first.
pub fn cutoffs(series: &TimeSeries, config: &CVConfig) -> Result<Vec<DateTime<Utc>>> {
    if config.horizon <= Duration::zero() || config.period <= Duration::zero() {
        return Err(ForecastError::InvalidOptions(
            "cross-validation horizon and period must be positive".into(),
        ));
    }
    if config.initial < Duration::zero() {
        return Err(ForecastError::InvalidOptions(
            "cross-validation initial window must not be negative".into(),
        ));
    }
    let (Some(start), Some(end)) = (series.start(), series.end()) else {
        return Err(ForecastError::EmptyData);
    };

    let out_of_range = || {
        ForecastError::InvalidOptions("cross-validation window runs past the calendar".into())
    };
    let earliest = start
        .checked_add_signed(config.initial)
        .ok_or_else(out_of_range)?;
    let mut cutoff = end
        .checked_sub_signed(config.horizon)
        .ok_or_else(out_of_range)?;
    let mut result = Vec::new();
    while cutoff >= earliest {
        result.push(cutoff);
        match cutoff.checked_sub_signed(config.period) {
            Some(previous) => cutoff = previous,
            None => break,
        }
    }
    result.reverse();
    Ok(result)
}

/// Evaluate `options` by refitting at every cutoff.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use realty_forecast::core::TimeSeries;
/// use realty_forecast::models::ForecastOptions;
/// use realty_forecast::utils::cross_validation::{cross_validate, CVConfig};
///
/// let start = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
/// let timestamps: Vec<_> = (0..120).map(|d| start + Duration::days(d)).collect();
/// let values: Vec<f64> = (0..120).map(|d| 100.0 + d as f64).collect();
/// let series = TimeSeries::new(timestamps, values).unwrap();
///
/// let config = CVConfig::expanding(Duration::days(60), Duration::days(14));
/// let options = ForecastOptions::default().with_uncertainty_samples(100);
/// let results = cross_validate(&series, &options, &config).unwrap();
///
/// assert!(results.n_folds() > 0);
/// assert!(results.aggregated.mae < 1.0);
/// ```
pub fn cross_validate(
    series: &TimeSeries,
    options: &ForecastOptions,
    config: &CVConfig,
) -> Result<CVResults> {
    let engine = ForecastEngine::new(options.clone());
    let timestamps = series.timestamps();
    let values = series.values();
    let predict = PredictConfig::new(config.seed);
    let mut folds = Vec::new();

    for cutoff in cutoffs(series, config)? {
        let train_end = timestamps.partition_point(|ts| *ts <= cutoff);
        let train_start = match config.strategy {
            CVStrategy::Expanding => 0,
            CVStrategy::Rolling => {
                // Cutoffs are at least `initial` after the first observation.
                let window_start = cutoff.checked_sub_signed(config.initial).unwrap_or(cutoff);
                timestamps.partition_point(|ts| *ts <= window_start)
            }
        };
        let test_end = match cutoff.checked_add_signed(config.horizon) {
            Some(test_until) => timestamps.partition_point(|ts| *ts <= test_until),
            None => timestamps.len(),
        };

        if test_end == train_end {
            continue;
        }
        if train_end - train_start < N_MIN {
            tracing::debug!(%cutoff, train = train_end - train_start, "fold skipped: short training window");
            continue;
        }

        let train = series.slice(train_start, train_end)?;
        let model = engine.fit(&train)?;
        let forecast = model.predict_at(&timestamps[train_end..test_end], &predict)?;

        let h = forecast.history_len();
        let actual = values[train_end..test_end].to_vec();
        let predicted = forecast.yhat()[h..].to_vec();
        let metrics = calculate_metrics(&actual, &predicted)?;
        let coverage = interval_coverage(
            &actual,
            &forecast.yhat_lower()[h..],
            &forecast.yhat_upper()[h..],
        )?;

        folds.push(CVFold {
            cutoff,
            train_len: train.len(),
            metrics,
            coverage,
            actual,
            predicted,
        });
    }

    let aggregated = aggregate(&folds);
    Ok(CVResults { folds, aggregated })
}

fn aggregate(folds: &[CVFold]) -> AggregatedMetrics {
    if folds.is_empty() {
        return AggregatedMetrics {
            mae: f64::NAN,
            rmse: f64::NAN,
            smape: f64::NAN,
            mape: None,
            coverage: f64::NAN,
            mae_std: f64::NAN,
        };
    }

    let collect = |f: fn(&CVFold) -> f64| folds.iter().map(f).collect::<Vec<f64>>();
    let mae_values = collect(|fold| fold.metrics.mae);

    let mape = folds
        .iter()
        .map(|fold| fold.metrics.mape)
        .collect::<Option<Vec<f64>>>()
        .map(|values| mean(&values));

    AggregatedMetrics {
        mae: mean(&mae_values),
        rmse: mean(&collect(|fold| fold.metrics.rmse)),
        smape: mean(&collect(|fold| fold.metrics.smape)),
        mape,
        coverage: mean(&collect(|fold| fold.coverage)),
        mae_std: if folds.len() < 2 { 0.0 } else { std_dev(&mae_values) },
    }
}
