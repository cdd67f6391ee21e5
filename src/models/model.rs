//! Fitted model: immutable parameters plus everything needed to predict.

use crate::core::{epoch_days, ComponentColumn, ForecastResult, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::engine::N_MIN;
use crate::models::options::{ForecastOptions, Growth, SeasonalityMode};
use crate::models::scaling::Scaling;
use crate::models::seasonality::{seasonal_total, SeasonalComponent};
use crate::models::trend::{Changepoint, TrendParams};
use crate::models::uncertainty::{combine, CancellationToken, Simulation};
use crate::models::warning::FitWarning;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Version tag written into serialized models.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Longest forecast, in sampling steps, a model will produce.
pub const MAX_FORECAST_STEPS: usize = 100_000;

/// Cap on `future rows × draws` evaluated by one prediction.
pub const MAX_SIMULATED_VALUES: usize = 50_000_000;

/// Per-call prediction settings.
///
/// The seed is always explicit; there is no default configuration.
///
/// ```compile_fail
/// use realty_forecast::models::PredictConfig;
///
/// let config = PredictConfig::default();
/// ```
#[derive(Debug, Clone)]
pub struct PredictConfig {
    /// Seed for the simulation RNG; equal seeds give identical results.
    pub seed: u64,
    pub cancel: Option<CancellationToken>,
}

impl PredictConfig {
    pub fn new(seed: u64) -> Self {
        Self { seed, cancel: None }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A fitted forecasting model.
///
/// Models are immutable and can be shared between threads; every prediction
/// is a pure function of the model, the horizon and the seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub(crate) options: ForecastOptions,
    pub(crate) scaling: Scaling,
    pub(crate) trend: TrendParams,
    pub(crate) seasonalities: Vec<SeasonalComponent>,
    /// Residual standard deviation in scaled units.
    pub(crate) sigma: f64,
    pub(crate) interval_ms: i64,
    pub(crate) history: TimeSeries,
    pub(crate) warnings: Vec<FitWarning>,
}

#[derive(Serialize)]
struct ModelRecordRef<'a> {
    format_version: u32,
    model: &'a Model,
}

#[derive(Deserialize)]
struct ModelRecord {
    format_version: u32,
    model: Model,
}

#[derive(Deserialize)]
struct RecordHeader {
    format_version: u32,
}

impl Model {
    pub fn options(&self) -> &ForecastOptions {
        &self.options
    }

    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    pub fn trend(&self) -> &TrendParams {
        &self.trend
    }

    /// All changepoint candidates with their fitted slope changes.
    pub fn changepoints(&self) -> &[Changepoint] {
        &self.trend.changepoints
    }

    /// Seasonal components that were fitted.
    pub fn components(&self) -> &[SeasonalComponent] {
        &self.seasonalities
    }

    /// Residual standard deviation in original units.
    pub fn sigma(&self) -> f64 {
        self.scaling.unscale_delta(self.sigma)
    }

    /// Median spacing of the history; also the step of future rows.
    pub fn interval(&self) -> Duration {
        Duration::milliseconds(self.interval_ms)
    }

    pub fn history(&self) -> &TimeSeries {
        &self.history
    }

    /// Adjustments made while fitting.
    pub fn warnings(&self) -> &[FitWarning] {
        &self.warnings
    }

    /// Horizon covering `periods` sampling steps.
    pub fn horizon_for_periods(&self, periods: usize) -> Duration {
        let ms = self.interval_ms.saturating_mul(periods as i64);
        Duration::milliseconds(ms)
    }

    /// In-sample predictions for every observation.
    pub fn fitted_values(&self) -> Vec<f64> {
        let timestamps = self.history.timestamps();
        let t = self.scaling.times(timestamps);
        let t_days: Vec<f64> = timestamps.iter().map(epoch_days).collect();
        let seasonal = seasonal_total(&self.seasonalities, &t_days);

        t.iter()
            .zip(&seasonal)
            .map(|(&ti, &s)| {
                let g = self.trend.evaluate(ti);
                self.scaling
                    .unscale(combine(self.options.seasonality_mode, g, s))
            })
            .collect()
    }

    /// Observed minus fitted values.
    pub fn residuals(&self) -> Vec<f64> {
        self.history
            .values()
            .iter()
            .zip(self.fitted_values())
            .map(|(y, f)| y - f)
            .collect()
    }

    /// Forecast `horizon` past the last observation.
    pub fn predict(&self, horizon: Duration, seed: u64) -> Result<ForecastResult> {
        self.predict_with(horizon, &PredictConfig::new(seed))
    }

    /// Forecast `horizon` past the last observation with explicit settings.
    ///
    /// Future rows are spaced by [`interval`](Self::interval); the number of
    /// rows is `floor(horizon / interval)`.
    pub fn predict_with(&self, horizon: Duration, config: &PredictConfig) -> Result<ForecastResult> {
        let future = self.future_timestamps(horizon)?;
        self.predict_at(&future, config)
    }

    /// Forecast at arbitrary future timestamps.
    ///
    /// `future` must be strictly increasing and start after the last
    /// observation.
    pub fn predict_at(
        &self,
        future: &[DateTime<Utc>],
        config: &PredictConfig,
    ) -> Result<ForecastResult> {
        let last = self.history.end().ok_or(ForecastError::EmptyData)?;
        self.check_future(future, last)?;

        let n = self.history.len();
        let timestamps: Vec<DateTime<Utc>> = self
            .history
            .timestamps()
            .iter()
            .chain(future)
            .copied()
            .collect();
        let t = self.scaling.times(&timestamps);
        let t_days: Vec<f64> = timestamps.iter().map(epoch_days).collect();

        let columns: Vec<Vec<f64>> = self
            .seasonalities
            .iter()
            .map(|c| c.evaluate_all(&t_days))
            .collect();
        let mut seasonal = vec![0.0; timestamps.len()];
        for column in &columns {
            for (acc, v) in seasonal.iter_mut().zip(column) {
                *acc += v;
            }
        }

        let summary = Simulation {
            trend: &self.trend,
            future_t: &t[n..],
            future_seasonal: &seasonal[n..],
            mode: self.options.seasonality_mode,
            sigma: self.sigma,
            samples: self.options.uncertainty_samples,
            interval_width: self.options.interval_width,
        }
        .run(config.seed, config.cancel.as_ref())?;

        let mode = self.options.seasonality_mode;
        let trend_scaled: Vec<f64> = t[..n]
            .iter()
            .map(|&ti| self.trend.evaluate(ti))
            .chain(summary.trend_median.iter().copied())
            .collect();

        let mut yhat = Vec::with_capacity(timestamps.len());
        let mut lower = Vec::with_capacity(timestamps.len());
        let mut upper = Vec::with_capacity(timestamps.len());
        for i in 0..timestamps.len() {
            let point = combine(mode, trend_scaled[i], seasonal[i]);
            let (lo, hi) = if i < n {
                (point + summary.noise_lower, point + summary.noise_upper)
            } else {
                (summary.lower[i - n], summary.upper[i - n])
            };
            yhat.push(self.scaling.unscale(point));
            lower.push(self.scaling.unscale(lo));
            upper.push(self.scaling.unscale(hi));
        }
        envelope(&yhat, &mut lower, &mut upper, n);

        let trend = trend_scaled
            .iter()
            .map(|&g| self.scaling.unscale(g))
            .collect();
        let components = self
            .seasonalities
            .iter()
            .zip(columns)
            .map(|(component, values)| ComponentColumn {
                name: component.name.clone(),
                values: match mode {
                    SeasonalityMode::Additive => values
                        .into_iter()
                        .map(|v| self.scaling.unscale_delta(v))
                        .collect(),
                    SeasonalityMode::Multiplicative => values,
                },
            })
            .collect();

        tracing::debug!(
            rows = timestamps.len(),
            future = future.len(),
            draws = summary.draws,
            cancelled = summary.cancelled,
            "prediction complete"
        );

        ForecastResult::new(
            timestamps,
            yhat,
            lower,
            upper,
            trend,
            components,
            n,
            summary.draws,
            summary.cancelled,
        )
    }

    fn future_timestamps(&self, horizon: Duration) -> Result<Vec<DateTime<Utc>>> {
        let horizon_ms = horizon.num_milliseconds();
        if horizon_ms <= 0 {
            return Err(ForecastError::InvalidHorizon(format!(
                "horizon must be positive, got {horizon}"
            )));
        }
        let steps = match horizon_ms.checked_div(self.interval_ms) {
            Some(steps) if self.interval_ms > 0 => steps as usize,
            _ => {
                return Err(ForecastError::ComputationError(
                    "model has no positive sampling interval".into(),
                ))
            }
        };
        if steps == 0 {
            return Err(ForecastError::InvalidHorizon(format!(
                "horizon {horizon} is shorter than the sampling interval {}",
                self.interval()
            )));
        }
        if steps > MAX_FORECAST_STEPS {
            return Err(ForecastError::InvalidHorizon(format!(
                "{steps} steps requested, at most {MAX_FORECAST_STEPS} allowed"
            )));
        }

        let last = self.history.end().ok_or(ForecastError::EmptyData)?;
        (1..=steps as i64)
            .map(|i| {
                self.interval_ms
                    .checked_mul(i)
                    .and_then(|ms| last.checked_add_signed(Duration::milliseconds(ms)))
                    .ok_or_else(|| {
                        ForecastError::TimestampError("forecast runs past the calendar".into())
                    })
            })
            .collect()
    }

    fn check_future(&self, future: &[DateTime<Utc>], last: DateTime<Utc>) -> Result<()> {
        let first = future
            .first()
            .ok_or_else(|| ForecastError::InvalidHorizon("no future timestamps".into()))?;
        if *first <= last {
            return Err(ForecastError::InvalidHorizon(format!(
                "future timestamps must start after the last observation {last}"
            )));
        }
        if future.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ForecastError::InvalidHorizon(
                "future timestamps must be strictly increasing".into(),
            ));
        }
        if future.len() > MAX_FORECAST_STEPS {
            return Err(ForecastError::InvalidHorizon(format!(
                "{} steps requested, at most {MAX_FORECAST_STEPS} allowed",
                future.len()
            )));
        }
        if future.len().saturating_mul(self.options.uncertainty_samples) > MAX_SIMULATED_VALUES {
            return Err(ForecastError::InvalidHorizon(format!(
                "{} steps with {} draws exceed the simulation budget",
                future.len(),
                self.options.uncertainty_samples
            )));
        }
        Ok(())
    }

    /// Serialize to a versioned JSON record.
    pub fn to_json(&self) -> Result<String> {
        let record = ModelRecordRef {
            format_version: MODEL_FORMAT_VERSION,
            model: self,
        };
        Ok(serde_json::to_string(&record)?)
    }

    /// Load a model written by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self> {
        let header: RecordHeader = serde_json::from_str(json)?;
        if header.format_version != MODEL_FORMAT_VERSION {
            return Err(ForecastError::IncompatibleModel {
                found: header.format_version,
                expected: MODEL_FORMAT_VERSION,
            });
        }
        let record: ModelRecord = serde_json::from_str(json)?;
        record.model.options.validate()?;
        record.model.check_fitted_state()?;
        Ok(record.model)
    }

    /// Reject decoded records whose fitted state no fit could have produced.
    fn check_fitted_state(&self) -> Result<()> {
        let invalid = |what: &str| {
            Err(ForecastError::Serialization(format!(
                "invalid model record: {what}"
            )))
        };
        let positive = |x: f64| x > 0.0 && x.is_finite();

        if self.interval_ms <= 0 {
            return invalid("sampling interval must be positive");
        }
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return invalid("residual scale must be finite and non-negative");
        }
        if self.history.len() < N_MIN {
            return invalid("history is shorter than the fitting minimum");
        }
        if !positive(self.scaling.span_seconds) || !positive(self.scaling.y_scale) {
            return invalid("scaling must be positive and finite");
        }
        if self
            .seasonalities
            .iter()
            .any(|c| c.coefficients.len() != 2 * c.fourier_order)
        {
            return invalid("seasonal coefficients do not match the Fourier order");
        }
        if self.trend.growth != self.options.growth {
            return invalid("trend growth disagrees with the options");
        }
        if self.trend.growth == Growth::Logistic && !positive(self.trend.cap) {
            return invalid("logistic capacity must be positive");
        }
        Ok(())
    }
}

/// Clamp bounds around the point forecast. On future rows the lower and
/// upper half-widths never shrink from one row to the next.
fn envelope(yhat: &[f64], lower: &mut [f64], upper: &mut [f64], history_len: usize) {
    for i in 0..history_len.min(yhat.len()) {
        lower[i] = lower[i].min(yhat[i]);
        upper[i] = upper[i].max(yhat[i]);
    }

    let mut below: f64 = 0.0;
    let mut above: f64 = 0.0;
    for i in history_len..yhat.len() {
        below = below.max(yhat[i] - lower[i]);
        above = above.max(upper[i] - yhat[i]);
        lower[i] = yhat[i] - below;
        upper[i] = yhat[i] + above;
    }
}
