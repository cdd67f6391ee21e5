//! Fitting orchestration: scaling, trend, seasonality and residual scale.

use crate::core::{epoch_days, TimeSeries, SECONDS_PER_DAY};
use crate::error::{ForecastError, Result};
use crate::models::model::Model;
use crate::models::options::{ForecastOptions, Growth, SeasonalityMode};
use crate::models::scaling::Scaling;
use crate::models::seasonality::{seasonal_total, SeasonalComponent, SeasonalityModel};
use crate::models::trend::{TrendDesign, TrendModel, TrendParams};
use crate::models::uncertainty::combine;
use crate::models::warning::FitWarning;
use crate::utils::ols::lasso_fit;
use crate::utils::stats::rms;
use chrono::{DateTime, Utc};

/// Fewest observations a model will be fitted to.
pub const N_MIN: usize = 10;

/// Upper bound on trend/seasonality alternation rounds.
pub const MAX_BACKFIT_ROUNDS: usize = 100;

const BACKFIT_TOL: f64 = 1e-9;

/// Smallest `1 + seasonal` factor used when dividing it out of a logistic target.
const MIN_SEASONAL_FACTOR: f64 = 1e-6;

/// Fits [`Model`]s from observed series.
///
/// # Example
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use realty_forecast::core::TimeSeries;
/// use realty_forecast::models::{ForecastEngine, ForecastOptions};
///
/// let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
/// let timestamps: Vec<_> = (0..60).map(|d| start + Duration::days(d)).collect();
/// let values: Vec<f64> = (0..60).map(|d| 5_000.0 + 12.0 * d as f64).collect();
/// let series = TimeSeries::new(timestamps, values).unwrap();
///
/// let model = ForecastEngine::new(ForecastOptions::default()).fit(&series).unwrap();
/// let forecast = model.predict(Duration::days(14), 42).unwrap();
/// assert_eq!(forecast.len(), 60 + 14);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    options: ForecastOptions,
}

/// Scaled inputs shared by the fitting paths.
struct FitData<'a> {
    scaling: Scaling,
    t: Vec<f64>,
    t_days: Vec<f64>,
    y: Vec<f64>,
    sites: &'a [(DateTime<Utc>, f64)],
}

impl ForecastEngine {
    pub fn new(options: ForecastOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ForecastOptions {
        &self.options
    }

    /// Fit a model to `series`.
    pub fn fit(&self, series: &TimeSeries) -> Result<Model> {
        self.options.validate()?;

        let n = series.len();
        if n == 0 {
            return Err(ForecastError::EmptyData);
        }
        if n < N_MIN {
            return Err(ForecastError::InsufficientData {
                needed: N_MIN,
                got: n,
            });
        }
        if series.is_constant() {
            return Err(ForecastError::DegenerateSeries);
        }

        let trend_model = TrendModel::from_options(&self.options);
        if let (Growth::Logistic, Some(cap)) = (self.options.growth, self.options.cap) {
            let floor = trend_model.floor();
            if series.values().iter().any(|&y| y <= floor || y >= cap) {
                return Err(ForecastError::InvalidOptions(format!(
                    "observations must lie strictly between floor ({floor}) and cap ({cap})"
                )));
            }
        }

        let scaling = Scaling::from_series(series, trend_model.floor())?;
        let timestamps = series.timestamps();
        let interval = series.median_interval()?;
        let interval_days = interval.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;

        let mut warnings = Vec::new();
        let (sites, reduced) = trend_model.changepoint_sites(timestamps, &scaling)?;
        warnings.extend(reduced);
        let (seasonality, disabled) = SeasonalityModel::resolve(
            &self.options.seasonalities,
            series.span_days(),
            interval_days,
            n,
        );
        warnings.extend(disabled);

        let data = FitData {
            t: scaling.times(timestamps),
            t_days: timestamps.iter().map(epoch_days).collect(),
            y: series.values().iter().map(|&v| scaling.value(v)).collect(),
            scaling,
            sites: &sites,
        };

        let (trend, seasonalities) =
            match (self.options.growth, self.options.seasonality_mode) {
                (Growth::Linear, SeasonalityMode::Additive) => {
                    fit_joint(&trend_model, &seasonality, &data)?
                }
                _ => self.backfit(&trend_model, &seasonality, &data, &mut warnings)?,
            };

        let seasonal = seasonal_total(&seasonalities, &data.t_days);
        let residuals: Vec<f64> = data
            .y
            .iter()
            .zip(&data.t)
            .zip(&seasonal)
            .map(|((&y, &t), &s)| y - combine(self.options.seasonality_mode, trend.evaluate(t), s))
            .collect();
        let sigma = rms(&residuals);

        for warning in &warnings {
            tracing::warn!(%warning, "fit adjusted");
        }
        tracing::debug!(
            observations = n,
            changepoints = trend.active_changepoints().count(),
            seasonalities = seasonalities.len(),
            sigma,
            "model fitted"
        );

        Ok(Model {
            options: self.options.clone(),
            scaling: data.scaling,
            trend,
            seasonalities,
            sigma,
            interval_ms: interval.num_milliseconds(),
            history: series.clone(),
            warnings,
        })
    }

    /// Alternate trend and seasonal fits until the seasonal part settles.
    fn backfit(
        &self,
        trend_model: &TrendModel,
        seasonality: &SeasonalityModel,
        data: &FitData<'_>,
        warnings: &mut Vec<FitWarning>,
    ) -> Result<(TrendParams, Vec<SeasonalComponent>)> {
        let mode = self.options.seasonality_mode;
        let mut seasonal = vec![0.0; data.y.len()];
        let mut components = Vec::new();

        for round in 1..=MAX_BACKFIT_ROUNDS {
            let trend = match (mode, trend_model.growth()) {
                (SeasonalityMode::Additive, _) => {
                    let target: Vec<f64> =
                        data.y.iter().zip(&seasonal).map(|(y, s)| y - s).collect();
                    trend_model.fit(&data.scaling, &data.t, &target, data.sites, None)?
                }
                (SeasonalityMode::Multiplicative, Growth::Linear) => {
                    let factor: Vec<f64> = seasonal.iter().map(|s| 1.0 + s).collect();
                    trend_model.fit(&data.scaling, &data.t, &data.y, data.sites, Some(&factor))?
                }
                (SeasonalityMode::Multiplicative, Growth::Logistic) => {
                    let target: Vec<f64> = data
                        .y
                        .iter()
                        .zip(&seasonal)
                        .map(|(y, s)| y / (1.0 + s).max(MIN_SEASONAL_FACTOR))
                        .collect();
                    trend_model.fit(&data.scaling, &data.t, &target, data.sites, None)?
                }
            };

            let g = trend.evaluate_all(&data.t);
            let detrended: Vec<f64> = data.y.iter().zip(&g).map(|(y, g)| y - g).collect();
            components = match mode {
                SeasonalityMode::Additive => seasonality.fit(&data.t_days, &detrended, None)?,
                SeasonalityMode::Multiplicative => {
                    seasonality.fit(&data.t_days, &detrended, Some(&g))?
                }
            };

            let updated = seasonal_total(&components, &data.t_days);
            let change = updated
                .iter()
                .zip(&seasonal)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            seasonal = updated;

            if change <= BACKFIT_TOL {
                tracing::debug!(rounds = round, "backfitting converged");
                return Ok((trend, components));
            }
            if round == MAX_BACKFIT_ROUNDS {
                warnings.push(FitWarning::BackfitNotConverged { rounds: round });
                return Ok((trend, components));
            }
        }

        // MAX_BACKFIT_ROUNDS is non-zero, so the loop always returns.
        Err(ForecastError::ComputationError(
            "backfitting performed no rounds".into(),
        ))
    }
}

/// Linear additive model: trend and Fourier terms in a single penalized
/// regression, hinges under L1 and Fourier coefficients under ridge.
fn fit_joint(
    trend_model: &TrendModel,
    seasonality: &SeasonalityModel,
    data: &FitData<'_>,
) -> Result<(TrendParams, Vec<SeasonalComponent>)> {
    let site_t: Vec<f64> = data.sites.iter().map(|(_, s)| *s).collect();
    let design = TrendDesign::new(&data.t, &site_t, None);
    let n_trend = design.free.len();

    let mut free = design.free;
    free.extend(seasonality.design(&data.t_days, None));
    let mut ridge = vec![0.0; n_trend];
    ridge.extend(seasonality.ridge_weights(data.y.len()));

    let fit = lasso_fit(
        &free,
        &ridge,
        &design.hinges,
        &data.y,
        &trend_model.lasso_config(),
    )?;
    if !fit.converged {
        tracing::debug!(iterations = fit.iterations, "joint lasso hit its sweep limit");
    }

    let trend = trend_model.params(fit.free[0], fit.free[1], data.sites, &fit.penalized, 0.0);
    let components = seasonality.components(&fit.free[n_trend..])?;
    Ok((trend, components))
}
