//! Forecast configuration: the complete tuning surface of the engine.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shape of the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Growth {
    /// Piecewise-linear trend.
    #[default]
    Linear,
    /// Piecewise-logistic trend saturating at `cap`.
    Logistic,
}

/// How seasonal terms combine with the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    /// `y = trend + seasonal`
    #[default]
    Additive,
    /// `y = trend * (1 + seasonal)`
    Multiplicative,
}

/// A requested periodic component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalitySpec {
    /// Name used for the component column in results.
    pub name: String,
    /// Period length in days.
    pub period: f64,
    /// Number of Fourier harmonics.
    pub fourier_order: usize,
}

impl SeasonalitySpec {
    pub fn new(name: impl Into<String>, period: f64, fourier_order: usize) -> Self {
        Self {
            name: name.into(),
            period,
            fourier_order,
        }
    }

    /// Yearly seasonality: 365.25 days, order 10.
    pub fn yearly() -> Self {
        Self::new("yearly", 365.25, 10)
    }

    /// Weekly seasonality: 7 days, order 3.
    pub fn weekly() -> Self {
        Self::new("weekly", 7.0, 3)
    }
}

/// Options accepted by [`ForecastEngine`](crate::models::ForecastEngine).
///
/// # Example
///
/// ```
/// use realty_forecast::models::{ForecastOptions, Growth, SeasonalityMode};
///
/// let options = ForecastOptions::default()
///     .with_growth(Growth::Logistic)
///     .with_cap(250_000.0)
///     .with_seasonality_mode(SeasonalityMode::Multiplicative)
///     .with_changepoint_count(10);
/// assert!(options.validate().is_ok());
///
/// let broken = ForecastOptions::default().with_growth(Growth::Logistic);
/// assert!(broken.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastOptions {
    pub growth: Growth,
    /// Saturation level for logistic growth.
    pub cap: Option<f64>,
    /// Lower saturation level for logistic growth (defaults to 0).
    pub floor: Option<f64>,
    pub seasonality_mode: SeasonalityMode,
    /// Number of automatically placed changepoints.
    pub changepoint_count: usize,
    /// Fraction of the history in which changepoints may be placed.
    pub changepoint_range: f64,
    /// Explicit changepoint timestamps, overriding automatic placement.
    pub changepoints: Option<Vec<DateTime<Utc>>>,
    /// L1 penalty on changepoint slope deltas; larger values give fewer trend breaks.
    pub changepoint_penalty: f64,
    pub seasonalities: Vec<SeasonalitySpec>,
    /// Probability mass inside `[yhat_lower, yhat_upper]`.
    pub interval_width: f64,
    /// Number of Monte Carlo draws used for intervals.
    pub uncertainty_samples: usize,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            growth: Growth::Linear,
            cap: None,
            floor: None,
            seasonality_mode: SeasonalityMode::Additive,
            changepoint_count: 25,
            changepoint_range: 0.8,
            changepoints: None,
            changepoint_penalty: 1e-3,
            seasonalities: vec![SeasonalitySpec::yearly(), SeasonalitySpec::weekly()],
            interval_width: 0.95,
            uncertainty_samples: 1000,
        }
    }
}

/// Upper bound on `uncertainty_samples`.
pub const MAX_UNCERTAINTY_SAMPLES: usize = 100_000;

impl ForecastOptions {
    pub fn with_growth(mut self, growth: Growth) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_cap(mut self, cap: f64) -> Self {
        self.cap = Some(cap);
        self
    }

    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = Some(floor);
        self
    }

    pub fn with_seasonality_mode(mut self, mode: SeasonalityMode) -> Self {
        self.seasonality_mode = mode;
        self
    }

    pub fn with_changepoint_count(mut self, count: usize) -> Self {
        self.changepoint_count = count;
        self
    }

    pub fn with_changepoint_range(mut self, range: f64) -> Self {
        self.changepoint_range = range;
        self
    }

    pub fn with_changepoints(mut self, changepoints: Vec<DateTime<Utc>>) -> Self {
        self.changepoints = Some(changepoints);
        self
    }

    pub fn with_changepoint_penalty(mut self, penalty: f64) -> Self {
        self.changepoint_penalty = penalty;
        self
    }

    /// Replace the requested seasonalities.
    pub fn with_seasonalities(mut self, seasonalities: Vec<SeasonalitySpec>) -> Self {
        self.seasonalities = seasonalities;
        self
    }

    /// Add one seasonality to the requested set.
    pub fn add_seasonality(mut self, spec: SeasonalitySpec) -> Self {
        self.seasonalities.push(spec);
        self
    }

    /// Drop all seasonal components.
    pub fn without_seasonality(mut self) -> Self {
        self.seasonalities.clear();
        self
    }

    pub fn with_interval_width(mut self, width: f64) -> Self {
        self.interval_width = width;
        self
    }

    pub fn with_uncertainty_samples(mut self, samples: usize) -> Self {
        self.uncertainty_samples = samples;
        self
    }

    /// Floor actually applied by the engine.
    pub fn effective_floor(&self) -> f64 {
        match self.growth {
            Growth::Linear => 0.0,
            Growth::Logistic => self.floor.unwrap_or(0.0),
        }
    }

    /// Check the options for contradictions that do not depend on data.
    pub fn validate(&self) -> Result<()> {
        match self.growth {
            Growth::Linear => {
                if self.cap.is_some() || self.floor.is_some() {
                    return Err(invalid("cap and floor only apply to logistic growth"));
                }
            }
            Growth::Logistic => {
                let cap = self
                    .cap
                    .ok_or_else(|| invalid("logistic growth requires a cap"))?;
                let floor = self.floor.unwrap_or(0.0);
                if !cap.is_finite() || !floor.is_finite() {
                    return Err(invalid("cap and floor must be finite"));
                }
                if cap <= floor {
                    return Err(invalid(format!(
                        "cap ({cap}) must be greater than floor ({floor})"
                    )));
                }
            }
        }

        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(invalid(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.changepoint_range
            )));
        }

        if !(self.changepoint_penalty >= 0.0 && self.changepoint_penalty.is_finite()) {
            return Err(invalid(format!(
                "changepoint_penalty must be a non-negative number, got {}",
                self.changepoint_penalty
            )));
        }

        if let Some(changepoints) = &self.changepoints {
            if changepoints.windows(2).any(|w| w[1] <= w[0]) {
                return Err(invalid("explicit changepoints must be strictly increasing"));
            }
        }

        for (i, spec) in self.seasonalities.iter().enumerate() {
            if !(spec.period > 0.0 && spec.period.is_finite()) {
                return Err(invalid(format!(
                    "seasonality '{}' has a non-positive period",
                    spec.name
                )));
            }
            if spec.fourier_order == 0 {
                return Err(invalid(format!(
                    "seasonality '{}' needs a fourier order of at least 1",
                    spec.name
                )));
            }
            if self.seasonalities[..i].iter().any(|s| s.name == spec.name) {
                return Err(invalid(format!(
                    "seasonality '{}' is listed twice",
                    spec.name
                )));
            }
        }

        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(invalid(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            )));
        }

        if self.uncertainty_samples == 0 || self.uncertainty_samples > MAX_UNCERTAINTY_SAMPLES {
            return Err(invalid(format!(
                "uncertainty_samples must be in 1..={MAX_UNCERTAINTY_SAMPLES}, got {}",
                self.uncertainty_samples
            )));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ForecastError {
    ForecastError::InvalidOptions(message.into())
}
