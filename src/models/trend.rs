//! Piecewise trend with sparse changepoints.
//!
//! The trend is driven by a linear predictor over scaled time
//!
//! ```text
//! h(t) = m + k·t + Σ_j δ_j·(t − s_j)₊
//! ```
//!
//! where `s_j` are changepoint locations and `δ_j` the slope change at each.
//! Linear growth uses `g(t) = h(t)`; logistic growth uses
//! `g(t) = cap / (1 + exp(−h(t)))`. Slope changes carry an L1 penalty, so
//! most of them are exactly zero after fitting.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::options::{ForecastOptions, Growth};
use crate::models::scaling::Scaling;
use crate::models::warning::FitWarning;
use crate::utils::ols::{lasso_fit, LassoConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logistic targets are kept this fraction of the cap away from 0 and cap.
const LOGIT_MARGIN: f64 = 1e-4;

/// A potential trend break and its fitted slope change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Changepoint {
    pub timestamp: DateTime<Utc>,
    /// Location in scaled time.
    pub t: f64,
    /// Slope change in scaled units; zero when the penalty removed it.
    pub delta: f64,
}

/// Fitted trend parameters in scaled space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    pub growth: Growth,
    /// Base growth rate.
    pub k: f64,
    /// Offset.
    pub m: f64,
    pub changepoints: Vec<Changepoint>,
    /// Scaled capacity; only meaningful for logistic growth.
    pub cap: f64,
}

impl TrendParams {
    /// Linear predictor `h(t)`.
    pub fn predictor(&self, t: f64) -> f64 {
        let breaks: f64 = self
            .changepoints
            .iter()
            .filter(|cp| t > cp.t)
            .map(|cp| cp.delta * (t - cp.t))
            .sum();
        self.m + self.k * t + breaks
    }

    /// Map a predictor value onto the trend scale.
    pub fn link(&self, h: f64) -> f64 {
        match self.growth {
            Growth::Linear => h,
            Growth::Logistic => self.cap / (1.0 + (-h).exp()),
        }
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        self.link(self.predictor(t))
    }

    pub fn evaluate_all(&self, t: &[f64]) -> Vec<f64> {
        t.iter().map(|&ti| self.evaluate(ti)).collect()
    }

    /// Slope of the predictor just after `t`.
    pub fn rate_at(&self, t: f64) -> f64 {
        self.k
            + self
                .changepoints
                .iter()
                .filter(|cp| cp.t <= t)
                .map(|cp| cp.delta)
                .sum::<f64>()
    }

    /// Changepoints that survived the penalty.
    pub fn active_changepoints(&self) -> impl Iterator<Item = &Changepoint> {
        self.changepoints.iter().filter(|cp| cp.delta != 0.0)
    }
}

/// Row indices of automatically placed changepoints.
///
/// Candidates are spread evenly over the first `range` fraction of rows,
/// skipping the first row. Fewer than `count` indices are returned when the
/// history is too short.
pub fn place_changepoints(n: usize, count: usize, range: f64) -> Vec<usize> {
    let hist_size = ((n as f64) * range).floor() as usize;
    let count = count.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=count)
        .map(|j| (j as f64 * last / count as f64).round() as usize)
        .collect()
}

/// Column-major regressors for the trend: `[1, t]` plus one hinge per changepoint.
#[derive(Debug, Clone)]
pub struct TrendDesign {
    pub free: Vec<Vec<f64>>,
    pub hinges: Vec<Vec<f64>>,
}

impl TrendDesign {
    /// Build the design, optionally multiplying every row by `row_scale`.
    pub fn new(t: &[f64], sites: &[f64], row_scale: Option<&[f64]>) -> Self {
        let weight = |i: usize| row_scale.map_or(1.0, |w| w[i]);

        let intercept = (0..t.len()).map(weight).collect();
        let slope = t.iter().enumerate().map(|(i, &ti)| weight(i) * ti).collect();
        let hinges = sites
            .iter()
            .map(|&s| {
                t.iter()
                    .enumerate()
                    .map(|(i, &ti)| weight(i) * (ti - s).max(0.0))
                    .collect()
            })
            .collect();

        Self {
            free: vec![intercept, slope],
            hinges,
        }
    }
}

/// Result of fitting a trend directly to a series.
#[derive(Debug, Clone)]
pub struct TrendFit {
    pub params: TrendParams,
    pub scaling: Scaling,
    pub warnings: Vec<FitWarning>,
}

/// Trend configuration and fitting.
#[derive(Debug, Clone)]
pub struct TrendModel {
    growth: Growth,
    changepoint_count: usize,
    changepoint_range: f64,
    explicit: Option<Vec<DateTime<Utc>>>,
    penalty: f64,
    cap: Option<f64>,
    floor: f64,
}

impl TrendModel {
    pub fn new(growth: Growth) -> Self {
        Self {
            growth,
            changepoint_count: 25,
            changepoint_range: 0.8,
            explicit: None,
            penalty: 1e-3,
            cap: None,
            floor: 0.0,
        }
    }

    pub fn from_options(options: &ForecastOptions) -> Self {
        Self {
            growth: options.growth,
            changepoint_count: options.changepoint_count,
            changepoint_range: options.changepoint_range,
            explicit: options.changepoints.clone(),
            penalty: options.changepoint_penalty,
            cap: options.cap,
            floor: options.effective_floor(),
        }
    }

    pub fn with_changepoints(mut self, count: usize, range: f64) -> Self {
        self.changepoint_count = count;
        self.changepoint_range = range;
        self
    }

    pub fn with_explicit_changepoints(mut self, changepoints: Vec<DateTime<Utc>>) -> Self {
        self.explicit = Some(changepoints);
        self
    }

    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_cap(mut self, cap: f64) -> Self {
        self.cap = Some(cap);
        self
    }

    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    pub fn growth(&self) -> Growth {
        self.growth
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Capacity in scaled units. Returns 0 for linear growth.
    pub fn scaled_cap(&self, scaling: &Scaling) -> Result<f64> {
        match self.growth {
            Growth::Linear => Ok(0.0),
            Growth::Logistic => {
                let cap = self.cap.ok_or_else(|| {
                    ForecastError::InvalidOptions("logistic growth requires a cap".into())
                })?;
                Ok(scaling.value(cap))
            }
        }
    }

    pub fn lasso_config(&self) -> LassoConfig {
        LassoConfig {
            l1: self.penalty,
            ..LassoConfig::default()
        }
    }

    /// Resolve changepoint locations for a history.
    pub fn changepoint_sites(
        &self,
        timestamps: &[DateTime<Utc>],
        scaling: &Scaling,
    ) -> Result<(Vec<(DateTime<Utc>, f64)>, Option<FitWarning>)> {
        if let Some(explicit) = &self.explicit {
            let sites = explicit
                .iter()
                .map(|ts| {
                    let t = scaling.time(ts);
                    if t > 0.0 && t < 1.0 {
                        Ok((*ts, t))
                    } else {
                        Err(ForecastError::InvalidOptions(format!(
                            "changepoint {ts} lies outside the observed history"
                        )))
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok((sites, None));
        }

        let indices = place_changepoints(
            timestamps.len(),
            self.changepoint_count,
            self.changepoint_range,
        );
        let warning = (indices.len() < self.changepoint_count).then(|| {
            FitWarning::ChangepointsReduced {
                requested: self.changepoint_count,
                used: indices.len(),
            }
        });
        let sites = indices
            .into_iter()
            .map(|i| (timestamps[i], scaling.time(&timestamps[i])))
            .collect();
        Ok((sites, warning))
    }

    /// Regression target for the trend: `y` itself for linear growth, the
    /// clamped logit of `y / cap` for logistic growth.
    pub fn target(&self, y: &[f64], cap: f64) -> Vec<f64> {
        match self.growth {
            Growth::Linear => y.to_vec(),
            Growth::Logistic => {
                let margin = cap * LOGIT_MARGIN;
                y.iter()
                    .map(|&v| {
                        let z = v.clamp(margin, cap - margin);
                        (z / (cap - z)).ln()
                    })
                    .collect()
            }
        }
    }

    /// Fit trend parameters to scaled observations.
    ///
    /// `row_scale` multiplies every regressor row and applies to linear growth
    /// only; logistic targets must already be divided by any seasonal factor.
    pub fn fit(
        &self,
        scaling: &Scaling,
        t: &[f64],
        y: &[f64],
        sites: &[(DateTime<Utc>, f64)],
        row_scale: Option<&[f64]>,
    ) -> Result<TrendParams> {
        if t.len() != y.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: t.len(),
                got: y.len(),
            });
        }
        let cap = self.scaled_cap(scaling)?;
        let target = self.target(y, cap);
        let row_scale = match self.growth {
            Growth::Linear => row_scale,
            Growth::Logistic => None,
        };

        let site_t: Vec<f64> = sites.iter().map(|(_, s)| *s).collect();
        let design = TrendDesign::new(t, &site_t, row_scale);
        let fit = lasso_fit(
            &design.free,
            &[],
            &design.hinges,
            &target,
            &self.lasso_config(),
        )?;
        if !fit.converged {
            tracing::debug!(iterations = fit.iterations, "trend lasso hit its sweep limit");
        }

        Ok(self.params(fit.free[0], fit.free[1], sites, &fit.penalized, cap))
    }

    /// Assemble parameters from solved coefficients.
    pub fn params(
        &self,
        m: f64,
        k: f64,
        sites: &[(DateTime<Utc>, f64)],
        deltas: &[f64],
        cap: f64,
    ) -> TrendParams {
        TrendParams {
            growth: self.growth,
            k,
            m,
            changepoints: sites
                .iter()
                .zip(deltas)
                .map(|(&(timestamp, t), &delta)| Changepoint {
                    timestamp,
                    t,
                    delta,
                })
                .collect(),
            cap,
        }
    }

    /// Fit the trend alone to a raw series.
    pub fn fit_series(&self, series: &TimeSeries) -> Result<TrendFit> {
        let scaling = Scaling::from_series(series, self.floor)?;
        let t = scaling.times(series.timestamps());
        let y: Vec<f64> = series.values().iter().map(|&v| scaling.value(v)).collect();
        let (sites, warning) = self.changepoint_sites(series.timestamps(), &scaling)?;
        let params = self.fit(&scaling, &t, &y, &sites, None)?;

        Ok(TrendFit {
            params,
            scaling,
            warnings: warning.into_iter().collect(),
        })
    }
}
