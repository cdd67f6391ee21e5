//! Monte Carlo simulation of future trend paths and observation noise.
//!
//! Each draw extends the trend beyond the history with new changepoints
//! arriving as a Poisson process whose rate matches the historical
//! changepoint density. Their magnitudes are resampled from the fitted slope
//! changes with a random sign. Observation noise is Gaussian with the
//! residual scale of the fit. Bounds are empirical quantiles over draws.

use crate::error::{ForecastError, Result};
use crate::models::options::SeasonalityMode;
use crate::models::trend::TrendParams;
use crate::utils::stats::{quantile_sorted, sort_floats};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{Exp, Normal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Draws always completed before a cancellation request is honoured.
pub const MIN_DRAWS: usize = 20;

/// Cooperative cancellation flag shared with a running prediction.
///
/// ```
/// use realty_forecast::models::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Inputs for one simulation run, all in scaled units.
pub(crate) struct Simulation<'a> {
    pub trend: &'a TrendParams,
    /// Scaled time of future rows, strictly after the history.
    pub future_t: &'a [f64],
    /// Seasonal total of future rows.
    pub future_seasonal: &'a [f64],
    pub mode: SeasonalityMode,
    pub sigma: f64,
    pub samples: usize,
    pub interval_width: f64,
}

/// Per-row summaries of the simulated draws.
#[derive(Debug, Clone)]
pub(crate) struct SimulationSummary {
    /// Median simulated trend per future row.
    pub trend_median: Vec<f64>,
    /// Lower and upper quantiles per future row.
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Lower and upper quantiles of pure observation noise.
    pub noise_lower: f64,
    pub noise_upper: f64,
    pub draws: usize,
    pub cancelled: bool,
}

/// Combine trend and seasonal values per the seasonality mode.
pub(crate) fn combine(mode: SeasonalityMode, trend: f64, seasonal: f64) -> f64 {
    match mode {
        SeasonalityMode::Additive => trend + seasonal,
        SeasonalityMode::Multiplicative => trend * (1.0 + seasonal),
    }
}

impl Simulation<'_> {
    /// Run the simulation. Only one row of draws is kept in memory, plus the
    /// sampled changepoints of each path.
    pub fn run(&self, seed: u64, cancel: Option<&CancellationToken>) -> Result<SimulationSummary> {
        let rows = self.future_t.len();
        let mut rng = StdRng::seed_from_u64(seed);

        let noise = if self.sigma > 0.0 {
            Some(Normal::new(0.0, self.sigma).map_err(|e| {
                ForecastError::ComputationError(format!("noise distribution: {e}"))
            })?)
        } else {
            None
        };

        let magnitudes: Vec<f64> = self
            .trend
            .changepoints
            .iter()
            .map(|cp| cp.delta.abs())
            .collect();
        let has_breaks = magnitudes.iter().any(|&d| d > 0.0);
        // Changepoint density per unit of scaled time over the history.
        let rate = self.trend.changepoints.len() as f64;
        let start = 1.0;
        let end = self.future_t.last().copied().unwrap_or(start);
        let gaps = if has_breaks && rate > 0.0 && end > start {
            Some(Exp::new(rate).map_err(|e| {
                ForecastError::ComputationError(format!("changepoint arrivals: {e}"))
            })?)
        } else {
            None
        };

        // Draw the future changepoints of every path first. Paths are then
        // evaluated row by row, so only one row of draws is held at a time.
        let mut paths: Vec<Vec<(f64, f64)>> = Vec::with_capacity(self.samples);
        let mut noise_draws = Vec::with_capacity(self.samples);
        let mut cancelled = false;
        for draw in 0..self.samples {
            if draw >= MIN_DRAWS && cancel.is_some_and(CancellationToken::is_cancelled) {
                cancelled = true;
                break;
            }
            paths.push(match &gaps {
                Some(gaps) => sample_breaks(&mut rng, gaps, start, end, &magnitudes),
                None => Vec::new(),
            });
            noise_draws.push(noise.as_ref().map_or(0.0, |d| rng.sample(d)));
        }

        let draws = paths.len();
        let lo = (1.0 - self.interval_width) / 2.0;
        let hi = (1.0 + self.interval_width) / 2.0;

        let mut trend_median = Vec::with_capacity(rows);
        let mut lower = Vec::with_capacity(rows);
        let mut upper = Vec::with_capacity(rows);
        let mut trends = Vec::with_capacity(draws);
        let mut values = Vec::with_capacity(draws);
        // Per path: breaks passed so far, their summed deltas and Σ δ·s.
        let mut passed = vec![(0_usize, 0.0_f64, 0.0_f64); draws];
        for (&t, &seasonal) in self.future_t.iter().zip(self.future_seasonal) {
            let base = self.trend.predictor(t);
            trends.clear();
            values.clear();
            for (breaks, (next, slope, offset)) in paths.iter().zip(passed.iter_mut()) {
                while let Some(&(s, delta)) = breaks.get(*next).filter(|(s, _)| *s < t) {
                    *slope += delta;
                    *offset += delta * s;
                    *next += 1;
                }
                let g = self.trend.link(base + *slope * t - *offset);
                let eps = noise.as_ref().map_or(0.0, |d| rng.sample(d));
                trends.push(g);
                values.push(combine(self.mode, g, seasonal) + eps);
            }
            sort_floats(&mut trends);
            sort_floats(&mut values);
            trend_median.push(quantile_sorted(&trends, 0.5));
            lower.push(quantile_sorted(&values, lo));
            upper.push(quantile_sorted(&values, hi));
        }
        sort_floats(&mut noise_draws);

        if cancelled {
            tracing::debug!(draws, requested = self.samples, "simulation cancelled");
        }

        Ok(SimulationSummary {
            trend_median,
            lower,
            upper,
            noise_lower: quantile_sorted(&noise_draws, lo),
            noise_upper: quantile_sorted(&noise_draws, hi),
            draws,
            cancelled,
        })
    }
}

/// New changepoints in `(start, end)` from a Poisson process with
/// exponential inter-arrival `gaps`; magnitudes are resampled with a random sign.
fn sample_breaks(
    rng: &mut StdRng,
    gaps: &Exp,
    start: f64,
    end: f64,
    magnitudes: &[f64],
) -> Vec<(f64, f64)> {
    let mut breaks = Vec::new();
    let mut at = start;
    loop {
        at += rng.sample(gaps);
        if at >= end {
            break;
        }
        let magnitude = magnitudes[rng.gen_range(0..magnitudes.len())];
        let delta = if rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude
        };
        breaks.push((at, delta));
    }
    breaks
}
