//! Fourier-series seasonality.
//!
//! Each periodic component with period `P` days and order `K` is a truncated
//! Fourier series on absolute time `t` (days since the Unix epoch):
//!
//! ```text
//! s(t) = Σ_{k=1..K} a_k·sin(2πkt/P) + b_k·cos(2πkt/P)
//! ```
//!
//! Working on absolute days keeps the phase independent of where the history
//! starts, so the same calendar day always gets the same seasonal value.

use crate::error::{ForecastError, Result};
use crate::models::options::SeasonalitySpec;
use crate::models::warning::{DisabledReason, FitWarning};
use crate::utils::ols::ridge_fit;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Ridge weight per observation applied to Fourier coefficients.
pub const DEFAULT_SEASONALITY_RIDGE: f64 = 1e-3;

/// Fourier regressors for one period, column-major.
///
/// Columns alternate `sin`, `cos` for harmonics `1..=order`.
pub fn fourier_series(t_days: &[f64], period: f64, order: usize) -> Vec<Vec<f64>> {
    let mut columns = Vec::with_capacity(2 * order);
    for k in 1..=order {
        let w = 2.0 * PI * k as f64 / period;
        columns.push(t_days.iter().map(|&t| (w * t).sin()).collect());
        columns.push(t_days.iter().map(|&t| (w * t).cos()).collect());
    }
    columns
}

/// A fitted periodic component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalComponent {
    pub name: String,
    pub period: f64,
    pub fourier_order: usize,
    /// `[a_1, b_1, a_2, b_2, ...]`
    pub coefficients: Vec<f64>,
}

impl SeasonalComponent {
    pub fn evaluate(&self, t_day: f64) -> f64 {
        self.coefficients
            .chunks_exact(2)
            .enumerate()
            .map(|(i, ab)| {
                let w = 2.0 * PI * (i + 1) as f64 / self.period;
                ab[0] * (w * t_day).sin() + ab[1] * (w * t_day).cos()
            })
            .sum()
    }

    pub fn evaluate_all(&self, t_days: &[f64]) -> Vec<f64> {
        t_days.iter().map(|&t| self.evaluate(t)).collect()
    }
}

/// Sum of all components at each time.
pub fn seasonal_total(components: &[SeasonalComponent], t_days: &[f64]) -> Vec<f64> {
    let mut total = vec![0.0; t_days.len()];
    for component in components {
        for (acc, &t) in total.iter_mut().zip(t_days) {
            *acc += component.evaluate(t);
        }
    }
    total
}

/// The set of enabled seasonalities and their joint ridge regression.
#[derive(Debug, Clone)]
pub struct SeasonalityModel {
    specs: Vec<SeasonalitySpec>,
    ridge: f64,
}

impl SeasonalityModel {
    pub fn new(specs: Vec<SeasonalitySpec>) -> Self {
        Self {
            specs,
            ridge: DEFAULT_SEASONALITY_RIDGE,
        }
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    /// Keep the requested seasonalities the history can support.
    ///
    /// A component is disabled when the history spans less than one period
    /// or when the median spacing is at least half the period. Orders are
    /// lowered so the Fourier columns never exceed half the observations.
    pub fn resolve(
        requested: &[SeasonalitySpec],
        span_days: f64,
        interval_days: f64,
        n: usize,
    ) -> (Self, Vec<FitWarning>) {
        let mut warnings = Vec::new();
        let mut enabled = Vec::new();

        for spec in requested {
            let reason = if span_days < spec.period {
                Some(DisabledReason::SpanShorterThanPeriod)
            } else if interval_days >= spec.period / 2.0 {
                Some(DisabledReason::IntervalTooCoarse)
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    tracing::debug!(name = %spec.name, ?reason, "seasonality disabled");
                    warnings.push(FitWarning::SeasonalityDisabled {
                        name: spec.name.clone(),
                        reason,
                    });
                }
                None => enabled.push(spec.clone()),
            }
        }

        if !enabled.is_empty() {
            let column_budget = n.saturating_sub(2) / 2;
            let max_order = (column_budget / (2 * enabled.len())).max(1);
            for spec in &mut enabled {
                if spec.fourier_order > max_order {
                    warnings.push(FitWarning::FourierOrderReduced {
                        name: spec.name.clone(),
                        requested: spec.fourier_order,
                        used: max_order,
                    });
                    spec.fourier_order = max_order;
                }
            }
        }

        (Self::new(enabled), warnings)
    }

    pub fn specs(&self) -> &[SeasonalitySpec] {
        &self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Total number of Fourier columns.
    pub fn n_columns(&self) -> usize {
        self.specs.iter().map(|s| 2 * s.fourier_order).sum()
    }

    /// All Fourier columns, optionally multiplied row-wise by `row_scale`.
    pub fn design(&self, t_days: &[f64], row_scale: Option<&[f64]>) -> Vec<Vec<f64>> {
        let mut columns: Vec<Vec<f64>> = self
            .specs
            .iter()
            .flat_map(|spec| fourier_series(t_days, spec.period, spec.fourier_order))
            .collect();
        if let Some(scale) = row_scale {
            for col in &mut columns {
                for (v, w) in col.iter_mut().zip(scale) {
                    *v *= w;
                }
            }
        }
        columns
    }

    /// Ridge weight for each Fourier column given `n` observations.
    pub fn ridge_weights(&self, n: usize) -> Vec<f64> {
        vec![self.ridge * n as f64; self.n_columns()]
    }

    /// Split a stacked coefficient vector into named components.
    pub fn components(&self, coefficients: &[f64]) -> Result<Vec<SeasonalComponent>> {
        if coefficients.len() != self.n_columns() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.n_columns(),
                got: coefficients.len(),
            });
        }

        let mut offset = 0;
        Ok(self
            .specs
            .iter()
            .map(|spec| {
                let width = 2 * spec.fourier_order;
                let component = SeasonalComponent {
                    name: spec.name.clone(),
                    period: spec.period,
                    fourier_order: spec.fourier_order,
                    coefficients: coefficients[offset..offset + width].to_vec(),
                };
                offset += width;
                component
            })
            .collect())
    }

    /// Fit all components jointly to `target`.
    ///
    /// With `row_scale` the model is `target ≈ row_scale ⊙ (X·β)`, which is how
    /// multiplicative seasonality is regressed against `y − trend`.
    pub fn fit(
        &self,
        t_days: &[f64],
        target: &[f64],
        row_scale: Option<&[f64]>,
    ) -> Result<Vec<SeasonalComponent>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if t_days.len() != target.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: t_days.len(),
                got: target.len(),
            });
        }

        let design = self.design(t_days, row_scale);
        let beta = ridge_fit(&design, target, self.ridge * target.len() as f64)?;
        self.components(&beta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fourier_columns_alternate_sin_and_cos() {
        let t = [0.0, 1.75, 3.5];
        let cols = fourier_series(&t, 7.0, 2);
        assert_eq!(cols.len(), 4);
        assert_relative_eq!(cols[0][1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(cols[1][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(cols[3][2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn component_is_continuous_across_period_boundary() {
        let component = SeasonalComponent {
            name: "yearly".into(),
            period: 365.25,
            fourier_order: 3,
            coefficients: vec![0.3, -0.1, 0.05, 0.2, -0.07, 0.01],
        };
        for &t in &[19_000.0, 19_100.5, 19_364.9] {
            assert_relative_eq!(
                component.evaluate(t),
                component.evaluate(t + 365.25),
                epsilon = 1e-9
            );
        }
        let before = component.evaluate(19_000.0 + 365.25 - 1e-6);
        let after = component.evaluate(19_000.0 + 365.25 + 1e-6);
        assert!((before - after).abs() < 1e-5);
    }

    #[test]
    fn weekly_pattern_is_recovered() {
        let t: Vec<f64> = (0..140).map(|i| 19_000.0 + i as f64).collect();
        let truth = SeasonalComponent {
            name: "weekly".into(),
            period: 7.0,
            fourier_order: 2,
            coefficients: vec![0.4, -0.2, 0.1, 0.05],
        };
        let y = truth.evaluate_all(&t);

        let model = SeasonalityModel::new(vec![SeasonalitySpec::new("weekly", 7.0, 2)])
            .with_ridge(1e-8);
        let fitted = model.fit(&t, &y, None).unwrap();
        assert_eq!(fitted.len(), 1);
        for (a, b) in fitted[0].coefficients.iter().zip(&truth.coefficients) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn short_or_sparse_histories_disable_components() {
        let requested = [SeasonalitySpec::yearly(), SeasonalitySpec::weekly()];

        let (model, warnings) = SeasonalityModel::resolve(&requested, 120.0, 1.0, 120);
        assert_eq!(model.specs().len(), 1);
        assert_eq!(model.specs()[0].name, "weekly");
        assert_eq!(
            warnings,
            vec![FitWarning::SeasonalityDisabled {
                name: "yearly".into(),
                reason: DisabledReason::SpanShorterThanPeriod,
            }]
        );

        let (model, warnings) = SeasonalityModel::resolve(&requested, 1000.0, 30.0, 34);
        assert_eq!(model.specs().len(), 1);
        assert_eq!(model.specs()[0].name, "yearly");
        assert!(warnings.contains(&FitWarning::SeasonalityDisabled {
            name: "weekly".into(),
            reason: DisabledReason::IntervalTooCoarse,
        }));
        assert!(warnings.contains(&FitWarning::FourierOrderReduced {
            name: "yearly".into(),
            requested: 10,
            used: 8,
        }));
    }

    #[test]
    fn components_split_stacked_coefficients() {
        let model = SeasonalityModel::new(vec![
            SeasonalitySpec::new("a", 10.0, 1),
            SeasonalitySpec::new("b", 5.0, 2),
        ]);
        assert_eq!(model.n_columns(), 6);
        let parts = model
            .components(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        assert_eq!(parts[0].coefficients, vec![1.0, 2.0]);
        assert_eq!(parts[1].coefficients, vec![3.0, 4.0, 5.0, 6.0]);
        assert!(model.components(&[1.0]).is_err());
    }
}
