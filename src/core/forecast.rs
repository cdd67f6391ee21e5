//! Forecast result table consumed by plotting code.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of a forecast table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub timestamp: DateTime<Utc>,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// A named additive or multiplicative contribution evaluated on every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Forecast over the historical range followed by the requested horizon.
///
/// Columns are stored side by side; `history_len` marks the first future
/// row. Every row satisfies `yhat_lower <= yhat <= yhat_upper`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    timestamps: Vec<DateTime<Utc>>,
    yhat: Vec<f64>,
    yhat_lower: Vec<f64>,
    yhat_upper: Vec<f64>,
    trend: Vec<f64>,
    components: Vec<ComponentColumn>,
    history_len: usize,
    simulation_draws: usize,
    cancelled: bool,
}

impl ForecastResult {
    /// Assemble a result, checking that all columns line up.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        timestamps: Vec<DateTime<Utc>>,
        yhat: Vec<f64>,
        yhat_lower: Vec<f64>,
        yhat_upper: Vec<f64>,
        trend: Vec<f64>,
        components: Vec<ComponentColumn>,
        history_len: usize,
        simulation_draws: usize,
        cancelled: bool,
    ) -> Result<Self> {
        let n = timestamps.len();
        let lengths = [yhat.len(), yhat_lower.len(), yhat_upper.len(), trend.len()];
        if let Some(&bad) = lengths.iter().find(|&&len| len != n) {
            return Err(ForecastError::DimensionMismatch {
                expected: n,
                got: bad,
            });
        }
        if let Some(column) = components.iter().find(|c| c.values.len() != n) {
            return Err(ForecastError::DimensionMismatch {
                expected: n,
                got: column.values.len(),
            });
        }
        if history_len > n {
            return Err(ForecastError::DimensionMismatch {
                expected: n,
                got: history_len,
            });
        }

        Ok(Self {
            timestamps,
            yhat,
            yhat_lower,
            yhat_upper,
            trend,
            components,
            history_len,
            simulation_draws,
            cancelled,
        })
    }

    /// Total number of rows (history plus horizon).
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of rows covering the observed history.
    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Number of rows beyond the last observation.
    pub fn horizon(&self) -> usize {
        self.len() - self.history_len
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn yhat(&self) -> &[f64] {
        &self.yhat
    }

    pub fn yhat_lower(&self) -> &[f64] {
        &self.yhat_lower
    }

    pub fn yhat_upper(&self) -> &[f64] {
        &self.yhat_upper
    }

    /// Deterministic trend on every row.
    pub fn trend(&self) -> &[f64] {
        &self.trend
    }

    /// Seasonal contributions, one column per fitted seasonality.
    pub fn components(&self) -> &[ComponentColumn] {
        &self.components
    }

    /// Look up a seasonal component column by name.
    pub fn component(&self, name: &str) -> Option<&[f64]> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Number of Monte Carlo draws behind the interval bounds.
    pub fn simulation_draws(&self) -> usize {
        self.simulation_draws
    }

    /// True when the simulation was stopped early by a cancellation token.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Interval width `yhat_upper - yhat_lower` per row.
    pub fn widths(&self) -> Vec<f64> {
        self.yhat_upper
            .iter()
            .zip(&self.yhat_lower)
            .map(|(u, l)| u - l)
            .collect()
    }

    /// Row at `index`.
    pub fn row(&self, index: usize) -> Result<ForecastRow> {
        if index >= self.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.len(),
                got: index,
            });
        }
        Ok(ForecastRow {
            timestamp: self.timestamps[index],
            yhat: self.yhat[index],
            yhat_lower: self.yhat_lower[index],
            yhat_upper: self.yhat_upper[index],
        })
    }

    /// Iterate over all rows in time order.
    pub fn rows(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        (0..self.len()).map(move |i| ForecastRow {
            timestamp: self.timestamps[i],
            yhat: self.yhat[i],
            yhat_lower: self.yhat_lower[i],
            yhat_upper: self.yhat_upper[i],
        })
    }

    /// Rows beyond the observed history.
    pub fn future_rows(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        self.rows().skip(self.history_len)
    }

    /// Flat table of rows, ready for a plotting layer.
    pub fn to_rows(&self) -> Vec<ForecastRow> {
        self.rows().collect()
    }
}
