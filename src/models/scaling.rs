//! Mapping between raw observations and the unit-scaled fitting space.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time and value scaling fixed at fit time.
///
/// Time maps the history onto `[0, 1]`; values map to `(y - floor) / y_scale`
/// where `y_scale = max |y - floor|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub t0: DateTime<Utc>,
    pub span_seconds: f64,
    pub floor: f64,
    pub y_scale: f64,
}

impl Scaling {
    pub fn from_series(series: &TimeSeries, floor: f64) -> Result<Self> {
        let t0 = series.start().ok_or(ForecastError::EmptyData)?;
        let span_seconds = series.span().num_milliseconds() as f64 / 1000.0;
        if span_seconds <= 0.0 {
            return Err(ForecastError::TimestampError(
                "history must cover a positive time span".into(),
            ));
        }

        let y_scale = series
            .values()
            .iter()
            .map(|y| (y - floor).abs())
            .fold(0.0, f64::max);
        if y_scale <= 0.0 || !y_scale.is_finite() {
            return Err(ForecastError::DegenerateSeries);
        }

        Ok(Self {
            t0,
            span_seconds,
            floor,
            y_scale,
        })
    }

    /// Scaled time of a timestamp; the history covers `[0, 1]`.
    pub fn time(&self, ts: &DateTime<Utc>) -> f64 {
        (*ts - self.t0).num_milliseconds() as f64 / 1000.0 / self.span_seconds
    }

    pub fn times(&self, timestamps: &[DateTime<Utc>]) -> Vec<f64> {
        timestamps.iter().map(|ts| self.time(ts)).collect()
    }

    pub fn value(&self, y: f64) -> f64 {
        (y - self.floor) / self.y_scale
    }

    pub fn unscale(&self, scaled: f64) -> f64 {
        scaled * self.y_scale + self.floor
    }

    /// Convert a scaled difference back to original units (no floor offset).
    pub fn unscale_delta(&self, delta: f64) -> f64 {
        delta * self.y_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series() -> TimeSeries {
        let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let ts = (0..5).map(|i| base + Duration::days(i * 10)).collect();
        TimeSeries::new(ts, vec![100.0, 120.0, 90.0, 200.0, 150.0]).unwrap()
    }

    #[test]
    fn scaling_maps_history_to_unit_interval() {
        let series = series();
        let scaling = Scaling::from_series(&series, 0.0).unwrap();

        let t = scaling.times(series.timestamps());
        assert_eq!(t[0], 0.0);
        assert_eq!(t[4], 1.0);
        assert!((t[2] - 0.5).abs() < 1e-12);

        assert_eq!(scaling.y_scale, 200.0);
        assert_eq!(scaling.value(200.0), 1.0);
        assert_eq!(scaling.unscale(scaling.value(150.0)), 150.0);
    }

    #[test]
    fn floor_shifts_values() {
        let scaling = Scaling::from_series(&series(), 50.0).unwrap();
        assert_eq!(scaling.y_scale, 150.0);
        assert_eq!(scaling.value(50.0), 0.0);
        assert_eq!(scaling.unscale_delta(0.5), 75.0);
    }

    #[test]
    fn single_instant_history_is_rejected() {
        let ts = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let series = TimeSeries::new(vec![ts], vec![1.0]).unwrap();
        assert!(matches!(
            Scaling::from_series(&series, 0.0),
            Err(ForecastError::TimestampError(_))
        ));
    }
}
