//! TimeSeries data structure for an observed univariate price series.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds in a day, the time unit used for seasonal periods.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// An observed series of `(timestamp, value)` pairs.
///
/// Timestamps are strictly increasing and every value is finite; both are
/// checked on construction. A series is read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries", into = "RawSeries")]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct RawSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl TryFrom<RawSeries> for TimeSeries {
    type Error = ForecastError;

    fn try_from(raw: RawSeries) -> Result<Self> {
        TimeSeries::new(raw.timestamps, raw.values)
    }
}

impl From<TimeSeries> for RawSeries {
    fn from(series: TimeSeries) -> Self {
        RawSeries {
            timestamps: series.timestamps,
            values: series.values,
        }
    }
}

impl TimeSeries {
    /// Create a new series, validating ordering and values.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }

        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(ForecastError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }

        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::MissingValues);
        }

        Ok(Self { timestamps, values })
    }

    /// Get the number of observations.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Get timestamps.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Get observed values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// First observed timestamp.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    /// Last observed timestamp.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Time between the first and last observation.
    pub fn span(&self) -> Duration {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => end - start,
            _ => Duration::zero(),
        }
    }

    /// Span of the series in days.
    pub fn span_days(&self) -> f64 {
        self.span().num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
    }

    /// Whether every value is identical (zero variance).
    pub fn is_constant(&self) -> bool {
        match self.values.first() {
            Some(&first) => self.values.iter().all(|&v| v == first),
            None => true,
        }
    }

    /// Infer the sampling interval as the median spacing between consecutive timestamps.
    ///
    /// Irregular series (e.g. transaction dates) have no modal spacing, so the
    /// median is used rather than the most common difference.
    pub fn median_interval(&self) -> Result<Duration> {
        if self.len() < 2 {
            return Err(ForecastError::InsufficientData {
                needed: 2,
                got: self.len(),
            });
        }

        let mut diffs: Vec<i64> = self
            .timestamps
            .windows(2)
            .map(|w| (w[1] - w[0]).num_milliseconds())
            .collect();
        diffs.sort_unstable();

        let n = diffs.len();
        let median = if n % 2 == 0 {
            (diffs[n / 2 - 1] + diffs[n / 2]) / 2
        } else {
            diffs[n / 2]
        };

        if median <= 0 {
            return Err(ForecastError::TimestampError(
                "sampling interval is shorter than one millisecond".to_string(),
            ));
        }

        Ok(Duration::milliseconds(median))
    }

    /// Return the observations in `start..end` as a new series.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end || end > self.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.len(),
                got: end,
            });
        }
        Ok(TimeSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        })
    }

    /// Iterate over `(timestamp, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }
}

/// Days since the Unix epoch, with sub-day precision.
pub fn epoch_days(timestamp: &DateTime<Utc>) -> f64 {
    let seconds = timestamp.timestamp() as f64 + timestamp.timestamp_subsec_nanos() as f64 * 1e-9;
    seconds / SECONDS_PER_DAY
}
