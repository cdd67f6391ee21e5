//! Builder turning raw, unordered observations into a clean [`TimeSeries`].

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveTime, Utc};
use std::collections::BTreeMap;

/// How observation timestamps are grouped before duplicates are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bucketing {
    /// Only identical timestamps are merged.
    #[default]
    Exact,
    /// Timestamps are truncated to midnight UTC, so same-day sales merge.
    Daily,
}

/// Collects raw `(timestamp, value)` rows and produces a [`TimeSeries`].
///
/// Rows with a missing or non-finite value are dropped, the remainder is
/// sorted by time and rows sharing a (bucketed) timestamp are aggregated by
/// their mean.
///
/// # Example
///
/// ```
/// use realty_forecast::core::{Bucketing, SeriesBuilder};
/// use chrono::{TimeZone, Utc};
///
/// let day = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
/// let series = SeriesBuilder::new()
///     .bucketing(Bucketing::Daily)
///     .push(day, Some(100.0))
///     .push(day + chrono::Duration::hours(3), Some(120.0))
///     .push(day + chrono::Duration::days(1), None)
///     .build()
///     .unwrap();
///
/// assert_eq!(series.len(), 1);
/// assert_eq!(series.values(), &[110.0]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SeriesBuilder {
    rows: Vec<(DateTime<Utc>, f64)>,
    bucketing: Bucketing,
    dropped: usize,
}

impl SeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how timestamps are bucketed before aggregation.
    pub fn bucketing(mut self, bucketing: Bucketing) -> Self {
        self.bucketing = bucketing;
        self
    }

    /// Add one observation. `None` and non-finite values are dropped.
    pub fn push(mut self, timestamp: DateTime<Utc>, value: Option<f64>) -> Self {
        self.add(timestamp, value);
        self
    }

    /// Add many observations.
    pub fn extend<I>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, Option<f64>)>,
    {
        for (timestamp, value) in rows {
            self.add(timestamp, value);
        }
        self
    }

    fn add(&mut self, timestamp: DateTime<Utc>, value: Option<f64>) {
        match value {
            Some(v) if v.is_finite() => self.rows.push((timestamp, v)),
            _ => self.dropped += 1,
        }
    }

    /// Number of rows dropped so far for missing or non-finite values.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Build the cleaned series.
    pub fn build(self) -> Result<TimeSeries> {
        if self.rows.is_empty() {
            return Err(ForecastError::EmptyData);
        }

        let mut groups: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
        for (timestamp, value) in &self.rows {
            let key = bucket(*timestamp, self.bucketing);
            let entry = groups.entry(key).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        let merged = self.rows.len() - groups.len();
        if self.dropped > 0 || merged > 0 {
            tracing::debug!(
                dropped = self.dropped,
                merged,
                observations = groups.len(),
                "cleaned raw observations"
            );
        }

        let (timestamps, values): (Vec<_>, Vec<_>) = groups
            .into_iter()
            .map(|(timestamp, (sum, count))| (timestamp, sum / count as f64))
            .unzip();

        TimeSeries::new(timestamps, values)
    }
}

fn bucket(timestamp: DateTime<Utc>, bucketing: Bucketing) -> DateTime<Utc> {
    match bucketing {
        Bucketing::Exact => timestamp,
        Bucketing::Daily => timestamp
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc(),
    }
}
