//! Transaction records and their conversion into price-per-m² series.

mod cache;

pub use cache::{CacheStats, DatasetCache};

use crate::core::{Bucketing, SeriesBuilder, TimeSeries};
use crate::error::Result;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One recorded sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub deal_date: NaiveDate,
    /// Total price of the unit.
    pub price: f64,
    /// Floor area in m².
    #[serde(default)]
    pub area: Option<f64>,
    /// Residential complex name.
    #[serde(default)]
    pub complex: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Transaction {
    /// Price per square meter; `None` without a positive area.
    pub fn price_per_sqm(&self) -> Option<f64> {
        match self.area {
            Some(area) if area > 0.0 && area.is_finite() => Some(self.price / area),
            _ => None,
        }
    }
}

/// Read a JSON array of transactions.
pub fn load_transactions(path: impl AsRef<Path>) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let transactions: Vec<Transaction> = serde_json::from_reader(reader)?;
    tracing::debug!(path = %path.display(), count = transactions.len(), "loaded transactions");
    Ok(transactions)
}

/// Daily mean price per m², optionally restricted to one complex.
///
/// Sales without a usable area are dropped; same-day sales are averaged.
pub fn price_series(transactions: &[Transaction], complex: Option<&str>) -> Result<TimeSeries> {
    let rows = transactions
        .iter()
        .filter(|tx| complex.map_or(true, |name| tx.complex.as_deref() == Some(name)))
        .map(|tx| {
            (
                tx.deal_date.and_time(NaiveTime::MIN).and_utc(),
                tx.price_per_sqm(),
            )
        });

    SeriesBuilder::new()
        .bucketing(Bucketing::Daily)
        .extend(rows)
        .build()
}

/// Number of sales per complex, most active first.
///
/// Transactions without a complex name are not counted.
pub fn count_by_complex(transactions: &[Transaction]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in transactions.iter().filter_map(|tx| tx.complex.as_deref()) {
        *counts.entry(name).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}
