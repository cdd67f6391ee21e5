//! # realty-forecast
//!
//! Price-per-square-meter forecasting for real-estate transaction data.
//!
//! Observed prices are modelled as a piecewise trend with sparse
//! changepoints plus Fourier-series seasonality. Forecast intervals come from
//! Monte Carlo simulation of future trend changes and observation noise.
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use realty_forecast::prelude::*;
//!
//! let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
//! let mut builder = SeriesBuilder::new().bucketing(Bucketing::Daily);
//! for day in 0..90 {
//!     let price = 180_000.0 + 150.0 * day as f64;
//!     builder = builder.push(start + Duration::days(day), Some(price));
//! }
//! let series = builder.build().unwrap();
//!
//! let model = ForecastEngine::new(ForecastOptions::default()).fit(&series).unwrap();
//! let forecast = model.predict(Duration::days(30), 7).unwrap();
//!
//! assert_eq!(forecast.horizon(), 30);
//! for row in forecast.rows() {
//!     assert!(row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper);
//! }
//! ```

#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod batch;
pub mod core;
pub mod error;
pub mod ingest;
pub mod models;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::batch::forecast_many;
    pub use crate::core::{Bucketing, ForecastResult, ForecastRow, SeriesBuilder, TimeSeries};
    pub use crate::error::{ForecastError, Result};
    pub use crate::ingest::{price_series, Transaction};
    pub use crate::models::{
        CancellationToken, ForecastEngine, ForecastOptions, Growth, Model, PredictConfig,
        SeasonalityMode, SeasonalitySpec,
    };
    pub use crate::utils::{calculate_metrics, AccuracyMetrics};
}
