//! Core data structures: observed series, series builder and forecast table.

mod builder;
mod forecast;
mod time_series;

pub use builder::{Bucketing, SeriesBuilder};
pub use forecast::{ComponentColumn, ForecastResult, ForecastRow};
pub use time_series::{epoch_days, TimeSeries, SECONDS_PER_DAY};
