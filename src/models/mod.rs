//! Decomposable forecasting model: trend, seasonality and uncertainty.

mod engine;
mod model;
mod options;
mod scaling;
mod warning;

pub mod seasonality;
pub mod trend;
pub mod uncertainty;

pub use engine::{ForecastEngine, MAX_BACKFIT_ROUNDS, N_MIN};
pub use model::{
    Model, PredictConfig, MAX_FORECAST_STEPS, MAX_SIMULATED_VALUES, MODEL_FORMAT_VERSION,
};
pub use options::{
    ForecastOptions, Growth, SeasonalityMode, SeasonalitySpec, MAX_UNCERTAINTY_SAMPLES,
};
pub use scaling::Scaling;
pub use seasonality::{SeasonalComponent, SeasonalityModel};
pub use trend::{Changepoint, TrendModel, TrendParams};
pub use uncertainty::CancellationToken;
pub use warning::{DisabledReason, FitWarning};
