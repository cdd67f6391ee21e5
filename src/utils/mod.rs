//! Numerical helpers, accuracy metrics and cross-validation.

pub mod cross_validation;
pub mod metrics;
pub mod ols;
pub mod stats;

pub use cross_validation::{cross_validate, CVConfig, CVResults, CVStrategy};
pub use metrics::{calculate_metrics, interval_coverage, AccuracyMetrics};
pub use ols::{lasso_fit, ridge_fit, LassoConfig, LassoResult};
