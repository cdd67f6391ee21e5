//! Error types for the realty-forecast library.

use thiserror::Error;

/// Result type alias for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while building series, fitting or predicting.
///
/// Every variant is a local, recoverable condition. Callers are expected to
/// report the message and skip rendering rather than fall back to some
/// degenerate forecast.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Series too short to fit reliably.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// All observed values are identical, so trend and seasonality are unidentifiable.
    #[error("degenerate series: all values are identical")]
    DegenerateSeries,

    /// Requested horizon is non-positive, shorter than one sampling step or absurdly large.
    #[error("invalid horizon: {0}")]
    InvalidHorizon(String),

    /// Contradictory or out-of-range configuration.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Missing values detected when not allowed.
    #[error("missing values detected in data")]
    MissingValues,

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),

    /// A model record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A model record was written by an incompatible format version.
    #[error("incompatible model record: format version {found}, expected {expected}")]
    IncompatibleModel { found: u32, expected: u32 },

    /// Reading a dataset failed.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::Io(err.to_string())
    }
}
