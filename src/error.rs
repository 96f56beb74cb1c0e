//! Error types for the forecasting pipeline.

use thiserror::Error;

/// Result type alias for pipeline domain operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors raised by the data-shaping and modelling code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient observations for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Transformation code not among the six recognized values.
    #[error("invalid transformation code: {0:?}")]
    InvalidTransformCode(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between index and columns or between matrices.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Requested column does not exist.
    #[error("unknown column: {0:?}")]
    UnknownColumn(String),

    /// A model regressor still contains missing values at fit time.
    #[error("missing values in regressor {0:?}")]
    MissingValues(String),

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// No survey vintage covers the full forecast horizon.
    #[error("no survey vintage for {indicator:?} covers all {horizon} horizon quarters")]
    NoSurveyVintage { indicator: String, horizon: usize },

    /// Numerical failure (e.g. normal equations not positive definite).
    #[error("computation error: {0}")]
    ComputationError(String),
}
