//! Regression-based forecasting: power transform, linear solvers, and the
//! autoregressive-with-exogenous-variables forecaster.

pub mod autoreg;
pub mod linear;
pub mod power;

pub use autoreg::{AutoregForecaster, IntervalOptions, PredictionInterval};
pub use linear::{BayesianRidge, FittedLinear, Regressor, Ridge};
pub use power::PowerTransform;
