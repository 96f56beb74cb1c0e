//! Narrow client capabilities the pipeline depends on.
//!
//! Each external collaborator (metadata sheet, expectations feed, generative
//! AI endpoint) is behind its own trait so tests can substitute fakes.

pub mod ai;
pub mod expectations;
pub mod metadata;

pub use ai::AiForecaster;
pub use expectations::{ExpectationsSource, SurveyObservation};
pub use metadata::MetadataSource;
