//! Trait and types for the market-expectations survey feed.

use anyhow::Result;
use chrono::NaiveDate;

/// One survey data point: the median expectation for a reference quarter,
/// as published on a given survey date (the vintage).
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyObservation {
    /// Date the survey snapshot was published.
    pub survey_date: NaiveDate,
    /// Quarter-start date the expectation refers to.
    pub reference: NaiveDate,
    /// Median expected value across respondents.
    pub median: f64,
}

/// Abstraction over a quarterly expectations feed (e.g. the central bank's
/// Focus survey).
#[async_trait::async_trait]
pub trait ExpectationsSource: Send + Sync {
    /// Returns all survey observations for an indicator with a survey date
    /// at or after `min_date`.
    async fn quarterly_medians(
        &self,
        indicator: &str,
        min_date: NaiveDate,
    ) -> Result<Vec<SurveyObservation>>;
}
