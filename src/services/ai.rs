//! Trait for the generative-AI forecaster plus response parsing.

use anyhow::Result;
use chrono::NaiveDate;

use crate::error::ForecastError;

/// A text-completion service that receives a prompt and an attached CSV of
/// historical data and answers with a CSV-formatted forecast.
#[async_trait::async_trait]
pub trait AiForecaster: Send + Sync {
    /// Submits the prompt and attachment, returning the raw response text.
    async fn generate(&self, prompt: &str, csv_attachment: &str) -> Result<String>;
}

/// Parses the model's reply as a two-column CSV (date, value) with a header
/// row. Markdown code fences around the table are tolerated; anything else
/// fails the run, as the pipeline does no further validation.
pub fn parse_forecast_csv(text: &str) -> crate::error::Result<Vec<(NaiveDate, f64)>> {
    let body: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            ForecastError::InvalidParameter(format!("unreadable AI forecast row: {e}"))
        })?;
        if record.len() < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "AI forecast row has {} columns, expected 2",
                record.len()
            )));
        }
        let date = NaiveDate::parse_from_str(&record[0], "%Y-%m-%d").map_err(|e| {
            ForecastError::InvalidParameter(format!("bad date in AI forecast: {e}"))
        })?;
        let value: f64 = record[1].parse().map_err(|e| {
            ForecastError::InvalidParameter(format!("bad value in AI forecast: {e}"))
        })?;
        out.push((date, value));
    }
    Ok(out)
}
