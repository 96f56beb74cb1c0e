//! Client for the central bank's Olinda expectations API (Focus survey).
//!
//! The quarterly expectations endpoint returns CSV with decimal-comma
//! numbers and reference periods encoded as "quarter/year" (e.g. "1/2025").

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::services::{ExpectationsSource, SurveyObservation};

const DEFAULT_BASE_URL: &str =
    "https://olinda.bcb.gov.br/olinda/servico/Expectativas/versao/v1/odata";

pub struct FocusClient {
    base_url: String,
}

impl FocusClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self { base_url }
    }
}

impl Default for FocusClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExpectationsSource for FocusClient {
    async fn quarterly_medians(
        &self,
        indicator: &str,
        min_date: NaiveDate,
    ) -> Result<Vec<SurveyObservation>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let url = format!("{}/ExpectativasMercadoTrimestrais", self.base_url);
        let filter = format!(
            "Indicador eq '{}' and baseCalculo eq 0 and Data ge '{}'",
            indicator,
            min_date.format("%Y-%m-%d")
        );

        let response = client
            .get(&url)
            .query(&[("$filter", filter.as_str()), ("$format", "text/csv")])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch expectations feed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Expectations API returned status {}: {}",
                status,
                body
            ));
        }

        let body = response.text().await?;
        parse_expectations_csv(&body)
    }
}

fn parse_expectations_csv(body: &str) -> Result<Vec<SurveyObservation>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow::anyhow!("expectations CSV has no {:?} column", name))
    };
    let date_idx = position("Data")?;
    let reference_idx = position("DataReferencia")?;
    let median_idx = position("Mediana")?;

    let mut observations = Vec::new();
    for record in reader.records() {
        let record = record?;
        let median_raw = record.get(median_idx).unwrap_or("");
        if median_raw.is_empty() {
            continue;
        }
        let survey_date =
            NaiveDate::parse_from_str(record.get(date_idx).unwrap_or(""), "%Y-%m-%d")?;
        let reference = parse_reference_quarter(record.get(reference_idx).unwrap_or(""))?;
        let median = parse_decimal_comma(median_raw)?;
        observations.push(SurveyObservation {
            survey_date,
            reference,
            median,
        });
    }
    Ok(observations)
}

/// Parses a "quarter/year" reference period into its quarter-start date.
fn parse_reference_quarter(raw: &str) -> Result<NaiveDate> {
    let (quarter, year) = raw
        .split_once('/')
        .ok_or_else(|| anyhow::anyhow!("bad reference period {:?}", raw))?;
    let quarter: u32 = quarter.trim().parse()?;
    let year: i32 = year.trim().parse()?;
    if !(1..=4).contains(&quarter) {
        return Err(anyhow::anyhow!("bad reference quarter {:?}", raw));
    }
    NaiveDate::from_ymd_opt(year, quarter * 3 - 2, 1)
        .ok_or_else(|| anyhow::anyhow!("bad reference period {:?}", raw))
}

/// Parses a decimal-comma number ("2,03" -> 2.03).
fn parse_decimal_comma(raw: &str) -> Result<f64> {
    Ok(raw.replace(',', ".").parse()?)
}
