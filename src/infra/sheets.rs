//! Metadata client backed by a published Google Sheets CSV export.
//!
//! The metadata sheet maps every variable identifier to its transformation
//! code. The sheet is public; the client just downloads the CSV export of
//! the `Metadados` tab and indexes it by identifier.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::services::MetadataSource;

const DEFAULT_SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/1x8Ugm7jVO7XeNoxiaFPTPm1mfVc3JUNvvVqVjCioYmE/export?format=csv&sheet=Metadados";

const IDENTIFIER_COLUMN: &str = "Identificador";
const TRANSFORM_COLUMN: &str = "Transformação";

pub struct SheetMetadataClient {
    url: String,
}

impl SheetMetadataClient {
    pub fn new() -> Self {
        Self::with_url(DEFAULT_SHEET_URL.to_string())
    }

    pub fn with_url(url: String) -> Self {
        Self { url }
    }
}

impl Default for SheetMetadataClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataSource for SheetMetadataClient {
    async fn transform_codes(&self) -> Result<HashMap<String, String>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch metadata sheet: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Metadata sheet returned status {}: {}",
                status,
                body
            ));
        }

        let body = response.text().await?;
        parse_metadata_csv(&body)
    }
}

fn parse_metadata_csv(body: &str) -> Result<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let id_idx = headers
        .iter()
        .position(|h| h == IDENTIFIER_COLUMN)
        .ok_or_else(|| anyhow::anyhow!("metadata sheet has no {:?} column", IDENTIFIER_COLUMN))?;
    let code_idx = headers
        .iter()
        .position(|h| h == TRANSFORM_COLUMN)
        .ok_or_else(|| anyhow::anyhow!("metadata sheet has no {:?} column", TRANSFORM_COLUMN))?;

    let mut codes = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let id = record.get(id_idx).unwrap_or("").to_string();
        let code = record.get(code_idx).unwrap_or("").to_string();
        if !id.is_empty() {
            codes.insert(id, code);
        }
    }
    Ok(codes)
}
