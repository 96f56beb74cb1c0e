use std::collections::HashMap;
use std::f64::consts::TAU;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use macrocast::frame::{Frame, add_quarters};
use macrocast::io;
use macrocast::pipeline::{self, IndicatorSpec, PipelineConfig};
use macrocast::services::{
    AiForecaster, ExpectationsSource, MetadataSource, SurveyObservation,
};

struct FakeMetadata;

#[async_trait]
impl MetadataSource for FakeMetadata {
    async fn transform_codes(&self) -> Result<HashMap<String, String>> {
        Ok(HashMap::from([
            ("uci_ind_fgv".to_string(), "1".to_string()),
            ("expec_pib".to_string(), "1".to_string()),
            ("prod_ind_metalurgia".to_string(), "1".to_string()),
            ("sparse_col".to_string(), "1".to_string()),
        ]))
    }
}

struct FakeExpectations;

#[async_trait]
impl ExpectationsSource for FakeExpectations {
    async fn quarterly_medians(
        &self,
        _indicator: &str,
        min_date: NaiveDate,
    ) -> Result<Vec<SurveyObservation>> {
        // One vintage covering the anchor quarter and the four horizon
        // quarters (min_date is the first horizon quarter).
        let survey_date = NaiveDate::from_ymd_opt(2025, 2, 7).unwrap();
        let anchor = macrocast::frame::quarter_start(min_date.pred_opt().unwrap());
        let mut observations = vec![SurveyObservation {
            survey_date,
            reference: anchor,
            median: 2.0,
        }];
        for i in 0..4 {
            observations.push(SurveyObservation {
                survey_date,
                reference: add_quarters(min_date, i),
                median: 2.0 + 0.1 * i as f64,
            });
        }
        Ok(observations)
    }
}

struct FakeAi;

#[async_trait]
impl AiForecaster for FakeAi {
    async fn generate(&self, prompt: &str, csv_attachment: &str) -> Result<String> {
        assert!(prompt.contains("forecast"));
        assert!(csv_attachment.starts_with("data,"));
        Ok("```csv\ndate,value\n2025-01-01,2.1\n2025-04-01,2.2\n2025-07-01,2.3\n2025-10-01,2.4\n```".to_string())
    }
}

fn d(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

/// Monthly table from 2014-01 through 2024-12 with three usable regressors
/// and one column too sparse to survive cleaning.
fn monthly_table() -> Frame {
    let months = 11 * 12;
    let index: Vec<NaiveDate> = (0..months)
        .map(|i| d(2014 + (i / 12) as i32, (i % 12) as u32 + 1))
        .collect();
    let mut frame = Frame::new(index.clone()).unwrap();

    let uci: Vec<Option<f64>> = (0..months)
        .map(|i| Some(80.0 + 3.0 * (TAU * i as f64 / 12.0).sin() + 0.01 * i as f64))
        .collect();
    let expec: Vec<Option<f64>> = (0..months)
        .map(|i| Some(2.0 + (TAU * i as f64 / 12.0).cos()))
        .collect();
    let prod: Vec<Option<f64>> = (0..months)
        .map(|i| Some(100.0 + 0.05 * i as f64 + 2.0 * (TAU * i as f64 / 6.0).sin()))
        .collect();
    // Observed only through 2016: far past the missing-ratio threshold.
    let sparse: Vec<Option<f64>> = index
        .iter()
        .map(|date| (date.year() < 2017).then_some(1.0))
        .collect();

    frame.insert_column("uci_ind_fgv", uci).unwrap();
    frame.insert_column("expec_pib", expec).unwrap();
    frame.insert_column("prod_ind_metalurgia", prod).unwrap();
    frame.insert_column("sparse_col", sparse).unwrap();
    frame
}

/// Quarterly target from 2014Q1 through 2024Q4.
fn quarterly_table() -> Frame {
    let quarters = 11 * 4;
    let index: Vec<NaiveDate> = (0..quarters)
        .map(|i| add_quarters(d(2014, 1), i as u32))
        .collect();
    let mut frame = Frame::new(index).unwrap();
    let pib: Vec<Option<f64>> = (0..quarters)
        .map(|i| Some(2.0 + 0.8 * (TAU * i as f64 / 4.0).sin() + 0.01 * i as f64))
        .collect();
    frame.insert_column("pib", pib).unwrap();
    frame
}

fn test_config(root: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        data_dir: root.join("dados"),
        output_dir: root.join("previsao"),
        horizon: 4,
        lags: 2,
        training_start: d(2015, 1),
        n_boot: 200,
        seed: 1984,
    }
}

fn write_input_tables(config: &PipelineConfig) {
    io::write_table_parquet(&config.data_dir.join("df_mensal.parquet"), &monthly_table())
        .unwrap();
    io::write_table_parquet(
        &config.data_dir.join("df_trimestral.parquet"),
        &quarterly_table(),
    )
    .unwrap();
}

#[tokio::test]
async fn full_run_produces_combined_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_input_tables(&config);

    let spec = IndicatorSpec::pib();
    let outcome = pipeline::run(&config, &spec, &FakeMetadata, &FakeExpectations, Some(&FakeAi))
        .await
        .unwrap();

    assert_eq!(
        outcome.labels,
        vec!["PIB", "Ridge", "Bayesian Ridge", "IA"]
    );
    assert!(outcome.snapshot_path.exists());
    assert!(outcome.output_path.exists());

    let rows = io::read_combined_parquet(&outcome.output_path).unwrap();
    assert_eq!(rows.len(), outcome.row_count);

    // 40 actual quarters within the training window plus three 4-step variants.
    let actuals: Vec<_> = rows.iter().filter(|r| r.label == "PIB").collect();
    assert_eq!(actuals.len(), 40);
    assert_eq!(actuals[0].date, d(2015, 1));
    assert!(actuals.iter().all(|r| r.lower.is_none() && r.upper.is_none()));

    let last_actual = d(2024, 10);
    for label in ["Ridge", "Bayesian Ridge"] {
        let forecast: Vec<_> = rows.iter().filter(|r| r.label == label).collect();
        assert_eq!(forecast.len(), 4, "{label}");
        for (i, row) in forecast.iter().enumerate() {
            assert_eq!(row.date, add_quarters(last_actual, i as u32 + 1));
            let lower = row.lower.unwrap();
            let upper = row.upper.unwrap();
            assert!(
                lower <= row.value && row.value <= upper,
                "{label} step {i}: {lower} <= {} <= {upper}",
                row.value
            );
        }
    }

    let ai: Vec<_> = rows.iter().filter(|r| r.label == "IA").collect();
    assert_eq!(ai.len(), 4);
    assert_eq!(ai[0].date, d(2025, 1));
    assert_eq!(ai[0].value, 2.1);
}

#[tokio::test]
async fn sparse_columns_never_reach_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_input_tables(&config);

    let spec = IndicatorSpec::pib();
    let outcome = pipeline::run(&config, &spec, &FakeMetadata, &FakeExpectations, None)
        .await
        .unwrap();

    let snapshot = std::fs::read_to_string(&outcome.snapshot_path).unwrap();
    let header = snapshot.lines().next().unwrap();
    assert_eq!(header, "data,pib,uci_ind_fgv,expec_pib,prod_ind_metalurgia");
    assert!(!snapshot.contains("sparse_col"));
    // One header line plus one line per training-window quarter.
    assert_eq!(snapshot.lines().count(), 41);
}

#[tokio::test]
async fn skipping_ai_skips_the_label() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_input_tables(&config);

    let spec = IndicatorSpec::pib();
    let outcome = pipeline::run(&config, &spec, &FakeMetadata, &FakeExpectations, None)
        .await
        .unwrap();

    assert_eq!(outcome.labels, vec!["PIB", "Ridge", "Bayesian Ridge"]);
    let rows = io::read_combined_parquet(&outcome.output_path).unwrap();
    assert!(rows.iter().all(|r| r.label != "IA"));
}

#[tokio::test]
async fn forecasts_are_reproducible_for_a_fixed_seed() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_input_tables(&config);

    let spec = IndicatorSpec::pib();
    let first = pipeline::run(&config, &spec, &FakeMetadata, &FakeExpectations, None)
        .await
        .unwrap();
    let first_rows = io::read_combined_parquet(&first.output_path).unwrap();

    let second = pipeline::run(&config, &spec, &FakeMetadata, &FakeExpectations, None)
        .await
        .unwrap();
    let second_rows = io::read_combined_parquet(&second.output_path).unwrap();

    assert_eq!(first_rows, second_rows);
}
