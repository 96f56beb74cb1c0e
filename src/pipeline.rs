//! The forecasting pipeline: load → transform → clean → fit → scenario →
//! predict → AI forecast → persist, as explicit staged functions.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};

use crate::clean::{self, MISSING_RATIO_THRESHOLD};
use crate::frame::{Frame, Series, add_quarters, quarter_of};
use crate::io::{self, OutputRow};
use crate::model::{AutoregForecaster, BayesianRidge, IntervalOptions, Regressor, Ridge};
use crate::scenario::{self, ScenarioSource};
use crate::services::{AiForecaster, ExpectationsSource, MetadataSource, ai};
use crate::transform::Transformation;

/// Label attached to the AI-produced forecast variant.
pub const AI_LABEL: &str = "IA";

/// One exogenous regressor used by the models, with its scenario policy.
#[derive(Debug, Clone)]
pub struct RegressorSpec {
    pub name: String,
    pub scenario: ScenarioSource,
}

/// Everything indicator-specific about a pipeline run.
///
/// The four published indicators share this shape; only PIB ships as a
/// built-in spec because only its regressor selection is settled.
#[derive(Debug, Clone)]
pub struct IndicatorSpec {
    /// Short name used for file names ("pib" -> pib.csv, pib.parquet).
    pub name: String,
    /// Label tagging actual observations in the combined output.
    pub display_label: String,
    /// Target column in the joined macro table.
    pub target_column: String,
    /// Model regressors, in design-matrix order.
    pub regressors: Vec<RegressorSpec>,
    /// Columns whose metadata transformation is not applied (kept in level).
    pub skip_transform: Vec<String>,
    /// Subject line embedded in the AI prompt.
    pub ai_subject: String,
}

impl IndicatorSpec {
    pub fn pib() -> Self {
        Self {
            name: "pib".into(),
            display_label: "PIB".into(),
            target_column: "pib".into(),
            regressors: vec![
                RegressorSpec {
                    name: "uci_ind_fgv".into(),
                    scenario: ScenarioSource::SeasonalMedian,
                },
                RegressorSpec {
                    name: "expec_pib".into(),
                    scenario: ScenarioSource::MarketExpectations {
                        indicator: "PIB Total".into(),
                    },
                },
                RegressorSpec {
                    name: "prod_ind_metalurgia".into(),
                    scenario: ScenarioSource::SeasonalMedian,
                },
            ],
            skip_transform: vec!["saldo_caged_antigo".into(), "saldo_caged_novo".into()],
            ai_subject: "Gross Domestic Product (GDP) for Brazil, measured in annual \
                         percentage variation (accumulated rate in four quarters in \
                         relation to the same period of the previous year) and published \
                         by IBGE"
                .into(),
        }
    }

    /// Looks up a built-in spec by indicator name.
    pub fn for_name(name: &str) -> Option<Self> {
        match name {
            "pib" => Some(Self::pib()),
            _ => None,
        }
    }
}

/// Run-wide knobs, shared across indicators.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub horizon: usize,
    pub lags: usize,
    pub training_start: NaiveDate,
    pub n_boot: usize,
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("dados"),
            output_dir: PathBuf::from("previsao"),
            horizon: 4,
            lags: 2,
            training_start: NaiveDate::from_ymd_opt(1997, 10, 1).unwrap(),
            n_boot: 5000,
            seed: 1984,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub snapshot_path: PathBuf,
    pub output_path: PathBuf,
    pub row_count: usize,
    pub labels: Vec<String>,
}

/// Runs the whole pipeline for one indicator.
///
/// External-source failures propagate and abort the run; there is no retry
/// or partial-failure recovery. When `ai_forecaster` is absent the AI
/// variant is simply skipped.
#[instrument(skip_all, fields(indicator = %spec.name))]
pub async fn run(
    config: &PipelineConfig,
    spec: &IndicatorSpec,
    metadata: &dyn MetadataSource,
    expectations: &dyn ExpectationsSource,
    ai_forecaster: Option<&dyn AiForecaster>,
) -> Result<PipelineOutcome> {
    let joined = load_joined_table(config)?;
    info!(
        rows = joined.len(),
        columns = joined.width(),
        "Macro tables joined at quarterly frequency"
    );

    let y_full = joined
        .series(&spec.target_column)
        .with_context(|| format!("target column {:?}", spec.target_column))?;
    let mut x = joined.clone();
    x.drop_columns(&[spec.target_column.clone()]);

    let codes = metadata.transform_codes().await?;
    apply_transformations(&mut x, &codes, &spec.skip_transform)?;

    let y = y_full.slice_between(Some(config.training_start), None);
    let last_y = y
        .last_date()
        .context("target series empty within the training window")?;
    info!(observations = y.len(), last = %last_y, "Target series ready");

    let mut x_window = clean::restrict_training_window(&x, config.training_start, last_y);
    let dropped = clean::drop_sparse_columns(&mut x_window, y.len(), MISSING_RATIO_THRESHOLD);
    info!(dropped = dropped.len(), kept = x_window.width(), "Sparse columns filtered");
    clean::fill_nearest(&mut x_window);

    let regressor_names: Vec<&str> = spec.regressors.iter().map(|r| r.name.as_str()).collect();
    let x_reg = align_to_index(&x_window.select(&regressor_names)?, y.index())?;

    let horizon_dates: Vec<NaiveDate> = (1..=config.horizon as u32)
        .map(|i| add_quarters(last_y, i))
        .collect();

    let scenarios =
        build_scenarios(spec, &x_window, &horizon_dates, last_y, expectations).await?;

    let snapshot_path = config.data_dir.join(format!("{}.csv", spec.name));
    io::write_snapshot_csv(&snapshot_path, &y, &x_reg)?;
    info!(path = %snapshot_path.display(), "Snapshot written");

    let options = IntervalOptions {
        n_boot: config.n_boot,
        seed: config.seed,
        ..Default::default()
    };

    let mut rows: Vec<OutputRow> = y
        .index()
        .iter()
        .zip(y.values())
        .map(|(date, value)| OutputRow {
            date: *date,
            value: *value,
            label: spec.display_label.clone(),
            lower: None,
            upper: None,
        })
        .collect();
    let mut labels = vec![spec.display_label.clone()];

    for forecast in [
        fit_and_predict(Ridge::default(), config, &y, &x_reg, &scenarios, &horizon_dates, &options)?,
        fit_and_predict(
            BayesianRidge::default(),
            config,
            &y,
            &x_reg,
            &scenarios,
            &horizon_dates,
            &options,
        )?,
    ] {
        labels.push(forecast.first().map(|r| r.label.clone()).unwrap_or_default());
        rows.extend(forecast);
    }

    if let Some(client) = ai_forecaster {
        let prompt = build_prompt(spec, Utc::now().date_naive(), &horizon_dates);
        let attachment = std::fs::read_to_string(&snapshot_path)?;
        info!("Requesting AI forecast");
        let reply = client.generate(&prompt, &attachment).await?;
        let parsed = ai::parse_forecast_csv(&reply)?;
        info!(points = parsed.len(), "AI forecast parsed");
        rows.extend(parsed.into_iter().map(|(date, value)| OutputRow {
            date,
            value,
            label: AI_LABEL.to_string(),
            lower: None,
            upper: None,
        }));
        labels.push(AI_LABEL.to_string());
    }

    let output_path = config.output_dir.join(format!("{}.parquet", spec.name));
    io::write_combined_parquet(&output_path, &rows)?;
    info!(path = %output_path.display(), rows = rows.len(), "Combined output written");

    Ok(PipelineOutcome {
        snapshot_path,
        output_path,
        row_count: rows.len(),
        labels,
    })
}

/// Reads the monthly and quarterly macro tables and joins them at quarterly
/// frequency (quarter-start index, monthly values averaged).
#[instrument(skip_all)]
pub fn load_joined_table(config: &PipelineConfig) -> Result<Frame> {
    let monthly = io::read_table_parquet(&config.data_dir.join("df_mensal.parquet"))?;
    let quarterly = io::read_table_parquet(&config.data_dir.join("df_trimestral.parquet"))?;
    let joined = monthly
        .resample_quarterly_mean()
        .outer_join(&quarterly.resample_quarterly_mean())?;
    Ok(joined)
}

/// Applies each column's metadata-selected transformation in place.
fn apply_transformations(
    x: &mut Frame,
    codes: &HashMap<String, String>,
    skip: &[String],
) -> Result<()> {
    let names: Vec<String> = x
        .column_names()
        .iter()
        .map(|n| n.to_string())
        .filter(|n| !skip.contains(n))
        .collect();
    for name in names {
        let code = codes
            .get(&name)
            .with_context(|| format!("no metadata entry for column {name:?}"))?;
        let transformation = Transformation::from_code(code)?;
        let transformed = transformation.apply(x.column(&name)?);
        x.insert_column(name, transformed)?;
    }
    Ok(())
}

/// Reindexes a frame onto the target's index (every target date must exist).
fn align_to_index(frame: &Frame, index: &[NaiveDate]) -> Result<Frame> {
    let mut aligned = Frame::new(index.to_vec())?;
    for name in frame.column_names() {
        let column = frame.column(name)?;
        let values = index
            .iter()
            .map(|date| {
                frame
                    .index()
                    .binary_search(date)
                    .map(|pos| column[pos])
                    .map_err(|_| anyhow::anyhow!("regressor {:?} has no row for {}", name, date))
            })
            .collect::<Result<Vec<Option<f64>>>>()?;
        aligned.insert_column(name, values)?;
    }
    Ok(aligned)
}

/// Builds the scenario frame for all model regressors over the horizon.
async fn build_scenarios(
    spec: &IndicatorSpec,
    x_window: &Frame,
    horizon: &[NaiveDate],
    anchor: NaiveDate,
    expectations: &dyn ExpectationsSource,
) -> Result<Frame> {
    let min_date = horizon
        .first()
        .copied()
        .context("empty forecast horizon")?;
    let mut scenarios = Frame::new(horizon.to_vec())?;

    for regressor in &spec.regressors {
        let values: Vec<Option<f64>> = match &regressor.scenario {
            ScenarioSource::SeasonalMedian => {
                let history = x_window.series(&regressor.name)?;
                scenario::seasonal_median(&history, horizon)?
                    .into_iter()
                    .map(Some)
                    .collect()
            }
            ScenarioSource::MarketExpectations { indicator } => {
                let observations = expectations.quarterly_medians(indicator, min_date).await?;
                info!(
                    regressor = %regressor.name,
                    indicator = %indicator,
                    observations = observations.len(),
                    "Survey observations fetched"
                );
                scenario::survey_scenario(&observations, horizon, anchor, indicator)?
            }
        };
        scenarios.insert_column(regressor.name.clone(), values)?;
    }
    Ok(scenarios)
}

fn fit_and_predict<R: Regressor>(
    regressor: R,
    config: &PipelineConfig,
    y: &Series,
    x_reg: &Frame,
    scenarios: &Frame,
    horizon_dates: &[NaiveDate],
    options: &IntervalOptions,
) -> Result<Vec<OutputRow>> {
    let mut model = AutoregForecaster::new(regressor, config.lags);
    model.fit(y, x_reg)?;
    let label = model.name().to_string();
    let intervals = model.predict_interval(config.horizon, scenarios, options)?;
    info!(model = %label, steps = intervals.len(), "Forecast produced");

    Ok(intervals
        .into_iter()
        .zip(horizon_dates)
        .map(|(step, date)| OutputRow {
            date: *date,
            value: step.value,
            label: label.clone(),
            lower: Some(step.lower),
            upper: Some(step.upper),
        })
        .collect())
}

/// Natural-language prompt for the AI forecast, embedding the current date
/// and the horizon span.
fn build_prompt(spec: &IndicatorSpec, today: NaiveDate, horizon: &[NaiveDate]) -> String {
    let first = horizon.first().copied().unwrap_or(today);
    let last = horizon.last().copied().unwrap_or(today);
    let today_text = today.format("%B %d, %Y");
    format!(
        "Assume that you are in {today_text}. Please give me your best forecast of \
         {subject}, for {first_q} to {last_q}. Use the historical data from the attached \
         CSV named \"{file}.csv\", where \"{target}\" is the target column, \"data\" is \
         the date column and the others are exogenous variables. Please give me numeric \
         values for these forecasts, in a CSV like format with a header (columns \"date\" \
         in YYYY-MM-DD and \"value\"), and nothing more. Do not use any information that \
         was not available to you as of {today_text} to formulate these forecasts.",
        subject = spec.ai_subject,
        first_q = format_quarter(first),
        last_q = format_quarter(last),
        file = spec.name,
        target = spec.target_column,
    )
}

fn format_quarter(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!("{} Q{}", date.year(), quarter_of(date))
}
