//! CLI entry point for the macro forecasting pipeline.
//!
//! Provides subcommands for running the model pipeline for an indicator and
//! for inspecting the combined forecast tables the dashboard consumes.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use macrocast::infra::bcb::FocusClient;
use macrocast::infra::genai::GeminiClient;
use macrocast::infra::sheets::SheetMetadataClient;
use macrocast::pipeline::{self, IndicatorSpec, PipelineConfig};
use macrocast::services::AiForecaster;
use macrocast::viewmodel::{self, ViewFilter};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "macrocast")]
#[command(about = "Quarterly macroeconomic forecasts for Brazilian indicators", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the forecasting pipeline for one indicator
    Forecast {
        /// Indicator to forecast (built-in: pib)
        #[arg(default_value = "pib")]
        indicator: String,

        /// Directory holding df_mensal.parquet and df_trimestral.parquet
        #[arg(short, long, default_value = "dados")]
        data_dir: PathBuf,

        /// Directory receiving the combined forecast parquet
        #[arg(short, long, default_value = "previsao")]
        output_dir: PathBuf,

        /// Forecast horizon in quarters
        #[arg(long, default_value_t = 4)]
        horizon: usize,

        /// Autoregressive lags
        #[arg(long, default_value_t = 2)]
        lags: usize,

        /// First quarter of the training window
        #[arg(long, default_value = "1997-10-01")]
        training_start: NaiveDate,

        /// Bootstrap replicates for prediction intervals
        #[arg(long, default_value_t = 5000)]
        boot: usize,

        /// Bootstrap seed
        #[arg(long, default_value_t = 1984)]
        seed: u64,

        /// Skip the generative-AI forecast variant
        #[arg(long, default_value_t = false)]
        skip_ai: bool,
    },
    /// Inspect the combined forecast tables the dashboard reads
    Panel {
        /// Directory holding the per-indicator parquet files
        #[arg(short, long, default_value = "previsao")]
        output_dir: PathBuf,

        /// Hide rows before this date
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Only show these model labels
        #[arg(long, value_delimiter = ',')]
        models: Option<Vec<String>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/macrocast.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("macrocast.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Forecast {
            indicator,
            data_dir,
            output_dir,
            horizon,
            lags,
            training_start,
            boot,
            seed,
            skip_ai,
        } => {
            let spec = IndicatorSpec::for_name(&indicator).ok_or_else(|| {
                anyhow::anyhow!("no built-in configuration for indicator {indicator:?}")
            })?;
            let config = PipelineConfig {
                data_dir,
                output_dir,
                horizon,
                lags,
                training_start,
                n_boot: boot,
                seed,
            };

            let metadata = SheetMetadataClient::new();
            let expectations = FocusClient::new();
            let ai_client = if skip_ai {
                info!("AI forecast disabled");
                None
            } else {
                Some(GeminiClient::from_env()?)
            };

            let outcome = pipeline::run(
                &config,
                &spec,
                &metadata,
                &expectations,
                ai_client.as_ref().map(|c| c as &dyn AiForecaster),
            )
            .await?;

            info!(
                output = %outcome.output_path.display(),
                snapshot = %outcome.snapshot_path.display(),
                rows = outcome.row_count,
                labels = ?outcome.labels,
                "Pipeline finished"
            );
        }
        Commands::Panel {
            output_dir,
            start,
            models,
        } => {
            let filter = ViewFilter {
                start,
                models,
                show_intervals: true,
            };

            for panel in viewmodel::load_panel(&output_dir) {
                if panel.is_empty() {
                    warn!(indicator = %panel.name, "No forecast table");
                    continue;
                }

                let labels = viewmodel::available_models(&panel.rows);
                info!(
                    indicator = %panel.name,
                    rows = panel.rows.len(),
                    models = ?labels,
                    "Panel loaded"
                );

                for row in viewmodel::table_view(&panel.rows, &filter) {
                    info!(
                        indicator = %panel.name,
                        date = %row.date,
                        label = %row.label,
                        value = row.value,
                        lower = row.lower,
                        upper = row.upper,
                        "Row"
                    );
                }
            }
        }
    }

    Ok(())
}
