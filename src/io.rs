//! Columnar and CSV persistence at the pipeline edges.
//!
//! Input macro tables and the combined forecast output are parquet; the
//! target+regressors snapshot handed to the AI forecaster is CSV.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;

use crate::frame::{self, Frame};

/// Date/index column name shared by all persisted tables.
pub const DATE_COLUMN: &str = "data";
/// Combined-output column names, in file order.
pub const VALUE_COLUMN: &str = "Valor";
pub const LABEL_COLUMN: &str = "Tipo";
pub const LOWER_COLUMN: &str = "Intervalo Inferior";
pub const UPPER_COLUMN: &str = "Intervalo Superior";

/// One row of the combined actuals+forecasts table.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub date: NaiveDate,
    pub value: f64,
    pub label: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// Reads a date-indexed macro table from parquet.
///
/// The date column is `data`, or failing that the first temporal column.
/// Non-numeric payload columns are skipped. Rows are sorted by date.
pub fn read_table_parquet(path: &Path) -> Result<Frame> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let df = ParquetReader::new(file)
        .finish()
        .with_context(|| format!("reading parquet {}", path.display()))?;
    dataframe_to_frame(&df)
}

/// Writes a date-indexed frame to parquet.
pub fn write_table_parquet(path: &Path, table: &Frame) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut df = frame_to_dataframe(table)?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}

/// Writes the combined actuals+forecasts table, preserving row order.
pub fn write_combined_parquet(path: &Path, rows: &[OutputRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
    let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
    let labels: Vec<String> = rows.iter().map(|r| r.label.clone()).collect();
    let lower: Vec<Option<f64>> = rows.iter().map(|r| r.lower).collect();
    let upper: Vec<Option<f64>> = rows.iter().map(|r| r.upper).collect();

    let mut df = DataFrame::new(vec![
        Series::new(DATE_COLUMN, dates),
        Series::new(VALUE_COLUMN, values),
        Series::new(LABEL_COLUMN, labels),
        Series::new(LOWER_COLUMN, lower),
        Series::new(UPPER_COLUMN, upper),
    ])?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}

/// Reads a combined actuals+forecasts table back, preserving row order.
pub fn read_combined_parquet(path: &Path) -> Result<Vec<OutputRow>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let df = ParquetReader::new(file)
        .finish()
        .with_context(|| format!("reading parquet {}", path.display()))?;

    let dates = date_values(df.column(DATE_COLUMN)?)?;
    let values = numeric_values(df.column(VALUE_COLUMN)?)?;
    let lower = numeric_values(df.column(LOWER_COLUMN)?)?;
    let upper = numeric_values(df.column(UPPER_COLUMN)?)?;
    let labels: Vec<String> = df
        .column(LABEL_COLUMN)?
        .utf8()?
        .into_iter()
        .map(|s| s.unwrap_or("").to_string())
        .collect();

    let mut rows = Vec::with_capacity(dates.len());
    for i in 0..dates.len() {
        rows.push(OutputRow {
            date: dates[i],
            value: values[i]
                .ok_or_else(|| anyhow::anyhow!("null {} at row {}", VALUE_COLUMN, i))?,
            label: labels[i].clone(),
            lower: lower[i],
            upper: upper[i],
        });
    }
    Ok(rows)
}

/// Writes the target+regressors snapshot CSV consumed by the AI forecaster.
///
/// Rows follow the target index; regressor cells missing at a target date
/// are left empty.
pub fn write_snapshot_csv(path: &Path, target: &frame::Series, regressors: &Frame) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new().from_writer(file);

    let mut header = vec![DATE_COLUMN.to_string(), target.name().to_string()];
    header.extend(regressors.column_names().iter().map(|n| n.to_string()));
    writer.write_record(&header)?;

    for (i, date) in target.index().iter().enumerate() {
        let mut row = vec![date.format("%Y-%m-%d").to_string(), target.values()[i].to_string()];
        for name in regressors.column_names() {
            let cell = regressors
                .index()
                .binary_search(date)
                .ok()
                .and_then(|pos| regressors.column(name).ok().and_then(|c| c[pos]));
            row.push(cell.map(|v| v.to_string()).unwrap_or_default());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn frame_to_dataframe(table: &Frame) -> Result<DataFrame> {
    let mut columns = vec![Series::new(DATE_COLUMN, table.index().to_vec())];
    for name in table.column_names() {
        columns.push(Series::new(name, table.column(name)?.to_vec()));
    }
    Ok(DataFrame::new(columns)?)
}

fn dataframe_to_frame(df: &DataFrame) -> Result<Frame> {
    let date_name = detect_date_column(df)?;
    let raw_dates = date_values(df.column(&date_name)?)?;

    // Sort rows by date; parquet files written elsewhere may be unordered.
    let mut order: Vec<usize> = (0..raw_dates.len()).collect();
    order.sort_by_key(|&i| raw_dates[i]);
    let index: Vec<NaiveDate> = order.iter().map(|&i| raw_dates[i]).collect();

    let mut table = Frame::new(index)?;
    for column in df.get_columns() {
        if column.name() == date_name {
            continue;
        }
        match nullable_numeric_values(column) {
            Some(values) => {
                let reordered: Vec<Option<f64>> = order.iter().map(|&i| values[i]).collect();
                table.insert_column(column.name(), reordered)?;
            }
            None => {
                debug!(column = column.name(), dtype = ?column.dtype(), "Skipping non-numeric column");
            }
        }
    }
    Ok(table)
}

fn detect_date_column(df: &DataFrame) -> Result<String> {
    if df.get_column_names().contains(&DATE_COLUMN) {
        return Ok(DATE_COLUMN.to_string());
    }
    for column in df.get_columns() {
        if column.dtype().is_temporal() {
            return Ok(column.name().to_string());
        }
    }
    Err(anyhow::anyhow!("no date column found in table"))
}

fn date_values(column: &Series) -> Result<Vec<NaiveDate>> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    match column.dtype() {
        DataType::Date => column
            .date()?
            .into_iter()
            .map(|opt| {
                opt.map(|days| epoch + chrono::Duration::days(days as i64))
                    .ok_or_else(|| anyhow::anyhow!("null date in column {:?}", column.name()))
            })
            .collect(),
        DataType::Datetime(unit, _) => {
            let divisor = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            column
                .datetime()?
                .into_iter()
                .map(|opt| {
                    opt.and_then(|ts| chrono::DateTime::from_timestamp(ts / divisor, 0))
                        .map(|dt| dt.date_naive())
                        .ok_or_else(|| {
                            anyhow::anyhow!("null timestamp in column {:?}", column.name())
                        })
                })
                .collect()
        }
        other => Err(anyhow::anyhow!(
            "column {:?} has non-temporal dtype {:?}",
            column.name(),
            other
        )),
    }
}

fn nullable_numeric_values(column: &Series) -> Option<Vec<Option<f64>>> {
    match column.dtype() {
        DataType::Float64 => Some(column.f64().ok()?.into_iter().collect()),
        DataType::Float32 => Some(
            column
                .f32()
                .ok()?
                .into_iter()
                .map(|v| v.map(|x| x as f64))
                .collect(),
        ),
        DataType::Int64 => Some(
            column
                .i64()
                .ok()?
                .into_iter()
                .map(|v| v.map(|x| x as f64))
                .collect(),
        ),
        DataType::Int32 => Some(
            column
                .i32()
                .ok()?
                .into_iter()
                .map(|v| v.map(|x| x as f64))
                .collect(),
        ),
        DataType::UInt64 => Some(
            column
                .u64()
                .ok()?
                .into_iter()
                .map(|v| v.map(|x| x as f64))
                .collect(),
        ),
        DataType::UInt32 => Some(
            column
                .u32()
                .ok()?
                .into_iter()
                .map(|v| v.map(|x| x as f64))
                .collect(),
        ),
        _ => None,
    }
}

fn numeric_values(column: &Series) -> Result<Vec<Option<f64>>> {
    nullable_numeric_values(column)
        .ok_or_else(|| anyhow::anyhow!("column {:?} is not numeric", column.name()))
}
