//! Presentation-ready views over the combined forecast tables.
//!
//! The dashboard reads one parquet file per indicator; a missing or broken
//! file degrades to an empty panel so the remaining indicators still render.
//! Everything here is pure over [`OutputRow`] slices, so the rendering layer
//! stays free of data logic.

use std::path::Path;

use chrono::NaiveDate;
use tracing::warn;

use crate::io::{self, OutputRow};

/// Indicators shown on the dashboard, in display order.
pub const PANEL_INDICATORS: [&str; 4] = ["cambio", "ipca", "pib", "selic"];

/// Fixed palette assigned by label position so colors stay put when a model
/// is toggled off.
const PALETTE: [&str; 6] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b",
];

/// One indicator's combined table, possibly empty.
#[derive(Debug, Clone)]
pub struct IndicatorPanel {
    pub name: String,
    pub rows: Vec<OutputRow>,
}

impl IndicatorPanel {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// User-driven narrowing of a panel.
#[derive(Debug, Clone, Default)]
pub struct ViewFilter {
    /// Hide rows before this date.
    pub start: Option<NaiveDate>,
    /// Keep only these labels; `None` keeps everything.
    pub models: Option<Vec<String>>,
    /// Attach interval bands to chart series that carry bounds.
    pub show_intervals: bool,
}

/// One drawable line, with an optional confidence band.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    pub color: String,
    pub points: Vec<(NaiveDate, f64)>,
    pub band: Vec<(NaiveDate, f64, f64)>,
}

/// Loads every panel indicator from `output_dir`, substituting an empty
/// panel where the file is absent or unreadable.
pub fn load_panel(output_dir: &Path) -> Vec<IndicatorPanel> {
    PANEL_INDICATORS
        .iter()
        .map(|name| {
            let path = output_dir.join(format!("{name}.parquet"));
            let rows = match io::read_combined_parquet(&path) {
                Ok(rows) => rows,
                Err(error) => {
                    warn!(
                        indicator = name,
                        path = %path.display(),
                        %error,
                        "Forecast table unavailable, rendering empty panel"
                    );
                    Vec::new()
                }
            };
            IndicatorPanel {
                name: name.to_string(),
                rows,
            }
        })
        .collect()
}

/// Distinct labels in first-appearance order (actuals first, since the
/// pipeline writes them first).
pub fn available_models(rows: &[OutputRow]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for row in rows {
        if !labels.contains(&row.label) {
            labels.push(row.label.clone());
        }
    }
    labels
}

/// Builds chart series from a combined table under a filter.
///
/// Colors are assigned by label position in the unfiltered table, so a
/// deselected model never shifts the colors of the others.
pub fn chart_view(rows: &[OutputRow], filter: &ViewFilter) -> Vec<ChartSeries> {
    let labels = available_models(rows);
    let mut series = Vec::new();

    for (position, label) in labels.iter().enumerate() {
        if let Some(selected) = &filter.models {
            if !selected.contains(label) {
                continue;
            }
        }

        let mut points = Vec::new();
        let mut band = Vec::new();
        for row in rows.iter().filter(|r| &r.label == label) {
            if filter.start.is_some_and(|s| row.date < s) {
                continue;
            }
            points.push((row.date, row.value));
            if filter.show_intervals {
                if let (Some(lower), Some(upper)) = (row.lower, row.upper) {
                    band.push((row.date, lower, upper));
                }
            }
        }
        if points.is_empty() {
            continue;
        }
        series.push(ChartSeries {
            label: label.clone(),
            color: PALETTE[position % PALETTE.len()].to_string(),
            points,
            band,
        });
    }
    series
}

/// Tabular view: the filtered rows, newest first, labels grouped within a
/// date the way the chart legend orders them.
pub fn table_view(rows: &[OutputRow], filter: &ViewFilter) -> Vec<OutputRow> {
    let labels = available_models(rows);
    let rank = |label: &str| labels.iter().position(|l| l == label).unwrap_or(usize::MAX);

    let mut out: Vec<OutputRow> = rows
        .iter()
        .filter(|row| filter.start.is_none_or(|s| row.date >= s))
        .filter(|row| {
            filter
                .models
                .as_ref()
                .is_none_or(|selected| selected.contains(&row.label))
        })
        .cloned()
        .collect();
    out.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| rank(&a.label).cmp(&rank(&b.label))));
    out
}
