//! Training-window restriction and exogenous-variable cleaning.

use chrono::NaiveDate;
use tracing::debug;

use crate::frame::Frame;

/// Fraction of missing values (relative to the target length) at or above
/// which an exogenous column is discarded.
pub const MISSING_RATIO_THRESHOLD: f64 = 0.2;

/// Restricts a frame to the training window `[start, last_target_date]`.
pub fn restrict_training_window(frame: &Frame, start: NaiveDate, end: NaiveDate) -> Frame {
    frame.slice_between(Some(start), Some(end))
}

/// Drops columns whose missing-value ratio relative to `target_len` reaches
/// the threshold (inclusive). Returns the names of the dropped columns.
pub fn drop_sparse_columns(frame: &mut Frame, target_len: usize, threshold: f64) -> Vec<String> {
    if target_len == 0 {
        return Vec::new();
    }
    let dropped: Vec<String> = frame
        .column_names()
        .iter()
        .filter(|name| {
            let values = frame.column(name).unwrap_or(&[]);
            let missing = values.iter().filter(|v| v.is_none()).count();
            missing as f64 / target_len as f64 >= threshold
        })
        .map(|name| name.to_string())
        .collect();

    if !dropped.is_empty() {
        debug!(dropped = ?dropped, threshold, "Dropping sparse exogenous columns");
        frame.drop_columns(&dropped);
    }
    dropped
}

/// Fills remaining gaps by nearest-neighbor propagation: backward fill first,
/// then forward fill, matching the original cleaning order.
pub fn fill_nearest(frame: &mut Frame) {
    let names: Vec<String> = frame
        .column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    for name in names {
        let mut values = frame.column(&name).map(<[_]>::to_vec).unwrap_or_default();
        backward_fill(&mut values);
        forward_fill(&mut values);
        // Length unchanged, insert cannot fail.
        let _ = frame.insert_column(name, values);
    }
}

fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for slot in values.iter_mut() {
        match slot {
            Some(v) => last = Some(*v),
            None => *slot = last,
        }
    }
}

fn backward_fill(values: &mut [Option<f64>]) {
    let mut next = None;
    for slot in values.iter_mut().rev() {
        match slot {
            Some(v) => next = Some(*v),
            None => *slot = next,
        }
    }
}
