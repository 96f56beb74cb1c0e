//! Date-indexed tables and series for quarterly macro data.
//!
//! A [`Frame`] is a small column store keyed by a strictly increasing
//! `NaiveDate` index (quarter-start dates after resampling). Columns are
//! nullable `f64` vectors so missing observations survive joins and
//! transformations until the cleaning step decides what to do with them.

use chrono::{Datelike, NaiveDate};

use crate::error::{ForecastError, Result};

/// Normalizes a date to the first day of its quarter.
pub fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = 1 + 3 * ((date.month() - 1) / 3);
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap()
}

/// Quarter-of-year (1..=4) for a date.
pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// Advances a quarter-start date by `n` quarters.
pub fn add_quarters(date: NaiveDate, n: u32) -> NaiveDate {
    let months = date.year() * 12 + date.month() as i32 - 1 + 3 * n as i32;
    let year = months.div_euclid(12);
    let month = months.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap()
}

/// A named, fully observed numeric series over a strictly increasing index.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    index: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, index: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if index.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: index.len(),
                got: values.len(),
            });
        }
        check_monotonic(&index)?;
        Ok(Self {
            name: name.into(),
            index,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.index.last().copied()
    }

    /// Restricts the series to dates in `[start, end]` (both inclusive).
    pub fn slice_between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Series {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| {
                start.is_none_or(|s| self.index[i] >= s) && end.is_none_or(|e| self.index[i] <= e)
            })
            .collect();
        Series {
            name: self.name.clone(),
            index: keep.iter().map(|&i| self.index[i]).collect(),
            values: keep.iter().map(|&i| self.values[i]).collect(),
        }
    }
}

/// A date-indexed table of named nullable columns.
///
/// Invariants: the index is strictly increasing with unique dates and every
/// column has exactly one value slot per index entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    index: Vec<NaiveDate>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl Frame {
    pub fn new(index: Vec<NaiveDate>) -> Result<Self> {
        check_monotonic(&index)?;
        Ok(Self {
            index,
            columns: Vec::new(),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))
    }

    /// Adds a column, or replaces it if the name already exists.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.index.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.index.len(),
                got: values.len(),
            });
        }
        let name = name.into();
        if let Some(slot) = self.columns.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = values;
        } else {
            self.columns.push((name, values));
        }
        Ok(())
    }

    pub fn drop_columns(&mut self, names: &[String]) {
        self.columns.retain(|(n, _)| !names.contains(n));
    }

    /// Returns a new frame containing only the named columns, in order.
    pub fn select(&self, names: &[&str]) -> Result<Frame> {
        let mut out = Frame::new(self.index.clone())?;
        for name in names {
            out.insert_column(*name, self.column(name)?.to_vec())?;
        }
        Ok(out)
    }

    /// Restricts the frame to dates in `[start, end]` (both inclusive).
    pub fn slice_between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Frame {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| {
                start.is_none_or(|s| self.index[i] >= s) && end.is_none_or(|e| self.index[i] <= e)
            })
            .collect();
        Frame {
            index: keep.iter().map(|&i| self.index[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(n, v)| (n.clone(), keep.iter().map(|&i| v[i]).collect()))
                .collect(),
        }
    }

    /// Extracts a column as a [`Series`], dropping missing values.
    pub fn series(&self, name: &str) -> Result<Series> {
        let values = self.column(name)?;
        let mut index = Vec::new();
        let mut out = Vec::new();
        for (date, value) in self.index.iter().zip(values) {
            if let Some(v) = value {
                index.push(*date);
                out.push(*v);
            }
        }
        Series::new(name, index, out)
    }

    /// Converts each column to quarterly frequency by averaging the observed
    /// values that fall inside each quarter. The resulting index holds
    /// quarter-start dates.
    pub fn resample_quarterly_mean(&self) -> Frame {
        let quarters: Vec<NaiveDate> = self.index.iter().map(|d| quarter_start(*d)).collect();
        let mut unique = quarters.clone();
        unique.dedup();

        let mut columns = Vec::with_capacity(self.columns.len());
        for (name, values) in &self.columns {
            let mut out = Vec::with_capacity(unique.len());
            let mut pos = 0;
            for q in &unique {
                let mut sum = 0.0;
                let mut count = 0usize;
                let mut i = pos;
                while i < quarters.len() && quarters[i] == *q {
                    if let Some(v) = values[i] {
                        sum += v;
                        count += 1;
                    }
                    i += 1;
                }
                pos = i;
                out.push(if count > 0 { Some(sum / count as f64) } else { None });
            }
            columns.push((name.clone(), out));
        }
        Frame {
            index: unique,
            columns,
        }
    }

    /// Outer join on the date index. Column names must not collide.
    pub fn outer_join(&self, other: &Frame) -> Result<Frame> {
        for name in other.column_names() {
            if self.has_column(name) {
                return Err(ForecastError::InvalidParameter(format!(
                    "duplicate column in join: {name:?}"
                )));
            }
        }

        let mut merged: Vec<NaiveDate> = self
            .index
            .iter()
            .chain(other.index.iter())
            .copied()
            .collect();
        merged.sort_unstable();
        merged.dedup();

        let remap = |frame: &Frame| -> Vec<(String, Vec<Option<f64>>)> {
            frame
                .columns
                .iter()
                .map(|(name, values)| {
                    let out = merged
                        .iter()
                        .map(|d| {
                            frame
                                .index
                                .binary_search(d)
                                .ok()
                                .and_then(|i| values[i])
                        })
                        .collect();
                    (name.clone(), out)
                })
                .collect()
        };

        let mut columns = remap(self);
        columns.extend(remap(other));
        Ok(Frame {
            index: merged,
            columns,
        })
    }
}

fn check_monotonic(index: &[NaiveDate]) -> Result<()> {
    if index.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ForecastError::InvalidParameter(
            "index must be strictly increasing with unique dates".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn quarter_helpers() {
        assert_eq!(quarter_start(d(2023, 5, 17)), d(2023, 4, 1));
        assert_eq!(quarter_of(d(2023, 12, 31)), 4);
        assert_eq!(add_quarters(d(2023, 10, 1), 1), d(2024, 1, 1));
        assert_eq!(add_quarters(d(2023, 1, 1), 4), d(2024, 1, 1));
    }

    #[test]
    fn rejects_unsorted_index() {
        let res = Frame::new(vec![d(2023, 4, 1), d(2023, 1, 1)]);
        assert!(res.is_err());
    }

    #[test]
    fn resample_averages_months_within_quarter() {
        let mut frame =
            Frame::new(vec![d(2023, 1, 1), d(2023, 2, 1), d(2023, 3, 1), d(2023, 4, 1)]).unwrap();
        frame
            .insert_column("x", vec![Some(1.0), Some(2.0), None, Some(10.0)])
            .unwrap();

        let quarterly = frame.resample_quarterly_mean();
        assert_eq!(quarterly.index(), &[d(2023, 1, 1), d(2023, 4, 1)]);
        assert_eq!(quarterly.column("x").unwrap(), &[Some(1.5), Some(10.0)]);
    }

    #[test]
    fn outer_join_unions_dates() {
        let mut a = Frame::new(vec![d(2023, 1, 1), d(2023, 4, 1)]).unwrap();
        a.insert_column("a", vec![Some(1.0), Some(2.0)]).unwrap();
        let mut b = Frame::new(vec![d(2023, 4, 1), d(2023, 7, 1)]).unwrap();
        b.insert_column("b", vec![Some(3.0), Some(4.0)]).unwrap();

        let joined = a.outer_join(&b).unwrap();
        assert_eq!(joined.index(), &[d(2023, 1, 1), d(2023, 4, 1), d(2023, 7, 1)]);
        assert_eq!(joined.column("a").unwrap(), &[Some(1.0), Some(2.0), None]);
        assert_eq!(joined.column("b").unwrap(), &[None, Some(3.0), Some(4.0)]);
    }

    #[test]
    fn series_drops_missing() {
        let mut frame = Frame::new(vec![d(2023, 1, 1), d(2023, 4, 1)]).unwrap();
        frame.insert_column("y", vec![None, Some(5.0)]).unwrap();
        let series = frame.series("y").unwrap();
        assert_eq!(series.index(), &[d(2023, 4, 1)]);
        assert_eq!(series.values(), &[5.0]);
    }
}
