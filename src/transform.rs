//! Per-variable transformations selected by metadata codes.
//!
//! The metadata sheet tags every indicator with a code "1".."6"; anything
//! else is rejected. Transformations are null-aware: differencing leaves the
//! leading slots undefined and the log of a non-positive value is undefined.

use crate::error::{ForecastError, Result};

/// The closed set of stationarity transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformation {
    /// Code "1": level, unchanged.
    Identity,
    /// Code "2": first difference.
    Diff,
    /// Code "3": second difference.
    DiffTwice,
    /// Code "4": natural log.
    Log,
    /// Code "5": first difference of the log.
    LogDiff,
    /// Code "6": second difference of the log.
    LogDiffTwice,
}

impl Transformation {
    /// Maps a metadata code to a transformation.
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim() {
            "1" => Ok(Self::Identity),
            "2" => Ok(Self::Diff),
            "3" => Ok(Self::DiffTwice),
            "4" => Ok(Self::Log),
            "5" => Ok(Self::LogDiff),
            "6" => Ok(Self::LogDiffTwice),
            other => Err(ForecastError::InvalidTransformCode(other.to_string())),
        }
    }

    /// Applies the transformation, preserving length.
    pub fn apply(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        match self {
            Self::Identity => values.to_vec(),
            Self::Diff => diff(values),
            Self::DiffTwice => diff(&diff(values)),
            Self::Log => log(values),
            Self::LogDiff => diff(&log(values)),
            Self::LogDiffTwice => diff(&diff(&log(values))),
        }
    }
}

fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    out.push(None);
    out.extend(values.windows(2).map(|w| match (w[0], w[1]) {
        (Some(prev), Some(curr)) => Some(curr - prev),
        _ => None,
    }));
    out
}

fn log(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| v.filter(|x| *x > 0.0).map(f64::ln))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(
            Transformation::from_code("7"),
            Err(ForecastError::InvalidTransformCode("7".into()))
        );
        assert!(Transformation::from_code("").is_err());
        assert!(Transformation::from_code("identity").is_err());
    }

    #[test]
    fn all_six_codes_parse() {
        for code in ["1", "2", "3", "4", "5", "6"] {
            assert!(Transformation::from_code(code).is_ok(), "code {code}");
        }
    }

    #[test]
    fn differencing_shortens_defined_prefix() {
        let input = some(&[1.0, 3.0, 6.0, 10.0]);

        let once = Transformation::Diff.apply(&input);
        assert_eq!(once, vec![None, Some(2.0), Some(3.0), Some(4.0)]);

        let twice = Transformation::DiffTwice.apply(&input);
        assert_eq!(twice, vec![None, None, Some(1.0), Some(1.0)]);
    }

    #[test]
    fn log_requires_strictly_positive_values() {
        let out = Transformation::Log.apply(&[Some(1.0), Some(0.0), Some(-2.0), None]);
        assert_eq!(out[0], Some(0.0));
        assert_eq!(out[1], None);
        assert_eq!(out[2], None);
        assert_eq!(out[3], None);
    }

    #[test]
    fn log_diff_on_increasing_series() {
        let input = some(&[1.0, std::f64::consts::E]);
        let out = Transformation::LogDiff.apply(&input);
        assert_eq!(out[0], None);
        assert!((out[1].unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identity_keeps_missing_slots() {
        let input = vec![Some(1.0), None];
        assert_eq!(Transformation::Identity.apply(&input), input);
    }
}
