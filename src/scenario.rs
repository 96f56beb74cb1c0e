//! Future values for the exogenous regressors over the forecast horizon.
//!
//! Two constructions exist: broadcasting historical per-quarter medians onto
//! the horizon, and taking the market-expectations survey medians from the
//! most recent vintage that covers the whole horizon.

use chrono::NaiveDate;

use crate::error::{ForecastError, Result};
use crate::frame::{Series, quarter_of};
use crate::services::SurveyObservation;

/// How the future values of a scenario-driving regressor are obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioSource {
    /// Historical median by quarter-of-year, broadcast onto the horizon.
    SeasonalMedian,
    /// Survey medians for the named indicator from the expectations feed.
    MarketExpectations { indicator: String },
}

/// Broadcasts per-quarter-of-year historical medians onto the horizon.
pub fn seasonal_median(history: &Series, horizon: &[NaiveDate]) -> Result<Vec<f64>> {
    if history.is_empty() {
        return Err(ForecastError::EmptyData);
    }

    let mut by_quarter: [Vec<f64>; 4] = Default::default();
    for (date, value) in history.index().iter().zip(history.values()) {
        by_quarter[quarter_of(*date) as usize - 1].push(*value);
    }

    horizon
        .iter()
        .map(|date| {
            let bucket = &mut by_quarter[quarter_of(*date) as usize - 1];
            if bucket.is_empty() {
                return Err(ForecastError::InvalidParameter(format!(
                    "no historical observations for Q{} of {:?}",
                    quarter_of(*date),
                    history.name()
                )));
            }
            Ok(median(bucket))
        })
        .collect()
}

/// Picks the survey vintage used to build an expectations scenario.
///
/// Counts, per vintage, the reference quarters that fall in the horizon or
/// on the anchor quarter (the last observed target date), and returns the
/// most recent vintage whose count reaches the horizon length. When no
/// vintage qualifies the feed cannot cover the horizon and the run stops.
pub fn select_vintage(
    observations: &[SurveyObservation],
    horizon: &[NaiveDate],
    anchor: NaiveDate,
    indicator: &str,
) -> Result<NaiveDate> {
    let h = horizon.len();
    let mut counts: Vec<(NaiveDate, usize)> = Vec::new();
    for obs in observations {
        if !horizon.contains(&obs.reference) && obs.reference != anchor {
            continue;
        }
        match counts.iter_mut().find(|(d, _)| *d == obs.survey_date) {
            Some((_, count)) => *count += 1,
            None => counts.push((obs.survey_date, 1)),
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count >= h)
        .map(|(date, _)| date)
        .max()
        .ok_or_else(|| ForecastError::NoSurveyVintage {
            indicator: indicator.to_string(),
            horizon: h,
        })
}

/// Survey medians for each horizon quarter from the selected vintage.
///
/// Slots the vintage does not cover come back as `None`; the forecaster
/// rejects them downstream if the variable is actually used.
pub fn survey_scenario(
    observations: &[SurveyObservation],
    horizon: &[NaiveDate],
    anchor: NaiveDate,
    indicator: &str,
) -> Result<Vec<Option<f64>>> {
    let vintage = select_vintage(observations, horizon, anchor, indicator)?;
    Ok(horizon
        .iter()
        .map(|date| {
            observations
                .iter()
                .find(|obs| obs.survey_date == vintage && obs.reference == *date)
                .map(|obs| obs.median)
        })
        .collect())
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::add_quarters;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn seasonal_history() -> Series {
        // Three years of {Q1:10, Q2:12, Q3:9, Q4:11} with one outlier year
        // that the median should ignore.
        let mut index = Vec::new();
        let mut values = Vec::new();
        for year in 2020..2023 {
            for (q, v) in [(1u32, 10.0), (4, 12.0), (7, 9.0), (10, 11.0)] {
                index.push(d(year, q));
                let outlier = if year == 2022 { 0.5 } else { 0.0 };
                values.push(v + outlier);
            }
        }
        Series::new("uci", index, values).unwrap()
    }

    #[test]
    fn medians_broadcast_by_quarter() {
        let history = seasonal_history();
        let horizon = vec![d(2023, 1), d(2023, 4), d(2023, 7), d(2023, 10)];
        let scenario = seasonal_median(&history, &horizon).unwrap();
        assert_eq!(scenario, vec![10.0, 12.0, 9.0, 11.0]);
    }

    #[test]
    fn horizon_order_drives_output_order() {
        let history = seasonal_history();
        let horizon = vec![d(2023, 7), d(2023, 10), d(2024, 1), d(2024, 4)];
        let scenario = seasonal_median(&history, &horizon).unwrap();
        assert_eq!(scenario, vec![9.0, 11.0, 10.0, 12.0]);
    }

    fn obs(survey: NaiveDate, reference: NaiveDate, median: f64) -> SurveyObservation {
        SurveyObservation {
            survey_date: survey,
            reference,
            median,
        }
    }

    #[test]
    fn most_recent_fully_covering_vintage_wins() {
        let horizon = vec![d(2025, 1), d(2025, 4), d(2025, 7), d(2025, 10)];
        let anchor = d(2024, 10);
        let d1 = NaiveDate::from_ymd_opt(2024, 11, 8).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 11, 15).unwrap();

        let mut observations: Vec<SurveyObservation> = horizon
            .iter()
            .map(|r| obs(d1, *r, 2.0))
            .collect();
        // Later vintage only covers two of the four quarters.
        observations.push(obs(d2, d(2025, 1), 2.1));
        observations.push(obs(d2, d(2025, 4), 2.2));

        let vintage = select_vintage(&observations, &horizon, anchor, "PIB Total").unwrap();
        assert_eq!(vintage, d1);
    }

    #[test]
    fn anchor_quarter_counts_toward_coverage() {
        let horizon = vec![d(2025, 1), d(2025, 4)];
        let anchor = d(2024, 10);
        let vintage_date = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        // Only one horizon quarter plus the anchor quarter: count 2 >= h 2.
        let observations = vec![
            obs(vintage_date, anchor, 1.9),
            obs(vintage_date, d(2025, 1), 2.0),
        ];
        let vintage = select_vintage(&observations, &horizon, anchor, "PIB Total").unwrap();
        assert_eq!(vintage, vintage_date);
    }

    #[test]
    fn no_coverage_is_an_explicit_error() {
        let horizon = vec![d(2025, 1), d(2025, 4), d(2025, 7), d(2025, 10)];
        let observations = vec![obs(
            NaiveDate::from_ymd_opt(2024, 11, 8).unwrap(),
            d(2025, 1),
            2.0,
        )];
        let err = select_vintage(&observations, &horizon, d(2024, 10), "IPCA").unwrap_err();
        assert_eq!(
            err,
            ForecastError::NoSurveyVintage {
                indicator: "IPCA".into(),
                horizon: 4
            }
        );
    }

    #[test]
    fn survey_scenario_orders_by_horizon() {
        let horizon = vec![d(2025, 1), d(2025, 4)];
        let anchor = d(2024, 10);
        let vintage_date = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        let observations = vec![
            obs(vintage_date, d(2025, 4), 2.4),
            obs(vintage_date, d(2025, 1), 2.1),
        ];
        let scenario = survey_scenario(&observations, &horizon, anchor, "PIB Total").unwrap();
        assert_eq!(scenario, vec![Some(2.1), Some(2.4)]);
    }

    #[test]
    fn add_quarters_builds_contiguous_horizons() {
        let start = d(2024, 10);
        let horizon: Vec<NaiveDate> = (1..=4).map(|i| add_quarters(start, i)).collect();
        assert_eq!(horizon, vec![d(2025, 1), d(2025, 4), d(2025, 7), d(2025, 10)]);
    }
}
