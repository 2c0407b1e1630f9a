//! Day-over-day and week-over-week trends from persisted values.

use chrono::{Days, NaiveDate};

/// Prior values required before `trend_7d` is reported.
pub const MIN_WEEKLY_SAMPLES: usize = 3;

/// Rounds to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `value - value(date - 1)`, or `None` when the previous day was not
/// persisted.
#[must_use]
pub fn trend_1d(date: NaiveDate, value: u8, prior: &[(NaiveDate, u8)]) -> Option<f64> {
    let yesterday = date.checked_sub_days(Days::new(1))?;
    prior
        .iter()
        .find(|(d, _)| *d == yesterday)
        .map(|(_, v)| round2(f64::from(value) - f64::from(*v)))
}

/// `value - mean(values in date-7..=date-1)`, or `None` with fewer than
/// [`MIN_WEEKLY_SAMPLES`] persisted days in that week.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trend_7d(date: NaiveDate, value: u8, prior: &[(NaiveDate, u8)]) -> Option<f64> {
    let start = date.checked_sub_days(Days::new(7))?;
    let week: Vec<f64> = prior
        .iter()
        .filter(|(d, _)| *d >= start && *d < date)
        .map(|(_, v)| f64::from(*v))
        .collect();
    if week.len() < MIN_WEEKLY_SAMPLES {
        return None;
    }
    let mean = week.iter().sum::<f64>() / week.len() as f64;
    Some(round2(f64::from(value) - mean))
}
