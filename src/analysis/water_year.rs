//! Water-year accounting.
//!
//! Cumulative snow/precipitation sensors reset once a year on the water
//! year boundary (October 1st by default), not on January 1st. A water year
//! is named after the calendar year in which it ends: 2025-10-01 through
//! 2026-09-30 is water year 2026.

use crate::config::WaterYearStart;
use chrono::{Datelike, NaiveDate};

/// Water year containing `date`.
///
/// Dates on or after the configured start month/day within their calendar
/// year belong to the next water year.
pub fn water_year(date: NaiveDate, start: WaterYearStart) -> i32 {
    if (date.month(), date.day()) >= (start.month, start.day) {
        date.year() + 1
    } else {
        date.year()
    }
}

/// Splits a date-sorted slice into `(water_year, start..end)` index ranges.
///
/// Because `water_year` is non-decreasing in date, each water year occupies
/// one contiguous range of a sorted input.
pub fn segments(dates: &[NaiveDate], start: WaterYearStart) -> Vec<(i32, std::ops::Range<usize>)> {
    let mut out: Vec<(i32, std::ops::Range<usize>)> = Vec::new();
    for (i, date) in dates.iter().enumerate() {
        let wy = water_year(*date, start);
        match out.last_mut() {
            Some((current, range)) if *current == wy => range.end = i + 1,
            _ => out.push((wy, i..i + 1)),
        }
    }
    out
}
