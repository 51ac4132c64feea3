//! Treatment/control pairing for one calendar month.
//!
//! The comparison is climatological: every occurrence of the target month
//! across the whole record feeds the distributions, so a station pair with
//! ten winters of data yields ten Januaries' worth of values. Only the
//! highlight point is specific to the reporting year.

use crate::config::{month_name, ReportPeriod};
use crate::model::{DailySeries, Highlight, MonthlySummary, PairedSample, Reading};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// Aggregator bound to one reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedAggregator {
    period: ReportPeriod,
}

impl PairedAggregator {
    pub fn new(period: ReportPeriod) -> Self {
        Self { period }
    }

    pub fn aggregate(&self, treatment: &DailySeries, control: &DailySeries) -> Option<MonthlySummary> {
        aggregate(treatment, control, self.period.month, Some(self.period.year))
    }
}

/// Inner join of two reading sets on exact date.
///
/// Dates missing from either side, or carrying a missing value on either
/// side, are dropped. Output is in ascending date order. If a side repeats
/// a date, its first reading wins.
pub fn align<'a>(
    treatment: impl IntoIterator<Item = &'a Reading>,
    control: impl IntoIterator<Item = &'a Reading>,
) -> Vec<PairedSample> {
    let control_by_date = present_by_date(control);

    present_by_date(treatment)
        .into_iter()
        .filter_map(|(date, t)| {
            control_by_date.get(&date).map(|&c| PairedSample {
                date,
                treatment: t,
                control: c,
            })
        })
        .collect()
}

/// The reading's value when present and finite; NaN and infinities count
/// as missing.
fn finite(reading: &Reading) -> Option<f64> {
    reading.value.filter(|v| v.is_finite())
}

fn present_by_date<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> BTreeMap<NaiveDate, f64> {
    let mut map = BTreeMap::new();
    for r in readings {
        if let Some(v) = finite(r) {
            map.entry(r.date).or_insert(v);
        }
    }
    map
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Highlight means over the paired samples of one year, if any.
pub fn highlight_for_year(samples: &[PairedSample], year: i32) -> Option<Highlight> {
    let in_year: Vec<&PairedSample> = samples.iter().filter(|s| s.date.year() == year).collect();
    Some(Highlight {
        year,
        treatment_mean: mean(in_year.iter().map(|s| s.treatment))?,
        control_mean: mean(in_year.iter().map(|s| s.control))?,
        difference_mean: mean(in_year.iter().map(|s| s.difference()))?,
    })
}

/// Builds the month's treatment, control and difference distributions.
///
/// Returns `None` ("no data") when either station has no non-missing value
/// in `target_month`, or when the two stations never report on the same
/// date in that month. When `target_year` is given but the stations share
/// no date in that year, the summary is returned without a highlight.
pub fn aggregate(
    treatment: &DailySeries,
    control: &DailySeries,
    target_month: u32,
    target_year: Option<i32>,
) -> Option<MonthlySummary> {
    let t_values: Vec<f64> = treatment.in_month(target_month).filter_map(finite).collect();
    let c_values: Vec<f64> = control.in_month(target_month).filter_map(finite).collect();

    if t_values.is_empty() || c_values.is_empty() {
        return None;
    }

    let paired = align(treatment.in_month(target_month), control.in_month(target_month));
    if paired.is_empty() {
        return None;
    }

    let highlight = target_year.and_then(|year| highlight_for_year(&paired, year));

    Some(MonthlySummary {
        label: month_name(target_month).to_string(),
        pair_label: format!("{} vs {}", treatment.station, control.station),
        treatment: t_values,
        control: c_values,
        difference: paired.iter().map(PairedSample::difference).collect(),
        highlight,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
