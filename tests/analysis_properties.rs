/// Behavioural checks of the decumulation and pairing rules through the
/// public API, independent of any file input.

use chrono::NaiveDate;

use opsreport::analysis::decumulate::decumulate;
use opsreport::analysis::{aggregate, Decumulator, PairedAggregator};
use opsreport::config::{ReportPeriod, WaterYearStart};
use opsreport::model::{DailySeries, Reading};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn values(readings: &[Reading]) -> Vec<Option<f64>> {
    readings.iter().map(|r| r.value).collect()
}

#[test]
fn test_increasing_totals_become_forward_differences() {
    let raw = vec![
        Reading::present(d(2025, 11, 1), 1.0),
        Reading::present(d(2025, 11, 2), 1.5),
        Reading::present(d(2025, 11, 3), 2.25),
        Reading::present(d(2025, 11, 4), 4.0),
    ];
    let out = decumulate(&raw, WaterYearStart::default());
    assert_eq!(values(&out), vec![Some(1.0), Some(0.5), Some(0.75), Some(1.75)]);
}

#[test]
fn test_single_drop_is_missing_only_where_it_happens() {
    let raw = vec![
        Reading::present(d(2025, 11, 1), 2.0),
        Reading::present(d(2025, 11, 2), 3.0),
        Reading::present(d(2025, 11, 3), 2.5),
        Reading::present(d(2025, 11, 4), 3.5),
    ];
    let out = decumulate(&raw, WaterYearStart::default());
    assert_eq!(values(&out), vec![Some(2.0), Some(1.0), None, Some(1.0)]);
}

#[test]
fn test_water_year_boundary_restarts_the_total() {
    let raw = vec![
        Reading::present(d(2025, 9, 29), 30.0),
        Reading::present(d(2025, 9, 30), 31.0),
        Reading::present(d(2025, 10, 1), 0.5),
        Reading::present(d(2025, 10, 2), 0.75),
    ];
    let out = Decumulator::new(WaterYearStart::default()).decumulate(&raw);
    assert_eq!(values(&out), vec![Some(30.0), Some(1.0), Some(0.5), Some(0.25)]);
}

#[test]
fn test_decrease_after_first_reading_is_missing() {
    let raw = vec![Reading::present(d(2025, 10, 1), 5.0), Reading::present(d(2025, 10, 2), 3.0)];
    let out = decumulate(&raw, WaterYearStart::default());
    assert_eq!(values(&out), vec![Some(5.0), None]);
}

#[test]
fn test_custom_water_year_start() {
    let start = WaterYearStart::new(7, 15).unwrap();
    let raw = vec![
        Reading::present(d(2025, 7, 14), 10.0),
        Reading::present(d(2025, 7, 15), 1.0),
    ];
    let out = decumulate(&raw, start);
    assert_eq!(values(&out), vec![Some(10.0), Some(1.0)], "July 15 opens a new segment");
}

#[test]
fn test_pairing_example_month() {
    let treatment = DailySeries::new(
        "T",
        vec![Reading::present(d(2025, 1, 5), 10.0), Reading::present(d(2025, 1, 6), 12.0)],
    );
    let control = DailySeries::new(
        "C",
        vec![Reading::present(d(2025, 1, 5), 8.0), Reading::present(d(2025, 1, 6), 8.0)],
    );

    let aggregator = PairedAggregator::new(ReportPeriod::new(1, 2025).unwrap());
    let first = aggregator.aggregate(&treatment, &control).unwrap();
    let second = aggregator.aggregate(&treatment, &control).unwrap();

    assert_eq!(first.difference, vec![2.0, 4.0]);
    let h = first.highlight.unwrap();
    assert_eq!((h.treatment_mean, h.control_mean, h.difference_mean), (11.0, 8.0, 3.0));
    assert_eq!(first, second, "repeat calls must be identical");
}

#[test]
fn test_empty_side_means_no_data() {
    let treatment = DailySeries::new("T", vec![Reading::present(d(2025, 2, 5), 10.0)]);
    let control = DailySeries::new("C", vec![Reading::present(d(2025, 1, 5), 8.0)]);
    assert!(aggregate(&treatment, &control, 1, Some(2025)).is_none());
}
