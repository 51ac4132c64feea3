//! Cumulative-to-daily conversion for running-total sensors.
//!
//! SNOTEL-style precipitation gauges report a water-year-to-date total.
//! The daily amount is the difference between consecutive totals within the
//! same water year; the first reading of each water year is taken as the
//! day's amount (the gauge is reset to zero at the boundary).
//!
//! A negative difference is a sensor correction or mid-year reset, not
//! negative rain. It becomes a missing value, never zero.

use crate::analysis::water_year;
use crate::config::{ReportConfig, WaterYearStart};
use crate::model::{DailySeries, Reading};

/// Converts cumulative series into daily increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decumulator {
    start: WaterYearStart,
}

impl Decumulator {
    pub fn new(start: WaterYearStart) -> Self {
        Self { start }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.water_year)
    }

    /// One increment per input reading, at the same index as its input.
    ///
    /// Readings are processed in date order (stable for equal dates).
    /// Within a water year the increment is the current value minus the
    /// nearest earlier non-missing value; a missing reading yields a
    /// missing increment without breaking the chain for later days. A
    /// reading with no earlier non-missing value in its water year, other
    /// than the segment's first reading, is missing.
    pub fn decumulate(&self, readings: &[Reading]) -> Vec<Reading> {
        let mut order: Vec<usize> = (0..readings.len()).collect();
        order.sort_by_key(|&i| readings[i].date);

        let sorted_dates: Vec<_> = order.iter().map(|&i| readings[i].date).collect();
        let mut out: Vec<Reading> = readings.iter().map(|r| Reading::missing(r.date)).collect();

        for (_, range) in water_year::segments(&sorted_dates, self.start) {
            let mut previous: Option<f64> = None;

            for (pos, &idx) in order[range].iter().enumerate() {
                let current = readings[idx].value.filter(|v| v.is_finite());

                let increment = if pos == 0 {
                    current
                } else {
                    match (current, previous) {
                        (Some(v), Some(p)) => Some(v - p),
                        _ => None,
                    }
                };

                if current.is_some() {
                    previous = current;
                }

                out[idx].value = increment.filter(|inc| *inc >= 0.0);
            }
        }

        out
    }

    /// Decumulates a whole station series, keeping its station name.
    pub fn decumulate_series(&self, series: &DailySeries) -> DailySeries {
        DailySeries::new(series.station.clone(), self.decumulate(&series.readings))
    }
}

/// Functional form of [`Decumulator::decumulate`].
pub fn decumulate(readings: &[Reading], start: WaterYearStart) -> Vec<Reading> {
    Decumulator::new(start).decumulate(readings)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn values(out: &[Reading]) -> Vec<Option<f64>> {
        out.iter().map(|r| r.value).collect()
    }

    fn oct1() -> Decumulator {
        Decumulator::new(WaterYearStart::default())
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        assert!(oct1().decumulate(&[]).is_empty());
    }

    #[test]
    fn test_increasing_series_gives_forward_differences() {
        let input = vec![
            Reading::present(d(2025, 11, 1), 2.0),
            Reading::present(d(2025, 11, 2), 2.5),
            Reading::present(d(2025, 11, 3), 4.0),
            Reading::present(d(2025, 11, 4), 4.25),
        ];
        let out = oct1().decumulate(&input);
        assert_eq!(values(&out), vec![Some(2.0), Some(0.5), Some(1.5), Some(0.25)]);
    }

    #[test]
    fn test_negative_increment_becomes_missing_not_negative() {
        let input = vec![
            Reading::present(d(2025, 10, 1), 5.0),
            Reading::present(d(2025, 10, 2), 3.0),
        ];
        let out = oct1().decumulate(&input);
        assert_eq!(values(&out), vec![Some(5.0), None]);
    }

    #[test]
    fn test_single_negative_delta_does_not_corrupt_neighbours() {
        let input = vec![
            Reading::present(d(2025, 12, 1), 10.0),
            Reading::present(d(2025, 12, 2), 11.0),
            Reading::present(d(2025, 12, 3), 10.5), // correction
            Reading::present(d(2025, 12, 4), 12.0),
            Reading::present(d(2025, 12, 5), 12.5),
        ];
        let out = oct1().decumulate(&input);
        assert_eq!(out[0].value, Some(10.0));
        assert_eq!(out[1].value, Some(1.0));
        assert_eq!(out[2].value, None, "negative delta must be marked missing");
        assert_eq!(out[4].value, Some(0.5));
    }

    #[test]
    fn test_water_year_boundary_restarts_first_reading_rule() {
        let input = vec![
            Reading::present(d(2025, 9, 29), 30.0),
            Reading::present(d(2025, 9, 30), 31.0),
            Reading::present(d(2025, 10, 1), 0.25),
            Reading::present(d(2025, 10, 2), 0.75),
        ];
        let out = oct1().decumulate(&input);
        assert_eq!(values(&out), vec![Some(30.0), Some(1.0), Some(0.25), Some(0.5)]);
    }

    #[test]
    fn test_sept_30_and_oct_1_alone_each_keep_raw_value() {
        let input = vec![
            Reading::present(d(2025, 9, 30), 31.0),
            Reading::present(d(2025, 10, 1), 0.2),
        ];
        let out = oct1().decumulate(&input);
        assert_eq!(values(&out), vec![Some(31.0), Some(0.2)]);
    }

    #[test]
    fn test_single_reading_segment_is_raw_value() {
        let out = oct1().decumulate(&[Reading::present(d(2026, 3, 15), 17.3)]);
        assert_eq!(values(&out), vec![Some(17.3)]);
    }

    #[test]
    fn test_gap_in_dates_is_spanned_not_filled() {
        let input = vec![
            Reading::present(d(2026, 1, 1), 8.0),
            Reading::present(d(2026, 1, 5), 9.5),
        ];
        let out = oct1().decumulate(&input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].value, Some(1.5));
    }

    #[test]
    fn test_missing_value_propagates_without_breaking_chain() {
        let input = vec![
            Reading::present(d(2026, 2, 1), 10.0),
            Reading::missing(d(2026, 2, 2)),
            Reading::present(d(2026, 2, 3), 10.75),
        ];
        let out = oct1().decumulate(&input);
        assert_eq!(values(&out), vec![Some(10.0), None, Some(0.75)]);
    }

    #[test]
    fn test_leading_missing_in_segment_leaves_next_reading_missing() {
        let input = vec![
            Reading::missing(d(2025, 10, 1)),
            Reading::present(d(2025, 10, 2), 0.3),
            Reading::present(d(2025, 10, 3), 0.5),
        ];
        let out = oct1().decumulate(&input);
        assert_eq!(out[0].value, None);
        assert_eq!(out[1].value, None, "no valid predecessor in segment");
        assert!((out[2].value.unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_unsorted_input_is_aligned_back_to_input_order() {
        let input = vec![
            Reading::present(d(2025, 11, 3), 4.0),
            Reading::present(d(2025, 11, 1), 1.0),
            Reading::present(d(2025, 11, 2), 3.0),
        ];
        let out = oct1().decumulate(&input);
        assert_eq!(out[0].date, d(2025, 11, 3));
        assert_eq!(values(&out), vec![Some(1.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_equal_dates_keep_input_order() {
        let input = vec![
            Reading::present(d(2025, 11, 2), 8.0),
            Reading::present(d(2025, 11, 1), 5.0),
            Reading::present(d(2025, 11, 1), 7.0),
        ];
        let out = oct1().decumulate(&input);
        // 5.0 precedes 7.0 on 11-01, so 7.0 is a step of 2.0 and not a drop.
        assert_eq!(values(&out), vec![Some(1.0), Some(5.0), Some(2.0)]);

        let swapped = vec![Reading::present(d(2025, 11, 1), 7.0), Reading::present(d(2025, 11, 1), 5.0)];
        assert_eq!(
            values(&oct1().decumulate(&swapped)),
            vec![Some(7.0), None],
            "same-day readings must not be reordered by value"
        );
    }

    #[test]
    fn test_decumulate_series_keeps_station_name() {
        let series = DailySeries::new("Gold Basin", vec![Reading::present(d(2025, 10, 1), 1.0)]);
        let out = oct1().decumulate_series(&series);
        assert_eq!(out.station, "Gold Basin");
        assert_eq!(out.len(), 1);
    }
}
