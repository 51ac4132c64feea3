//! Figure specifications handed to the chart renderer.
//!
//! Each figure carries everything needed to draw it (titles, axis labels,
//! values, shading, highlight markers and axis limits) so the renderer
//! makes no decisions about the data.

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::boxplot::BoxStats;
use crate::config::ReportPeriod;
use crate::model::{DailySeries, Highlight, MonthlySummary};
use crate::stations::StationPair;

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

pub fn schedule_stem(period: &ReportPeriod) -> String {
    format!("{}_OperatingSchedule_Report", period.file_prefix())
}

pub fn precipitation_stem(period: &ReportPeriod) -> String {
    format!("{}_PrecipSummary_Report_v02", period.file_prefix())
}

pub fn snow_depth_stem(period: &ReportPeriod, pair: &StationPair) -> String {
    format!("{}_SnowDepth_{}", period.file_prefix(), pair.file_stem())
}

// ---------------------------------------------------------------------------
// Operating schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub operating: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleFigure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub days: Vec<ScheduleDay>,
}

impl ScheduleFigure {
    pub fn new(period: &ReportPeriod, flags: &[(NaiveDate, bool)]) -> Self {
        Self {
            title: format!("WETA Operating Schedule - {} {}", period.month_name(), period.year),
            x_label: "Date".to_string(),
            y_label: "Operating Status".to_string(),
            days: flags
                .iter()
                .map(|&(date, operating)| ScheduleDay { date, operating })
                .collect(),
        }
    }

    pub fn operating_days(&self) -> usize {
        self.days.iter().filter(|d| d.operating).count()
    }
}

// ---------------------------------------------------------------------------
// Precipitation summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecipPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecipStation {
    pub station: String,
    /// The values were decumulated from a running total.
    pub decumulated: bool,
    pub points: Vec<PrecipPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecipitationFigure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Days drawn with operating shading.
    pub operating_days: Vec<NaiveDate>,
    pub stations: Vec<PrecipStation>,
}

impl PrecipitationFigure {
    pub fn new(period: &ReportPeriod, flags: &[(NaiveDate, bool)]) -> Self {
        Self {
            title: format!("Daily Precipitation Summary - {} {}", period.month_name(), period.year),
            x_label: "Date".to_string(),
            y_label: "Daily Precipitation (in)".to_string(),
            operating_days: flags.iter().filter(|(_, on)| *on).map(|(d, _)| *d).collect(),
            stations: Vec::new(),
        }
    }

    /// Adds the station's readings within `period`. Stations without any
    /// reading in the month are skipped, as there is no line to draw.
    pub fn add_station(&mut self, period: &ReportPeriod, series: &DailySeries, decumulated: bool) -> bool {
        let points: Vec<PrecipPoint> = series
            .readings
            .iter()
            .filter(|r| period.contains(r.date))
            .map(|r| PrecipPoint { date: r.date, value: r.value })
            .collect();
        if points.is_empty() {
            return false;
        }
        self.stations.push(PrecipStation {
            station: series.station.clone(),
            decumulated,
            points,
        });
        true
    }
}

// ---------------------------------------------------------------------------
// Snow depth boxplots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPanel {
    pub title: String,
    pub y_label: Option<String>,
    pub group_label: String,
    pub stats: BoxStats,
    /// Red marker for the reporting year.
    pub highlight: Option<f64>,
    /// Dashed reference line at zero.
    pub zero_line: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnowDepthFigure {
    pub pair_label: String,
    pub treatment: BoxPanel,
    pub control: BoxPanel,
    pub difference: BoxPanel,
    pub highlight: Option<Highlight>,
    /// Shared y-axis range for all three panels.
    pub y_limits: (f64, f64),
}

/// Axis range covering every value, padded by the larger of 10% of the
/// range and 5% of the magnitudes; kept at or above zero when all values
/// are non-negative.
pub fn shared_y_limits(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;

    let padding = (0.1 * (max - min)).max(0.05 * (min.abs() + max.abs()));
    let lower = if min >= 0.0 { (min - padding).max(0.0) } else { min - padding };
    Some((lower, max + padding))
}

impl SnowDepthFigure {
    /// `None` only if a distribution has no finite value, which a
    /// `MonthlySummary` from the aggregator never has.
    pub fn from_summary(pair: &StationPair, summary: &MonthlySummary) -> Option<Self> {
        let h = summary.highlight;
        let panel = |title: String, y_label: Option<&str>, values: &[f64], marker: Option<f64>, zero_line: bool| {
            BoxStats::from_values(values).map(|stats| BoxPanel {
                title,
                y_label: y_label.map(str::to_string),
                group_label: summary.label.clone(),
                stats,
                highlight: marker,
                zero_line,
            })
        };

        let treatment = panel(
            format!("Snow Depth: {} (TREATMENT)", pair.treatment),
            Some("Snow Depth (in)"),
            &summary.treatment,
            h.map(|h| h.treatment_mean),
            false,
        )?;
        let control = panel(
            format!("Snow Depth: {} (CONTROL)", pair.control),
            None,
            &summary.control,
            h.map(|h| h.control_mean),
            false,
        )?;
        let difference = panel(
            "Snow Depth: TREATMENT - CONTROL".to_string(),
            Some("Difference (in)"),
            &summary.difference,
            h.map(|h| h.difference_mean),
            true,
        )?;

        let highlight_values = h
            .map(|h| vec![h.treatment_mean, h.control_mean, h.difference_mean])
            .unwrap_or_default();
        let y_limits = shared_y_limits(
            summary
                .treatment
                .iter()
                .chain(&summary.control)
                .chain(&summary.difference)
                .copied()
                .chain(highlight_values),
        )?;

        Some(Self {
            pair_label: summary.pair_label.clone(),
            treatment,
            control,
            difference,
            highlight: h,
            y_limits,
        })
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Figure {
    OperatingSchedule(ScheduleFigure),
    Precipitation(PrecipitationFigure),
    SnowDepth(SnowDepthFigure),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reading;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn pair() -> StationPair {
        StationPair {
            treatment: "La Sal Mtn".to_string(),
            control: "Camp jackson".to_string(),
        }
    }

    #[test]
    fn test_figure_stems_match_report_naming() {
        let period = ReportPeriod::new(1, 2026).unwrap();
        assert_eq!(schedule_stem(&period), "202601_OperatingSchedule_Report");
        assert_eq!(precipitation_stem(&period), "202601_PrecipSummary_Report_v02");
        assert_eq!(snow_depth_stem(&period, &pair()), "202601_SnowDepth_La_Sal_Mtn_vs_Camp_jackson");
    }

    #[test]
    fn test_y_limits_clamp_at_zero_for_non_negative_values() {
        let (lo, hi) = shared_y_limits([2.0, 10.0]).unwrap();
        // range 8, padding max(0.8, 0.6)
        assert!((lo - 1.2).abs() < 1e-12, "lower {lo}");
        assert!((hi - 10.8).abs() < 1e-12, "upper {hi}");

        let (lo, _) = shared_y_limits([0.0, 1.0]).unwrap();
        assert_eq!(lo, 0.0);
    }

    #[test]
    fn test_y_limits_extend_below_negative_values() {
        let (lo, hi) = shared_y_limits([-4.0, 6.0]).unwrap();
        assert!((lo - -5.0).abs() < 1e-12);
        assert!((hi - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_y_limits_of_nothing() {
        assert!(shared_y_limits(std::iter::empty()).is_none());
    }

    #[test]
    fn test_snow_depth_figure_from_summary() {
        let summary = MonthlySummary {
            label: "January".to_string(),
            pair_label: "La Sal Mtn vs Camp jackson".to_string(),
            treatment: vec![10.0, 12.0],
            control: vec![8.0, 8.0],
            difference: vec![2.0, 4.0],
            highlight: Some(Highlight {
                year: 2025,
                treatment_mean: 11.0,
                control_mean: 8.0,
                difference_mean: 3.0,
            }),
        };
        let fig = SnowDepthFigure::from_summary(&pair(), &summary).unwrap();

        assert_eq!(fig.treatment.title, "Snow Depth: La Sal Mtn (TREATMENT)");
        assert_eq!(fig.control.title, "Snow Depth: Camp jackson (CONTROL)");
        assert_eq!(fig.difference.title, "Snow Depth: TREATMENT - CONTROL");
        assert_eq!(fig.treatment.highlight, Some(11.0));
        assert_eq!(fig.difference.highlight, Some(3.0));
        assert!(fig.difference.zero_line);
        assert_eq!(fig.treatment.group_label, "January");
        assert_eq!(fig.difference.stats.median, 3.0);
        assert!(fig.y_limits.0 <= 2.0 && fig.y_limits.1 >= 12.0);
    }

    #[test]
    fn test_precipitation_figure_keeps_only_period_points() {
        let period = ReportPeriod::new(12, 2025).unwrap();
        let flags = vec![(d(2025, 12, 1), true), (d(2025, 12, 2), false)];
        let mut fig = PrecipitationFigure::new(&period, &flags);
        assert_eq!(fig.operating_days, vec![d(2025, 12, 1)]);

        let series = DailySeries::new(
            "Gold Basin",
            vec![
                Reading::present(d(2025, 11, 30), 0.1),
                Reading::present(d(2025, 12, 1), 0.2),
                Reading::missing(d(2025, 12, 2)),
            ],
        );
        assert!(fig.add_station(&period, &series, true));
        assert_eq!(fig.stations[0].points.len(), 2);
        assert_eq!(fig.stations[0].points[1].value, None, "missing stays missing");

        let old = DailySeries::new("Old", vec![Reading::present(d(2020, 12, 1), 1.0)]);
        assert!(!fig.add_station(&period, &old, false));
        assert_eq!(fig.stations.len(), 1);
    }

    #[test]
    fn test_figure_serializes_with_kind_tag() {
        let period = ReportPeriod::new(12, 2025).unwrap();
        let fig = Figure::OperatingSchedule(ScheduleFigure::new(&period, &[(d(2025, 12, 1), true)]));
        let json = serde_json::to_value(&fig).unwrap();
        assert_eq!(json["kind"], "operating_schedule");
        assert_eq!(json["days"][0]["date"], "2025-12-01");
        assert_eq!(json["days"][0]["operating"], true);
    }
}
