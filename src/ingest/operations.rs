//! Operating schedule of the installation.
//!
//! Two inputs describe when the equipment ran:
//!
//! - a daily schedule CSV (`Date,Operating`) that drives the schedule and
//!   precipitation figures, and
//! - the operators' field log ("16-Dec" / "2135 on", "3-Dec to 5-Dec" /
//!   "off"), which is expanded to one row per day, written back out as the
//!   schedule CSV, and rendered as the report's on/off table.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::config::ReportPeriod;
use crate::ingest::station_csv::{parse_date, StationTable};
use crate::logging::{self, Stage};
use crate::model::ReportError;

static TIME_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\d{4})").ok());
static DAY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+").ok());

// ============================================================================
// Daily schedule
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingRecord {
    pub date: NaiveDate,
    pub operating: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationsSchedule {
    pub records: Vec<OperatingRecord>,
}

fn is_truthy(cell: &str) -> bool {
    matches!(
        cell.trim().trim_matches('"').to_ascii_lowercase().as_str(),
        "true" | "t" | "1" | "yes" | "y" | "on"
    )
}

impl OperationsSchedule {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parses a schedule table. The date column is the first header
    /// containing "date"; the operating column the first containing
    /// "operat" or "active". Without an operating column every listed
    /// date counts as operating.
    pub fn parse(text: &str) -> Result<Self, ReportError> {
        let table = StationTable::parse("operations", text)?;
        let date_col = table
            .headers
            .iter()
            .position(|h| h.to_lowercase().contains("date"))
            .ok_or_else(|| ReportError::MissingColumn {
                station: "operations".to_string(),
                column: "date".to_string(),
            })?;
        let op_col = table.headers.iter().position(|h| {
            let h = h.to_lowercase();
            h.contains("operat") || h.contains("active")
        });

        let records = table
            .rows
            .iter()
            .filter_map(|row| {
                let date = row.get(date_col).and_then(|c| parse_date(c))?;
                let operating = match op_col {
                    Some(i) => row.get(i).map(|c| is_truthy(c)).unwrap_or(false),
                    None => true,
                };
                Some(OperatingRecord { date, operating })
            })
            .collect();

        Ok(Self { records })
    }

    /// Whether any record falls within `period`.
    pub fn covers(&self, period: &ReportPeriod) -> bool {
        self.records.iter().any(|r| period.contains(r.date))
    }

    /// One flag per calendar day of `period`. A day is operating if any
    /// record for it is; days without records are not operating.
    pub fn daily_flags(&self, period: &ReportPeriod) -> Vec<(NaiveDate, bool)> {
        let mut by_day: BTreeMap<NaiveDate, bool> = BTreeMap::new();
        for r in self.records.iter().filter(|r| period.contains(r.date)) {
            *by_day.entry(r.date).or_insert(false) |= r.operating;
        }
        period
            .days()
            .into_iter()
            .map(|day| (day, by_day.get(&day).copied().unwrap_or(false)))
            .collect()
    }
}

/// First `*operation*.csv` or `*schedule*.csv` in `csv_dir`, by name.
pub fn find_operations_csv(csv_dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(csv_dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            name.ends_with(".csv") && (name.contains("operation") || name.contains("schedule"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Loads the schedule from `explicit`, else the first schedule-looking
/// file in `csv_dir`. A missing or unreadable schedule yields an empty one
/// and a warning: the report can still be built without shading.
pub fn load_operations(explicit: Option<&Path>, csv_dir: &Path) -> OperationsSchedule {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match find_operations_csv(csv_dir) {
            Some(p) => p,
            None => {
                logging::warn(Stage::Ingest, None, "No operations schedule CSV found; using empty schedule");
                return OperationsSchedule::empty();
            }
        },
    };

    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) => {
            logging::warn(
                Stage::Ingest,
                None,
                &format!("Operations file not readable ({}): {}", path.display(), e),
            );
            return OperationsSchedule::empty();
        }
    };

    match OperationsSchedule::parse(&text) {
        Ok(schedule) => schedule,
        Err(e) => {
            logging::warn(Stage::Ingest, None, &format!("Operations file {}: {}", path.display(), e));
            OperationsSchedule::empty()
        }
    }
}

// ============================================================================
// Field log
// ============================================================================

/// One day of the field log after expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatingDay {
    pub date: NaiveDate,
    pub on_time: Option<String>,
    pub off_time: Option<String>,
    pub operating: bool,
    pub status_text: String,
}

fn first_time(text: &str) -> Option<String> {
    TIME_RE
        .as_ref()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn first_day_number(text: &str) -> Option<u32> {
    DAY_RE.as_ref()?.find(text)?.as_str().parse().ok()
}

/// Days covered by "16-Dec" or "3-Dec to 5-Dec".
fn parse_day_range(date_text: &str, period: &ReportPeriod) -> Result<Vec<NaiveDate>, ReportError> {
    let bad = || ReportError::Parse(format!("unrecognised log date '{}'", date_text));
    let (start, end) = match date_text.split_once(" to ") {
        Some((a, b)) => (first_day_number(a).ok_or_else(bad)?, first_day_number(b).ok_or_else(bad)?),
        None => {
            let day = first_day_number(date_text).ok_or_else(bad)?;
            (day, day)
        }
    };
    if start > end {
        return Err(bad());
    }
    (start..=end)
        .map(|day| NaiveDate::from_ymd_opt(period.year, period.month, day).ok_or_else(bad))
        .collect()
}

/// Status fields of a log entry: (on time, off time, operating).
///
/// "on"/"off" alone mean the whole day. "0134 off" means the equipment ran
/// until 01:34, "2135 on" that it started at 21:35; both count as an
/// operating day. "1158 on / 2356 off" carries both times.
fn parse_status(status: &str) -> (Option<String>, Option<String>, bool) {
    let lower = status.trim().to_lowercase();
    if lower == "on" {
        return (None, None, true);
    }
    if lower == "off" {
        return (None, None, false);
    }

    if status.contains(" / ") {
        let mut on_time = None;
        let mut off_time = None;
        let mut operating = false;
        for part in status.split(" / ") {
            let Some(time) = first_time(part) else { continue };
            let part = part.to_lowercase();
            if part.contains("on") && !part.contains("off") {
                on_time = Some(time);
                operating = true;
            } else if part.contains("off") {
                off_time = Some(time);
            }
        }
        return (on_time, off_time, operating);
    }

    match first_time(status) {
        Some(time) if lower.contains("off") => (None, Some(time), true),
        Some(time) if lower.contains("on") => (Some(time), None, true),
        _ => (None, None, false),
    }
}

/// Expands one field-log entry into per-day rows.
pub fn parse_log_entry(
    date_text: &str,
    status_text: &str,
    period: &ReportPeriod,
) -> Result<Vec<OperatingDay>, ReportError> {
    let days = parse_day_range(date_text.trim(), period)?;
    let (on_time, off_time, operating) = parse_status(status_text);
    let status_text = match status_text.trim().to_lowercase().as_str() {
        "on" => "on".to_string(),
        "off" => "off".to_string(),
        _ => status_text.trim().to_string(),
    };

    Ok(days
        .into_iter()
        .map(|date| OperatingDay {
            date,
            on_time: on_time.clone(),
            off_time: off_time.clone(),
            operating,
            status_text: status_text.clone(),
        })
        .collect())
}

/// Expands a whole field log for `period`, sorted by date.
pub fn parse_operations_log(
    entries: &[(String, String)],
    period: &ReportPeriod,
) -> Result<Vec<OperatingDay>, ReportError> {
    let mut days = Vec::new();
    for (date_text, status_text) in entries {
        days.extend(parse_log_entry(date_text, status_text, period)?);
    }
    days.sort_by_key(|d| d.date);
    Ok(days)
}

/// Reads a two-column field log CSV (`DATE(S),WETA on/off`). A header row
/// is recognised by the absence of digits in its first cell.
pub fn load_operations_log(path: &Path, period: &ReportPeriod) -> Result<Vec<OperatingDay>, ReportError> {
    let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, &e))?;
    let entries: Vec<(String, String)> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| {
            let (date, status) = l.split_once(',')?;
            Some((date.trim().trim_matches('"').to_string(), status.trim().trim_matches('"').to_string()))
        })
        .filter(|(date, _)| date.chars().any(|c| c.is_ascii_digit()))
        .collect();
    parse_operations_log(&entries, period)
}

/// Writes the expanded log as a `Date,Operating` schedule.
pub fn write_operations_csv(days: &[OperatingDay], path: &Path) -> Result<(), ReportError> {
    let mut out = String::from("Date,Operating\n");
    for day in days {
        let _ = writeln!(out, "{},{}", day.date.format("%Y-%m-%d"), if day.operating { "True" } else { "False" });
    }
    std::fs::write(path, out).map_err(|e| ReportError::io(path, &e))
}

// ============================================================================
// LaTeX table
// ============================================================================

fn table_date(date: NaiveDate) -> String {
    date.format("%-d-%b").to_string()
}

/// Renders the on/off table. Consecutive days with the same operating
/// flag and times are merged into one "D-Mon to D-Mon" row; operating
/// rows are highlighted.
pub fn operations_table_latex(days: &[OperatingDay]) -> String {
    struct Row<'a> {
        start: NaiveDate,
        end: NaiveDate,
        first: &'a OperatingDay,
    }

    let mut rows: Vec<Row> = Vec::new();
    for day in days {
        match rows.last_mut() {
            Some(row)
                if row.first.operating == day.operating
                    && row.first.on_time == day.on_time
                    && row.first.off_time == day.off_time =>
            {
                row.end = day.date;
            }
            _ => rows.push(Row { start: day.date, end: day.date, first: day }),
        }
    }

    let mut lines = vec![
        "\\begin{longtable}{|p{5cm}|p{10cm}|}".to_string(),
        "\\hline".to_string(),
        "\\textbf{DATE(S)} & \\textbf{WETA on/off} \\\\".to_string(),
        "\\hline".to_string(),
        "\\endfirsthead".to_string(),
        "\\hline".to_string(),
        "\\textbf{DATE(S)} & \\textbf{WETA on/off} \\\\".to_string(),
        "\\hline".to_string(),
        "\\endhead".to_string(),
        "\\hline".to_string(),
        "\\endfoot".to_string(),
        "\\hline".to_string(),
        "\\endlastfoot".to_string(),
    ];

    for row in &rows {
        let dates = if row.start == row.end {
            table_date(row.start)
        } else {
            format!("{} to {}", table_date(row.start), table_date(row.end))
        };
        if row.first.operating {
            lines.push("\\rowcolor{greenhighlight}".to_string());
        }
        lines.push(format!("{} & {} \\\\", dates, row.first.status_text));
        lines.push("\\hline".to_string());
    }
    lines.push("\\end{longtable}".to_string());

    lines.join("\n")
}

// ============================================================================
// Tests
// ============================================================================
