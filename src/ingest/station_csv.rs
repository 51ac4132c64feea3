/// Station CSV exports
///
/// Reads the per-station tables exported from the SNOTEL/weather station
/// reports (`<csv_dir>/<station>.csv`) and turns one measurement column into
/// a `DailySeries`.
///
/// Exports are heterogeneous: column names differ between networks, some
/// files carry `#` comment preambles, and blank or "NaN" cells mark missing
/// values. Columns are found by keyword through `resolve_column`, which is
/// kept separate from the numeric code so it can be tested on its own.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::logging::{self, Stage};
use crate::model::{DailySeries, Reading, ReportError};

// ============================================================================
// Column resolution
// ============================================================================

/// The kinds of column the report needs from a station table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Date,
    SnowDepth,
    Precipitation,
}

impl ColumnKind {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Date => "date",
            ColumnKind::SnowDepth => "snow depth",
            ColumnKind::Precipitation => "precipitation",
        }
    }

    /// Keyword test on a header, case-insensitive.
    pub fn matches(&self, header: &str) -> bool {
        let h = header.to_lowercase();
        match self {
            ColumnKind::Date => ["date", "time", "timestamp"].iter().any(|k| h.contains(k)),
            ColumnKind::SnowDepth => h.contains("snow") && h.contains("depth"),
            ColumnKind::Precipitation => h.contains("precip") || h.contains("prcp"),
        }
    }
}

/// Index of the first header matching `kind`, if any.
pub fn resolve_column(headers: &[String], kind: ColumnKind) -> Option<usize> {
    headers.iter().position(|h| kind.matches(h))
}

// ============================================================================
// Cell parsing
// ============================================================================

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y", "%b %d, %Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parses the date part of a date or timestamp cell.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let s = cell.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Parses a numeric cell. Blank cells, missing markers and non-finite
/// numbers are `None`; nothing is ever coerced to zero.
pub fn parse_value(cell: &str) -> Option<f64> {
    let s = cell.trim().trim_matches('"').trim();
    match s.to_ascii_lowercase().as_str() {
        "" | "null" | "nan" | "na" | "n/a" | "m" | "-" | "--" => None,
        _ => s.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

/// Splits one CSV record, honouring double-quoted fields.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

// ============================================================================
// Station table
// ============================================================================

/// A station export as read from disk: cleaned headers and raw cells.
#[derive(Debug, Clone, PartialEq)]
pub struct StationTable {
    pub station: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A series extracted from a table, with ingestion bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesLoad {
    pub series: DailySeries,
    /// Header of the measurement column the values came from.
    pub column: String,
    /// Rows dropped because their date cell could not be parsed.
    pub skipped_rows: usize,
    /// Rows dropped because an earlier row had the same date.
    pub duplicate_dates: usize,
}

impl StationTable {
    /// Parses CSV text. Blank lines and `#` comment lines are skipped; the
    /// first remaining line is the header. Short rows are padded with empty
    /// (missing) cells.
    pub fn parse(station: &str, text: &str) -> Result<StationTable, ReportError> {
        let mut lines = text
            .lines()
            .map(|l| l.trim_start_matches('\u{feff}'))
            .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

        let headers = lines
            .next()
            .map(split_record)
            .ok_or_else(|| ReportError::Parse(format!("{}: empty table", station)))?;

        let rows = lines
            .map(|line| {
                let mut cells = split_record(line);
                if cells.len() < headers.len() {
                    cells.resize(headers.len(), String::new());
                }
                cells
            })
            .collect();

        Ok(StationTable {
            station: station.to_string(),
            headers,
            rows,
        })
    }

    /// Date column by header keyword; otherwise the first column, provided
    /// one of its first ten cells reads as a date.
    pub fn date_column(&self) -> Option<usize> {
        if let Some(idx) = resolve_column(&self.headers, ColumnKind::Date) {
            return Some(idx);
        }
        if self.headers.is_empty() {
            return None;
        }
        self.rows
            .iter()
            .take(10)
            .any(|row| row.first().and_then(|c| parse_date(c)).is_some())
            .then_some(0)
    }

    pub fn column(&self, kind: ColumnKind) -> Option<usize> {
        match kind {
            ColumnKind::Date => self.date_column(),
            _ => resolve_column(&self.headers, kind),
        }
    }

    /// Extracts the `kind` column as a date-ordered series.
    ///
    /// Duplicate dates keep the first row in file order; the rest are
    /// counted and logged.
    pub fn series(&self, kind: ColumnKind) -> Result<SeriesLoad, ReportError> {
        let missing = |column: ColumnKind| ReportError::MissingColumn {
            station: self.station.clone(),
            column: column.name().to_string(),
        };
        let date_col = self.date_column().ok_or_else(|| missing(ColumnKind::Date))?;
        let value_col = self.column(kind).ok_or_else(|| missing(kind))?;

        let mut seen = HashSet::new();
        let mut readings = Vec::with_capacity(self.rows.len());
        let mut skipped_rows = 0;
        let mut duplicate_dates = 0;

        for row in &self.rows {
            let Some(date) = row.get(date_col).and_then(|c| parse_date(c)) else {
                skipped_rows += 1;
                continue;
            };
            if !seen.insert(date) {
                duplicate_dates += 1;
                continue;
            }
            let value = row.get(value_col).and_then(|c| parse_value(c));
            readings.push(Reading::new(date, value));
        }
        readings.sort_by_key(|r| r.date);

        if duplicate_dates > 0 {
            logging::warn(
                Stage::Ingest,
                Some(&self.station),
                &format!("{} duplicate date rows dropped (kept first)", duplicate_dates),
            );
        }
        if skipped_rows > 0 {
            logging::debug(
                Stage::Ingest,
                Some(&self.station),
                &format!("{} rows without a parseable date skipped", skipped_rows),
            );
        }

        Ok(SeriesLoad {
            series: DailySeries::new(self.station.clone(), readings),
            column: self.headers[value_col].clone(),
            skipped_rows,
            duplicate_dates,
        })
    }
}

// ============================================================================
// Files
// ============================================================================

pub fn station_csv_path(csv_dir: &Path, station: &str) -> PathBuf {
    csv_dir.join(format!("{}.csv", station))
}

/// Loads `<csv_dir>/<station>.csv`.
pub fn load_station_table(csv_dir: &Path, station: &str) -> Result<StationTable, ReportError> {
    let path = station_csv_path(csv_dir, station);
    if !path.exists() {
        return Err(ReportError::StationFileNotFound(station.to_string()));
    }
    let text = std::fs::read_to_string(&path).map_err(|e| ReportError::io(&path, &e))?;
    StationTable::parse(station, &text)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_column_by_keyword() {
        let h = headers(&["Station Id", "Date", "Snow Depth (in)", "Precipitation Accumulation (in)"]);
        assert_eq!(resolve_column(&h, ColumnKind::Date), Some(1));
        assert_eq!(resolve_column(&h, ColumnKind::SnowDepth), Some(2));
        assert_eq!(resolve_column(&h, ColumnKind::Precipitation), Some(3));
    }

    #[test]
    fn test_snow_depth_needs_both_keywords() {
        let h = headers(&["Date", "Snow Water Equivalent (in)", "Depth of frost"]);
        assert_eq!(resolve_column(&h, ColumnKind::SnowDepth), None);
    }

    #[test]
    fn test_prcp_abbreviation_is_precipitation() {
        let h = headers(&["DATE", "PRCP"]);
        assert_eq!(resolve_column(&h, ColumnKind::Precipitation), Some(1));
    }

    #[test]
    fn test_parse_date_accepts_common_export_formats() {
        assert_eq!(parse_date("2025-12-01"), Some(d(2025, 12, 1)));
        assert_eq!(parse_date("12/01/2025"), Some(d(2025, 12, 1)));
        assert_eq!(parse_date("2025-12-01 06:00"), Some(d(2025, 12, 1)));
        assert_eq!(parse_date("2025-12-01T06:00:00-07:00"), Some(d(2025, 12, 1)));
        assert_eq!(parse_date("\"2025-12-01\""), Some(d(2025, 12, 1)));
        assert_eq!(parse_date("Station: La Sal"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_value_never_coerces_missing_to_zero() {
        assert_eq!(parse_value("12.5"), Some(12.5));
        assert_eq!(parse_value(" 0 "), Some(0.0));
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("null"), None);
        assert_eq!(parse_value("M"), None);
        assert_eq!(parse_value("abc"), None);
        assert_eq!(parse_value("inf"), None);
    }

    #[test]
    fn test_split_record_handles_quoted_commas() {
        let fields = split_record("2025-01-01,\"La Sal, Upper\",3.5");
        assert_eq!(fields, vec!["2025-01-01", "La Sal, Upper", "3.5"]);
    }

    #[test]
    fn test_parse_skips_comments_and_pads_short_rows() {
        let text = "# SNOTEL export\n# generated 2026-01-02\nDate,Snow Depth (in),Precip\n2025-12-01,20\n\n2025-12-02,21,0.4\n";
        let table = StationTable::parse("La Sal Mtn", text).unwrap();
        assert_eq!(table.headers, headers(&["Date", "Snow Depth (in)", "Precip"]));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["2025-12-01", "20", ""]);
    }

    #[test]
    fn test_empty_file_is_parse_error() {
        assert!(matches!(StationTable::parse("X", "\n# only comments\n"), Err(ReportError::Parse(_))));
    }

    #[test]
    fn test_series_keeps_first_duplicate_and_sorts_by_date() {
        let text = "Date,Snow Depth\n2025-12-02,22\n2025-12-01,20\n2025-12-02,99\nnot a date,5\n";
        let table = StationTable::parse("Gold Basin", text).unwrap();
        let load = table.series(ColumnKind::SnowDepth).unwrap();

        assert_eq!(load.duplicate_dates, 1);
        assert_eq!(load.skipped_rows, 1);
        assert_eq!(load.column, "Snow Depth");
        let dates: Vec<_> = load.series.readings.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2025, 12, 1), d(2025, 12, 2)]);
        assert_eq!(load.series.readings[1].value, Some(22.0), "first row for a date wins");
    }

    #[test]
    fn test_missing_cells_become_missing_readings() {
        let text = "Date,Snow Depth\n2025-12-01,\n2025-12-02,NaN\n2025-12-03,4\n";
        let load = StationTable::parse("T", text).unwrap().series(ColumnKind::SnowDepth).unwrap();
        let values: Vec<_> = load.series.readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![None, None, Some(4.0)]);
    }

    #[test]
    fn test_first_column_used_as_date_when_no_header_matches() {
        let text = "Day,Snow Depth\n2025-12-01,3\n";
        let table = StationTable::parse("T", text).unwrap();
        assert_eq!(table.date_column(), Some(0));
    }

    #[test]
    fn test_no_date_column_is_missing_column_error() {
        let text = "Label,Snow Depth\nfoo,3\n";
        let table = StationTable::parse("Elke Ridge", text).unwrap();
        match table.series(ColumnKind::SnowDepth) {
            Err(ReportError::MissingColumn { station, column }) => {
                assert_eq!(station, "Elke Ridge");
                assert_eq!(column, "date");
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_no_measurement_column_is_missing_column_error() {
        let text = "Date,Air Temp\n2025-12-01,3\n";
        let table = StationTable::parse("T", text).unwrap();
        assert!(matches!(
            table.series(ColumnKind::Precipitation),
            Err(ReportError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_station_csv_path_uses_station_name() {
        let p = station_csv_path(Path::new("/data/csv"), "Camp jackson");
        assert_eq!(p, PathBuf::from("/data/csv/Camp jackson.csv"));
    }
}
