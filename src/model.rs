/// Reading, DailySeries, PairedSample, MonthlySummary, ReportError
/// core data structures and error handling for the operations report.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic beyond small accessors, no I/O, and no external
/// dependencies other than chrono dates.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single daily value from a station export.
///
/// `value` is `None` for a missing marker: blank cells, "NaN"/"null"
/// markers, unparseable numbers, or a negative decumulated increment.
/// Callers must never treat `None` as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Reading {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, value }
    }

    pub fn present(date: NaiveDate, value: f64) -> Self {
        Self { date, value: Some(value) }
    }

    pub fn missing(date: NaiveDate) -> Self {
        Self { date, value: None }
    }
}

/// An ordered, date-unique sequence of readings for one station and one
/// measured quantity (snow depth, precipitation).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailySeries {
    pub station: String,
    pub readings: Vec<Reading>,
}

impl DailySeries {
    pub fn new(station: impl Into<String>, readings: Vec<Reading>) -> Self {
        Self {
            station: station.into(),
            readings,
        }
    }

    /// Readings falling in `month` of any year, in series order.
    pub fn in_month(&self, month: u32) -> impl Iterator<Item = &Reading> {
        self.readings.iter().filter(move |r| r.date.month() == month)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Paired comparison types
// ---------------------------------------------------------------------------

/// One date on which both the treatment and the control station reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairedSample {
    pub date: NaiveDate,
    pub treatment: f64,
    pub control: f64,
}

impl PairedSample {
    pub fn difference(&self) -> f64 {
        self.treatment - self.control
    }
}

/// Means of the aligned treatment, control and difference values for the
/// reporting year. Drawn as the red dot on each boxplot panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Highlight {
    pub year: i32,
    pub treatment_mean: f64,
    pub control_mean: f64,
    pub difference_mean: f64,
}

/// Climatological comparison of one treatment/control pair for one
/// calendar month, pooled over every year on record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// Month name used as the boxplot group label, e.g. "January".
    pub label: String,
    /// Human-readable pair label, e.g. "La Sal Mtn vs Camp jackson".
    pub pair_label: String,
    pub treatment: Vec<f64>,
    pub control: Vec<f64>,
    pub difference: Vec<f64>,
    pub highlight: Option<Highlight>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while building the report.
///
/// Per-station and per-pair errors are collected by the pipeline rather
/// than aborting the run; only configuration errors are fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportError {
    /// Reading or writing a file failed.
    Io { path: String, message: String },
    /// The configuration file is missing, malformed or inconsistent.
    Config(String),
    /// No CSV export exists for the station.
    StationFileNotFound(String),
    /// The station table has no column matching the requested kind.
    MissingColumn { station: String, column: String },
    /// A table or value could not be parsed.
    Parse(String),
    /// Nothing to plot: one side of a pair has no data for the month, or
    /// the two sides never overlap.
    NoData { pair: String, month: u32 },
    /// A template substitution could not be built or applied.
    Template(String),
    /// The reporting period is outside the calendar.
    InvalidPeriod { month: u32, year: i32 },
}

impl ReportError {
    pub fn io(path: impl AsRef<std::path::Path>, err: &std::io::Error) -> Self {
        ReportError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io { path, message } => write!(f, "I/O error on {}: {}", path, message),
            ReportError::Config(msg) => write!(f, "Config error: {}", msg),
            ReportError::StationFileNotFound(station) => {
                write!(f, "Station file not found: {}", station)
            }
            ReportError::MissingColumn { station, column } => {
                write!(f, "Missing {} column for station: {}", column, station)
            }
            ReportError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ReportError::NoData { pair, month } => {
                write!(f, "No data for {} in month {}", pair, month)
            }
            ReportError::Template(msg) => write!(f, "Template error: {}", msg),
            ReportError::InvalidPeriod { month, year } => {
                write!(f, "Invalid reporting period: {}/{}", month, year)
            }
        }
    }
}

impl std::error::Error for ReportError {}
