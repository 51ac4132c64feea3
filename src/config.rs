//! Report configuration.
//!
//! Loaded once per run from a TOML file (default `./opsreport.toml`) and
//! passed explicitly into every component. Nothing here is global: the
//! water-year boundary, station lists and output paths all travel inside
//! `ReportConfig`.
//!
//! Relative paths in the file are resolved against the directory that
//! contains the configuration file, so a report directory can be moved
//! around as a unit.

use crate::model::ReportError;
use chrono::{Datelike, Month, NaiveDate};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "./opsreport.toml";

/// Environment variable naming the configuration file. May be set in `.env`.
pub const CONFIG_ENV_VAR: &str = "OPSREPORT_CONFIG";

const SUPPORTED_PLOT_FORMATS: &[&str] = &["png", "pdf", "svg"];

// ---------------------------------------------------------------------------
// Water year
// ---------------------------------------------------------------------------

/// First day of the water year. Defaults to October 1st.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WaterYearStart {
    #[serde(rename = "start_month", default = "default_wy_month")]
    pub month: u32,
    #[serde(rename = "start_day", default = "default_wy_day")]
    pub day: u32,
}

fn default_wy_month() -> u32 {
    10
}

fn default_wy_day() -> u32 {
    1
}

impl Default for WaterYearStart {
    fn default() -> Self {
        Self { month: 10, day: 1 }
    }
}

impl WaterYearStart {
    pub fn new(month: u32, day: u32) -> Result<Self, ReportError> {
        let start = Self { month, day };
        start.validate()?;
        Ok(start)
    }

    /// The start must exist in a leap year; Feb 29 is accepted.
    pub fn validate(&self) -> Result<(), ReportError> {
        if NaiveDate::from_ymd_opt(2000, self.month, self.day).is_none() {
            return Err(ReportError::Config(format!(
                "water year start {}/{} is not a calendar date",
                self.month, self.day
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reporting period
// ---------------------------------------------------------------------------

/// The calendar month a report is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub month: u32,
    pub year: i32,
}

impl ReportPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self, ReportError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(ReportError::InvalidPeriod { month, year });
        }
        Ok(Self { month, year })
    }

    /// Full month name, e.g. "December".
    pub fn month_name(&self) -> &'static str {
        month_name(self.month)
    }

    /// Upper-case three letter abbreviation, e.g. "DEC".
    pub fn month_abbr_upper(&self) -> String {
        self.month_name().get(..3).unwrap_or("").to_uppercase()
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    /// Every calendar day of the period, in order.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.first_day()
            .iter_days()
            .take(self.days_in_month() as usize)
            .collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// File name prefix used by every figure of the period, e.g. "202512".
    pub fn file_prefix(&self) -> String {
        format!("{}{:02}", self.year, self.month)
    }
}

/// Full English month name for 1-12; empty for anything else.
pub fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("")
}

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_csv_dir")]
    pub csv_dir: PathBuf,
    #[serde(default = "default_plots_dir")]
    pub plots_dir: PathBuf,
    #[serde(default = "default_template")]
    pub template: PathBuf,
    /// Daily `Date,Operating` schedule. Optional; auto-detected in
    /// `csv_dir` when absent.
    #[serde(default)]
    pub operations_csv: Option<PathBuf>,
    /// Raw field log of on/off times used to build the operations table.
    #[serde(default)]
    pub operations_log: Option<PathBuf>,
}

fn default_csv_dir() -> PathBuf {
    PathBuf::from("data/csv")
}

fn default_plots_dir() -> PathBuf {
    PathBuf::from("plots")
}

fn default_template() -> PathBuf {
    PathBuf::from("main.tex")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            csv_dir: default_csv_dir(),
            plots_dir: default_plots_dir(),
            template: default_template(),
            operations_csv: None,
            operations_log: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationsConfig {
    pub treatment: Vec<String>,
    pub control: Vec<String>,
    /// Stations whose precipitation column is a water-year running total.
    #[serde(default)]
    pub cumulative_precip: Vec<String>,
}

// ---------------------------------------------------------------------------
// Report settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportSettings {
    /// Document name stem on the control page, without month suffix,
    /// e.g. "PI25003_La_Sal_OpsReport".
    #[serde(default = "default_document_stem")]
    pub document_stem: String,
    #[serde(default = "default_plot_format")]
    pub plot_format: String,
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,
}

fn default_document_stem() -> String {
    "PI25003_La_Sal_OpsReport".to_string()
}

fn default_plot_format() -> String {
    "png".to_string()
}

fn default_title_prefix() -> String {
    "La Sal Operations Report".to_string()
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            document_stem: default_document_stem(),
            plot_format: default_plot_format(),
            title_prefix: default_title_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub water_year: WaterYearStart,
    pub stations: StationsConfig,
    #[serde(default)]
    pub report: ReportSettings,
}

impl ReportConfig {
    /// Parses and validates a configuration document. Paths are left as
    /// written; see `load_config` for resolution against a base directory.
    pub fn from_toml_str(text: &str) -> Result<Self, ReportError> {
        let config: ReportConfig =
            toml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        self.water_year.validate()?;

        if self.stations.treatment.is_empty() {
            return Err(ReportError::Config("no treatment stations configured".to_string()));
        }
        if self.stations.control.is_empty() {
            return Err(ReportError::Config("no control stations configured".to_string()));
        }
        if let Some(blank) = self
            .stations
            .treatment
            .iter()
            .chain(&self.stations.control)
            .find(|s| s.trim().is_empty())
        {
            return Err(ReportError::Config(format!("blank station name '{}'", blank)));
        }
        // Station names land in LaTeX captions, where braces would unbalance the group.
        if let Some(braced) = self
            .stations
            .treatment
            .iter()
            .chain(&self.stations.control)
            .chain(&self.stations.cumulative_precip)
            .find(|s| s.contains(['{', '}', '\\']))
        {
            return Err(ReportError::Config(format!(
                "station name '{}' contains a brace or backslash",
                braced
            )));
        }
        if !SUPPORTED_PLOT_FORMATS.contains(&self.report.plot_format.as_str()) {
            return Err(ReportError::Config(format!(
                "unsupported plot format '{}' (expected one of {:?})",
                self.report.plot_format, SUPPORTED_PLOT_FORMATS
            )));
        }
        Ok(())
    }

    /// Rewrites every relative path as `base.join(path)`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.paths.csv_dir);
        resolve(&mut self.paths.plots_dir);
        resolve(&mut self.paths.template);
        if let Some(p) = self.paths.operations_csv.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.paths.operations_log.as_mut() {
            resolve(p);
        }
    }
}

/// Reads, validates and path-resolves the configuration at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<ReportConfig, ReportError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, &e))?;
    let mut config = ReportConfig::from_toml_str(&text)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);
    Ok(config)
}

/// Picks the configuration file: explicit CLI value first, then
/// `OPSREPORT_CONFIG` (from the environment or `.env`), then the default.
pub fn resolve_config_path(cli_value: Option<&str>) -> PathBuf {
    if let Some(path) = cli_value {
        return PathBuf::from(path);
    }
    dotenv::dotenv().ok();
    std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
