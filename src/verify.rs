//! Station Data Verification Module
//!
//! Preflight check of the station exports named in the configuration:
//! which files exist, which columns the loader will pick, and whether each
//! station has rows in the reporting month.
//!
//! Run this before generating a report to see which figures will be empty.

use chrono::Utc;
use serde::Serialize;
use std::path::Path;

use crate::config::{ReportConfig, ReportPeriod};
use crate::ingest::station_csv::{load_station_table, parse_date, ColumnKind, StationTable};
use crate::model::ReportError;
use crate::stations::{StationRegistry, StationRole};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub period: String,
    pub results: Vec<StationVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationVerification {
    pub station: String,
    pub role: Option<String>,
    pub status: VerificationStatus,
    pub file_found: bool,
    pub date_column: Option<String>,
    pub snow_depth_column: Option<String>,
    pub precipitation_column: Option<String>,
    pub row_count: usize,
    pub rows_in_month: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

// ============================================================================
// Station Verification
// ============================================================================

fn header(table: &StationTable, index: Option<usize>) -> Option<String> {
    index.and_then(|i| table.headers.get(i)).cloned()
}

fn rows_in_month(table: &StationTable, date_col: usize, period: &ReportPeriod) -> usize {
    table
        .rows
        .iter()
        .filter_map(|row| row.get(date_col))
        .filter_map(|cell| parse_date(cell))
        .filter(|date| period.contains(*date))
        .count()
}

pub fn verify_station(csv_dir: &Path, station: &str, period: &ReportPeriod) -> StationVerification {
    let mut result = StationVerification {
        station: station.to_string(),
        role: None,
        status: VerificationStatus::Failed,
        file_found: false,
        date_column: None,
        snow_depth_column: None,
        precipitation_column: None,
        row_count: 0,
        rows_in_month: 0,
        error_message: None,
    };

    let table = match load_station_table(csv_dir, station) {
        Ok(table) => table,
        Err(e) => {
            result.file_found = !matches!(e, ReportError::StationFileNotFound(_));
            result.error_message = Some(e.to_string());
            return result;
        }
    };
    result.file_found = true;
    result.row_count = table.rows.len();
    result.snow_depth_column = header(&table, table.column(ColumnKind::SnowDepth));
    result.precipitation_column = header(&table, table.column(ColumnKind::Precipitation));

    let Some(date_col) = table.date_column() else {
        result.error_message = Some("No date column".to_string());
        return result;
    };
    result.date_column = header(&table, Some(date_col));
    result.rows_in_month = rows_in_month(&table, date_col, period);

    // Determine status
    let has_both = result.snow_depth_column.is_some() && result.precipitation_column.is_some();
    let has_any = result.snow_depth_column.is_some() || result.precipitation_column.is_some();
    result.status = if has_both && result.rows_in_month > 0 {
        VerificationStatus::Success
    } else if has_any {
        VerificationStatus::PartialSuccess
    } else {
        result.error_message = Some("No snow depth or precipitation column".to_string());
        VerificationStatus::Failed
    };

    result
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_verification(config: &ReportConfig, period: &ReportPeriod) -> VerificationReport {
    let registry = StationRegistry::from_config(config);
    let stations = registry.all_stations();

    let mut report = VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        period: format!("{} {}", period.month_name(), period.year),
        results: Vec::new(),
        summary: VerificationSummary {
            total: stations.len(),
            ..Default::default()
        },
    };

    println!("🔍 Verifying station exports in {}...", config.paths.csv_dir.display());
    for station in stations {
        print!("  {} ... ", station);
        let mut result = verify_station(&config.paths.csv_dir, station, period);
        result.role = registry.role(station).map(|role| match role {
            StationRole::Treatment => "treatment".to_string(),
            StationRole::Control => "control".to_string(),
        });

        match result.status {
            VerificationStatus::Success => {
                println!("✓ OK ({} rows, {} in {})", result.row_count, result.rows_in_month, report.period);
                report.summary.working += 1;
            }
            VerificationStatus::PartialSuccess => {
                let mut missing = Vec::new();
                if result.snow_depth_column.is_none() {
                    missing.push("snow depth");
                }
                if result.precipitation_column.is_none() {
                    missing.push("precipitation");
                }
                if result.rows_in_month == 0 {
                    missing.push("rows in month");
                }
                println!("⚠ Partial (missing: {:?})", missing);
                report.summary.working += 1;
            }
            VerificationStatus::Failed => {
                println!("✗ FAILED: {}", result.error_message.as_deref().unwrap_or("Unknown"));
                report.summary.failed += 1;
            }
        }

        report.results.push(result);
    }

    report
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY ({})", report.period);
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!(
        "Stations:    {}/{} working  ({} failed)",
        report.summary.working, report.summary.total, report.summary.failed
    );

    let success_rate = if report.summary.total > 0 {
        (report.summary.working as f64 / report.summary.total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Overall Success Rate: {:.1}% ({}/{})",
        success_rate, report.summary.working, report.summary.total
    );
    println!("═══════════════════════════════════════════════════════════");
}
