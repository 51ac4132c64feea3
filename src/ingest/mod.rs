/// Input files for the monthly report.
///
/// - `station_csv` — per-station sensor exports and column resolution.
/// - `operations`  — operating schedule CSV and the operators' field log.

pub mod operations;
pub mod station_csv;

pub use station_csv::{load_station_table, resolve_column, ColumnKind, SeriesLoad, StationTable};
