/// Time-series normalization and comparison for the operations report.
///
/// Everything in here is a pure function of its inputs: station series go
/// in, increments and summaries come out. File handling lives in `ingest`,
/// figure output in `render`.
///
/// Submodules:
/// - `water_year` — water-year numbering and segmentation of sorted dates.
/// - `decumulate` — cumulative running totals to daily increments.
/// - `paired`     — month-scoped treatment/control alignment and highlight.
/// - `boxplot`    — five-number summaries handed to the renderer.

pub mod boxplot;
pub mod decumulate;
pub mod paired;
pub mod water_year;

pub use decumulate::Decumulator;
pub use paired::{aggregate, PairedAggregator};
