//! Monthly report run.
//!
//! Loads the operating schedule and every configured station, writes the
//! schedule, precipitation and snow depth figures, then points the LaTeX
//! template at them. A station or pair that fails is recorded in the
//! returned `PipelineReport` and the run carries on with the rest.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::analysis::{Decumulator, PairedAggregator};
use crate::config::{ReportConfig, ReportPeriod};
use crate::ingest::operations::{
    load_operations, load_operations_log, operations_table_latex, write_operations_csv, OperatingDay,
};
use crate::ingest::station_csv::{load_station_table, ColumnKind};
use crate::logging::{self, Stage};
use crate::model::{DailySeries, MonthlySummary, ReportError};
use crate::render::{
    precipitation_stem, schedule_stem, snow_depth_stem, Figure, FigureSink, JsonFigureWriter,
    PrecipitationFigure, ScheduleFigure, SnowDepthFigure,
};
use crate::stations::{StationPair, StationRegistry};
use crate::template::{update_template_file, TemplateFigures, TemplateOutcome};

// ---------------------------------------------------------------------------
// Options and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Schedule CSV overriding the configured or auto-detected one.
    pub operations_csv: Option<PathBuf>,
    pub update_template: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            operations_csv: None,
            update_template: true,
        }
    }
}

/// Series loaded for one station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationData {
    pub snow_depth: Option<DailySeries>,
    /// Daily amounts; decumulated when the station reports a running total.
    pub precipitation: Option<DailySeries>,
    pub precipitation_decumulated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationOutcome {
    pub station: String,
    pub result: Result<StationData, ReportError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub pair: StationPair,
    pub result: Result<MonthlySummary, ReportError>,
    /// Image name of the boxplot figure, when one was written.
    pub image: Option<String>,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub title: String,
    pub period: ReportPeriod,
    /// Image names of every figure written, in order.
    pub figures: Vec<String>,
    pub stations: Vec<StationOutcome>,
    pub pairs: Vec<PairOutcome>,
    /// `None` when the template update was disabled.
    pub template: Option<Result<TemplateOutcome, ReportError>>,
}

impl PipelineReport {
    pub fn succeeded_pairs(&self) -> usize {
        self.pairs.iter().filter(|p| p.result.is_ok()).count()
    }

    pub fn failed_stations(&self) -> impl Iterator<Item = &StationOutcome> {
        self.stations.iter().filter(|s| s.result.is_err())
    }

    pub fn failed_pairs(&self) -> impl Iterator<Item = &PairOutcome> {
        self.pairs.iter().filter(|p| p.result.is_err())
    }

    /// One line per failed station and failed pair, stations first.
    pub fn failure_lines(&self) -> Vec<String> {
        let stations = self
            .failed_stations()
            .filter_map(|s| s.result.as_ref().err().map(|e| format!("Station {}: {}", s.station, e)));
        let pairs = self
            .failed_pairs()
            .filter_map(|p| p.result.as_ref().err().map(|e| format!("Pair {}: {}", p.pair.label(), e)));
        stations.chain(pairs).collect()
    }

    pub fn produced_any_figure(&self) -> bool {
        !self.figures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

/// Loads one station's table and extracts its snow depth and precipitation
/// series. A missing column leaves that series out; a station with neither
/// is an error.
pub fn load_station(
    config: &ReportConfig,
    registry: &StationRegistry,
    decumulator: &Decumulator,
    station: &str,
) -> Result<StationData, ReportError> {
    let table = load_station_table(&config.paths.csv_dir, station)?;
    if table.date_column().is_none() {
        return Err(ReportError::MissingColumn {
            station: station.to_string(),
            column: ColumnKind::Date.name().to_string(),
        });
    }

    let snow_depth = match table.series(ColumnKind::SnowDepth) {
        Ok(load) => Some(load.series),
        Err(e) => {
            logging::debug(Stage::Ingest, Some(station), &e.to_string());
            None
        }
    };

    let (precipitation, precipitation_decumulated) = match table.series(ColumnKind::Precipitation) {
        Ok(load) if registry.is_cumulative(station, &load.column) => {
            logging::debug(
                Stage::Decumulate,
                Some(station),
                &format!("Decumulating '{}' ({} readings)", load.column, load.series.len()),
            );
            (Some(decumulator.decumulate_series(&load.series)), true)
        }
        Ok(load) => (Some(load.series), false),
        Err(e) => {
            logging::debug(Stage::Ingest, Some(station), &e.to_string());
            (None, false)
        }
    };

    if snow_depth.is_none() && precipitation.is_none() {
        return Err(ReportError::MissingColumn {
            station: station.to_string(),
            column: format!("{} or {}", ColumnKind::SnowDepth.name(), ColumnKind::Precipitation.name()),
        });
    }

    Ok(StationData {
        snow_depth,
        precipitation,
        precipitation_decumulated,
    })
}

// ---------------------------------------------------------------------------
// Pairs
// ---------------------------------------------------------------------------

fn snow_depth_of<'a>(
    outcomes: &'a HashMap<&str, &StationOutcome>,
    station: &str,
) -> Result<&'a DailySeries, ReportError> {
    let outcome = outcomes
        .get(station)
        .ok_or_else(|| ReportError::StationFileNotFound(station.to_string()))?;
    match &outcome.result {
        Ok(data) => data.snow_depth.as_ref().ok_or_else(|| ReportError::MissingColumn {
            station: station.to_string(),
            column: ColumnKind::SnowDepth.name().to_string(),
        }),
        Err(e) => Err(e.clone()),
    }
}

fn summarize_pair(
    aggregator: &PairedAggregator,
    period: &ReportPeriod,
    pair: &StationPair,
    outcomes: &HashMap<&str, &StationOutcome>,
) -> Result<MonthlySummary, ReportError> {
    let treatment = snow_depth_of(outcomes, &pair.treatment)?;
    let control = snow_depth_of(outcomes, &pair.control)?;
    aggregator
        .aggregate(treatment, control)
        .ok_or_else(|| ReportError::NoData {
            pair: pair.label(),
            month: period.month,
        })
}

fn emit_snow_depth(
    sink: &mut dyn FigureSink,
    period: &ReportPeriod,
    pair: &StationPair,
    summary: &MonthlySummary,
) -> Result<String, ReportError> {
    let figure = SnowDepthFigure::from_summary(pair, summary).ok_or_else(|| ReportError::NoData {
        pair: pair.label(),
        month: period.month,
    })?;
    sink.emit(&snow_depth_stem(period, pair), &Figure::SnowDepth(figure))
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Runs the whole report for `period`, writing figure specs to the
/// configured plots directory.
pub fn run_pipeline(
    config: &ReportConfig,
    period: ReportPeriod,
    options: &PipelineOptions,
) -> Result<PipelineReport, ReportError> {
    let mut writer = JsonFigureWriter::new(&config.paths.plots_dir, &config.report.plot_format);
    run_pipeline_with_sink(config, period, options, &mut writer)
}

pub fn run_pipeline_with_sink(
    config: &ReportConfig,
    period: ReportPeriod,
    options: &PipelineOptions,
    sink: &mut dyn FigureSink,
) -> Result<PipelineReport, ReportError> {
    config.validate()?;
    let registry = StationRegistry::from_config(config);
    let decumulator = Decumulator::from_config(config);
    let title = format!("{} - {} {}", config.report.title_prefix, period.month_name(), period.year);
    logging::info(Stage::System, None, &format!("Generating {}", title));

    let mut report = PipelineReport {
        title,
        period,
        figures: Vec::new(),
        stations: Vec::new(),
        pairs: Vec::new(),
        template: None,
    };
    let mut template_figures = TemplateFigures::default();

    // 1. Operating schedule
    let explicit = options
        .operations_csv
        .as_deref()
        .or(config.paths.operations_csv.as_deref());
    let schedule = load_operations(explicit, &config.paths.csv_dir);
    let flags = schedule.daily_flags(&period);

    if schedule.covers(&period) {
        let figure = ScheduleFigure::new(&period, &flags);
        logging::info(
            Stage::Render,
            None,
            &format!("Operating schedule: {} of {} days operating", figure.operating_days(), flags.len()),
        );
        match sink.emit(&schedule_stem(&period), &Figure::OperatingSchedule(figure)) {
            Ok(image) => {
                report.figures.push(image.clone());
                template_figures.schedule = Some(image);
            }
            Err(e) => logging::log_failure(Stage::Render, "schedule", "write operating schedule figure", &e),
        }
    } else {
        logging::warn(
            Stage::Render,
            None,
            &format!(
                "No operating schedule records for {} {}; skipping schedule figure",
                period.month_name(),
                period.year
            ),
        );
    }

    // 2. Stations and precipitation
    for station in registry.all_stations() {
        let result = load_station(config, &registry, &decumulator, station);
        if let Err(e) = &result {
            logging::log_failure(Stage::Ingest, station, "load station", e);
        }
        report.stations.push(StationOutcome {
            station: station.to_string(),
            result,
        });
    }
    logging::log_batch_summary(
        Stage::Ingest,
        "stations",
        report.stations.len(),
        report.stations.iter().filter(|s| s.result.is_ok()).count(),
    );

    let mut precip = PrecipitationFigure::new(&period, &flags);
    for outcome in &report.stations {
        if let Ok(StationData {
            precipitation: Some(series),
            precipitation_decumulated,
            ..
        }) = &outcome.result
        {
            if !precip.add_station(&period, series, *precipitation_decumulated) {
                logging::debug(Stage::Render, Some(&outcome.station), "No precipitation in month");
            }
        }
    }
    if precip.stations.is_empty() {
        logging::warn(Stage::Render, None, "No precipitation data found for the month");
    } else {
        match sink.emit(&precipitation_stem(&period), &Figure::Precipitation(precip)) {
            Ok(image) => {
                report.figures.push(image.clone());
                template_figures.precipitation = Some(image);
            }
            Err(e) => logging::log_failure(Stage::Render, "precipitation", "write precipitation figure", &e),
        }
    }

    // 3. Snow depth pairs
    let aggregator = PairedAggregator::new(period);
    let by_station: HashMap<&str, &StationOutcome> =
        report.stations.iter().map(|s| (s.station.as_str(), s)).collect();
    let mut pairs = Vec::new();
    for pair in registry.pairs() {
        let label = pair.label();
        let mut image = None;
        let result = summarize_pair(&aggregator, &period, &pair, &by_station).and_then(|summary| {
            image = Some(emit_snow_depth(sink, &period, &pair, &summary)?);
            Ok(summary)
        });
        match (&result, &image) {
            (Ok(_), Some(name)) => {
                template_figures.snow_depth.push((pair.clone(), name.clone()));
                report.figures.push(name.clone());
            }
            (Err(e), _) => logging::log_failure(Stage::Aggregate, &label, "summarize pair", e),
            (Ok(_), None) => {}
        }
        pairs.push(PairOutcome { pair, result, image });
    }
    report.pairs = pairs;
    logging::log_batch_summary(Stage::Aggregate, "snow depth pairs", report.pairs.len(), report.succeeded_pairs());

    // 4. Template
    if options.update_template {
        let result = update_template_file(
            &config.paths.template,
            &period,
            &config.report.document_stem,
            &template_figures,
            &config.paths.plots_dir,
        );
        if let Err(e) = &result {
            logging::log_failure(Stage::Template, "template", "update template", e);
        }
        report.template = Some(result);
    }

    logging::info(
        Stage::System,
        None,
        &format!("Wrote {} figures for {} {}", report.figures.len(), period.month_name(), period.year),
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Operations table
// ---------------------------------------------------------------------------

/// Output of expanding the operators' field log for one month.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationsTable {
    pub days: Vec<OperatingDay>,
    pub csv_path: PathBuf,
    pub latex_path: PathBuf,
    pub latex: String,
}

/// Expands the field log into a daily schedule CSV in `csv_dir` and a
/// LaTeX on/off table next to the template.
pub fn build_operations_table(
    config: &ReportConfig,
    log_path: &std::path::Path,
    period: &ReportPeriod,
) -> Result<OperationsTable, ReportError> {
    let days = load_operations_log(log_path, period)?;
    if days.is_empty() {
        return Err(ReportError::Parse(format!(
            "{}: no operating entries for {} {}",
            log_path.display(),
            period.month_name(),
            period.year
        )));
    }

    std::fs::create_dir_all(&config.paths.csv_dir)
        .map_err(|e| ReportError::io(&config.paths.csv_dir, &e))?;
    let csv_path = config.paths.csv_dir.join("operations_schedule.csv");
    write_operations_csv(&days, &csv_path)?;

    let latex = operations_table_latex(&days);
    let latex_path = config
        .paths
        .template
        .parent()
        .map(|dir| dir.join("operations_table.tex"))
        .unwrap_or_else(|| PathBuf::from("operations_table.tex"));
    std::fs::write(&latex_path, &latex).map_err(|e| ReportError::io(&latex_path, &e))?;

    logging::info(
        Stage::Ingest,
        None,
        &format!(
            "Operations log expanded to {} days ({} operating)",
            days.len(),
            days.iter().filter(|d| d.operating).count()
        ),
    );
    Ok(OperationsTable {
        days,
        csv_path,
        latex_path,
        latex,
    })
}
