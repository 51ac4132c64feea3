/// Figure output for the monthly report.
///
/// The pipeline builds a `Figure` for each image the report includes and
/// hands it to a `FigureSink`. The default sink writes each figure as a JSON
/// document next to where the chart image is expected, for the chart
/// renderer to pick up; the returned name is the image file the LaTeX
/// template should reference.

pub mod figures;

use std::fs;
use std::path::PathBuf;

use crate::logging::{self, Stage};
use crate::model::ReportError;

pub use figures::{
    precipitation_stem, schedule_stem, shared_y_limits, snow_depth_stem, Figure,
    PrecipitationFigure, ScheduleFigure, SnowDepthFigure,
};

/// Destination for finished figures.
pub trait FigureSink {
    /// Emits `figure` under `stem` and returns the image file name the
    /// report should reference.
    fn emit(&mut self, stem: &str, figure: &Figure) -> Result<String, ReportError>;
}

// ---------------------------------------------------------------------------
// JSON figure writer
// ---------------------------------------------------------------------------

pub struct JsonFigureWriter {
    dir: PathBuf,
    image_format: String,
}

impl JsonFigureWriter {
    pub fn new(dir: impl Into<PathBuf>, image_format: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            image_format: image_format.into(),
        }
    }

    pub fn spec_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.json", stem))
    }
}

impl FigureSink for JsonFigureWriter {
    fn emit(&mut self, stem: &str, figure: &Figure) -> Result<String, ReportError> {
        fs::create_dir_all(&self.dir).map_err(|e| ReportError::io(&self.dir, &e))?;

        let path = self.spec_path(stem);
        let body = serde_json::to_string_pretty(figure)
            .map_err(|e| ReportError::Parse(format!("figure {}: {}", stem, e)))?;
        fs::write(&path, body).map_err(|e| ReportError::io(&path, &e))?;

        let image = format!("{}.{}", stem, self.image_format);
        logging::debug(
            Stage::Render,
            Some(stem),
            &format!("Wrote figure spec {} for {}", path.display(), image),
        );
        Ok(image)
    }
}

// ---------------------------------------------------------------------------
// In-memory sink
// ---------------------------------------------------------------------------

/// Keeps emitted figures in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryFigureSink {
    pub image_format: String,
    pub figures: Vec<(String, Figure)>,
}

impl MemoryFigureSink {
    pub fn new(image_format: impl Into<String>) -> Self {
        Self {
            image_format: image_format.into(),
            figures: Vec::new(),
        }
    }

    pub fn get(&self, stem: &str) -> Option<&Figure> {
        self.figures.iter().find(|(s, _)| s == stem).map(|(_, f)| f)
    }
}

impl FigureSink for MemoryFigureSink {
    fn emit(&mut self, stem: &str, figure: &Figure) -> Result<String, ReportError> {
        self.figures.push((stem.to_string(), figure.clone()));
        Ok(format!("{}.{}", stem, self.image_format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportPeriod;
    use chrono::NaiveDate;

    fn schedule() -> Figure {
        let period = ReportPeriod::new(12, 2025).unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();
        Figure::OperatingSchedule(ScheduleFigure::new(&period, &[(day, true)]))
    }

    #[test]
    fn test_json_writer_creates_dir_and_returns_image_name() {
        let tmp = tempfile::tempdir().unwrap();
        let plots = tmp.path().join("plots");
        let mut writer = JsonFigureWriter::new(&plots, "png");

        let image = writer.emit("202512_OperatingSchedule_Report", &schedule()).unwrap();
        assert_eq!(image, "202512_OperatingSchedule_Report.png");

        let spec = writer.spec_path("202512_OperatingSchedule_Report");
        assert!(spec.exists(), "spec file should be written to {}", spec.display());
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(spec).unwrap()).unwrap();
        assert_eq!(json["kind"], "operating_schedule");
        assert_eq!(json["title"], "WETA Operating Schedule - December 2025");
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let mut sink = MemoryFigureSink::new("pdf");
        assert_eq!(sink.emit("a", &schedule()).unwrap(), "a.pdf");
        sink.emit("b", &schedule()).unwrap();
        let stems: Vec<&str> = sink.figures.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(stems, vec!["a", "b"]);
        assert!(sink.get("b").is_some());
        assert!(sink.get("c").is_none());
    }
}
