//! Monthly update of the LaTeX report template.
//!
//! Each substitution targets one recognisable piece of the document (figure
//! paths, captions, the coverage sentence, the control-page file name) and
//! reports whether it found its target. A substitution that finds nothing
//! leaves the document untouched and the remaining ones still apply.

use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::config::ReportPeriod;
use crate::logging::{self, Stage};
use crate::model::ReportError;
use crate::stations::StationPair;

/// One snow depth figure environment; group 1 is the image file.
const SNOW_BLOCK: &str = r"\\begin\{figure\}\[h!\]\s*\\centering\s*\\includegraphics\[width=0\.95\\textwidth\]\{([^}]+)\}\s*\\caption\{(?:[^{}\\]|\\.)+\}\s*\\end\{figure\}";

static WIDE_GRAPHIC_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\\includegraphics\[width=0\.85\\textwidth\]\{[^}]+\}").ok());
static OPS_CAPTION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\\caption\{WETA operating schedule during [^}]+\}").ok());
static PRECIP_CAPTION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\\caption\{Summary of daily accumulated precipitation[^}]+\}").ok());
static COVERAGE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"This report covers \d+ days from \d+/\d+/\d+ to \d+/\d+/\d+\.").ok()
});
static FOCUS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)the focus of this report is on the \w+ \d+ operating period\.").ok()
});
static SNOW_RUN_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!(r"{SNOW_BLOCK}(?:\s*{SNOW_BLOCK})*")).ok());
static SNOW_BLOCK_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!(r"{SNOW_BLOCK}\s*")).ok());
static GRAPHIC_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\\includegraphics(?:\[[^\]]*\])?\{([^}]+)\}").ok());

// ---------------------------------------------------------------------------
// Inputs and outcome
// ---------------------------------------------------------------------------

/// Image names produced for this month, as the template should reference
/// them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateFigures {
    pub schedule: Option<String>,
    pub precipitation: Option<String>,
    pub snow_depth: Vec<(StationPair, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitution {
    pub name: &'static str,
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOutcome {
    pub content: String,
    pub substitutions: Vec<Substitution>,
    pub duplicates_removed: usize,
}

impl TemplateOutcome {
    pub fn unmatched(&self) -> impl Iterator<Item = &Substitution> {
        self.substitutions.iter().filter(|s| !s.applied)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Escapes the characters LaTeX treats specially in running text.
pub fn latex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn replace_nth(content: &mut String, re: Option<&Regex>, n: usize, replacement: &str) -> bool {
    let Some(re) = re else { return false };
    let range = match re.find_iter(content).nth(n) {
        Some(m) => m.range(),
        None => return false,
    };
    content.replace_range(range, replacement);
    true
}

fn replace_first(content: &mut String, re: Option<&Regex>, replacement: &str) -> bool {
    replace_nth(content, re, 0, replacement)
}

/// Figure environment for one treatment/control boxplot.
pub fn snow_figure_block(pair: &StationPair, period: &ReportPeriod, image: &str) -> String {
    let month = period.month_name();
    format!(
        "\\begin{{figure}}[h!]\n  \\centering\n  \\includegraphics[width=0.95\\textwidth]{{{image}}}\n  \\caption{{Box and whisker plots demonstrating SNOTEL-measured climatological {month} snow depth at (top left) {treatment}, and (top right) {control}. The difference in monthly snow depth is shown in the bottom panel. The red circle in each panel indicates values for {month} {year}.}}\n\\end{{figure}}",
        treatment = latex_escape(&pair.treatment),
        control = latex_escape(&pair.control),
        year = period.year,
    )
}

/// Replaces the first run of consecutive snow depth figures with one figure
/// per entry of `figures`. Returns false when the template has no snow depth
/// figure or there is nothing to put in its place.
pub fn replace_snow_figures(
    content: &mut String,
    period: &ReportPeriod,
    figures: &[(StationPair, String)],
) -> bool {
    if figures.is_empty() {
        return false;
    }
    let blocks: Vec<String> = figures
        .iter()
        .map(|(pair, image)| snow_figure_block(pair, period, image))
        .collect();
    replace_first(content, SNOW_RUN_RE.as_ref(), &blocks.join("\n\n"))
}

/// Drops every snow depth figure whose image already appeared earlier in the
/// document. Returns the new text and how many figures were dropped.
pub fn remove_duplicate_snow_figures(content: &str) -> (String, usize) {
    let Some(re) = SNOW_BLOCK_RE.as_ref() else {
        return (content.to_string(), 0);
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    let mut removed = 0;
    for caps in re.captures_iter(content) {
        let (Some(whole), Some(image)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !seen.insert(image.as_str()) {
            out.push_str(&content[last..whole.start()]);
            last = whole.end();
            removed += 1;
        }
    }
    out.push_str(&content[last..]);
    (out, removed)
}

/// Image files referenced by `\includegraphics` for which neither the image
/// nor its figure spec exists in `plots_dir`.
pub fn missing_images(content: &str, plots_dir: &Path) -> Vec<String> {
    let Some(re) = GRAPHIC_RE.as_ref() else {
        return Vec::new();
    };
    let mut missing: Vec<String> = Vec::new();
    for caps in re.captures_iter(content) {
        let Some(name) = caps.get(1).map(|m| m.as_str()) else { continue };
        let image = plots_dir.join(name);
        let spec = image.with_extension("json");
        if !image.exists() && !spec.exists() && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    missing
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Applies every monthly substitution to `content`.
pub fn update_template(
    content: &str,
    period: &ReportPeriod,
    document_stem: &str,
    figures: &TemplateFigures,
) -> Result<TemplateOutcome, ReportError> {
    let mut text = content.to_string();
    let mut substitutions = Vec::new();
    let month = period.month_name();
    let year = period.year;

    let applied = match &figures.schedule {
        Some(image) => replace_first(
            &mut text,
            WIDE_GRAPHIC_RE.as_ref(),
            &format!("\\includegraphics[width=0.85\\textwidth]{{{image}}}"),
        ),
        None => false,
    };
    substitutions.push(Substitution { name: "operations figure", applied });

    let applied = replace_first(
        &mut text,
        OPS_CAPTION_RE.as_ref(),
        &format!(
            "\\caption{{WETA operating schedule during {month} {year}. Green shading indicates periods of operation.}}"
        ),
    );
    substitutions.push(Substitution { name: "operations caption", applied });

    let applied = match &figures.precipitation {
        Some(image) => replace_nth(
            &mut text,
            WIDE_GRAPHIC_RE.as_ref(),
            1,
            &format!("\\includegraphics[width=0.85\\textwidth]{{{image}}}"),
        ),
        None => false,
    };
    substitutions.push(Substitution { name: "precipitation figure", applied });

    let applied = replace_first(
        &mut text,
        PRECIP_CAPTION_RE.as_ref(),
        "\\caption{Summary of daily accumulated precipitation at reporting weather and SNOTEL stations.}",
    );
    substitutions.push(Substitution { name: "precipitation caption", applied });

    let applied = replace_snow_figures(&mut text, period, &figures.snow_depth);
    substitutions.push(Substitution { name: "snow depth figures", applied });

    let applied = replace_first(
        &mut text,
        COVERAGE_RE.as_ref(),
        &format!(
            "This report covers {} days from {:02}/01/{} to {:02}/{:02}/{}.",
            period.days_in_month(),
            period.month,
            year,
            period.month,
            period.days_in_month(),
            year
        ),
    );
    substitutions.push(Substitution { name: "coverage dates", applied });

    let applied = replace_first(
        &mut text,
        FOCUS_RE.as_ref(),
        &format!("the focus of this report is on the {month} {year} operating period."),
    );
    substitutions.push(Substitution { name: "focus month", applied });

    let stem = latex_escape(document_stem);
    let doc_re = Regex::new(&format!(r"{}\\_[^}}]+\.pdf", regex::escape(&stem)))
        .map_err(|e| ReportError::Template(format!("document name pattern: {}", e)))?;
    let applied = replace_first(
        &mut text,
        Some(&doc_re),
        &format!("{}\\_{}{}\\_v01.pdf", stem, period.month_abbr_upper(), year),
    );
    substitutions.push(Substitution { name: "document name", applied });

    let (text, duplicates_removed) = remove_duplicate_snow_figures(&text);

    Ok(TemplateOutcome {
        content: text,
        substitutions,
        duplicates_removed,
    })
}

/// Updates the template file in place and logs what changed.
pub fn update_template_file(
    path: &Path,
    period: &ReportPeriod,
    document_stem: &str,
    figures: &TemplateFigures,
    plots_dir: &Path,
) -> Result<TemplateOutcome, ReportError> {
    let content = fs::read_to_string(path).map_err(|e| ReportError::io(path, &e))?;
    let outcome = update_template(&content, period, document_stem, figures)?;

    for missing in outcome.unmatched() {
        logging::warn(
            Stage::Template,
            Some(missing.name),
            "No match in template; left unchanged",
        );
    }
    if outcome.duplicates_removed > 0 {
        logging::info(
            Stage::Template,
            None,
            &format!("Removed {} duplicate snow depth figures", outcome.duplicates_removed),
        );
    }
    for image in missing_images(&outcome.content, plots_dir) {
        logging::warn(
            Stage::Template,
            Some(&image),
            &format!("Referenced image not found in {}", plots_dir.display()),
        );
    }

    fs::write(path, &outcome.content).map_err(|e| ReportError::io(path, &e))?;
    let applied = outcome.substitutions.iter().filter(|s| s.applied).count();
    logging::info(
        Stage::Template,
        None,
        &format!(
            "Updated {} for {} {} ({}/{} substitutions)",
            path.display(),
            period.month_name(),
            period.year,
            applied,
            outcome.substitutions.len()
        ),
    );
    Ok(outcome)
}
