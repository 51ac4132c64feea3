//! Box-and-whisker statistics for the snow depth comparison figures.
//!
//! Quartiles use linear interpolation between order statistics; whiskers
//! reach the most extreme data point within 1.5 × IQR of the box, and
//! anything beyond is reported as a flier.

use serde::Serialize;

const WHISKER_IQR_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub count: usize,
    pub mean: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub fliers: Vec<f64>,
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Value at quantile `q` (0.0 to 1.0) of an ascending slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Returns the value at the given quantile, or `None` for no finite input.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        None
    } else {
        Some(quantile_sorted(&sorted, q))
    }
}

impl BoxStats {
    /// Summarises `values`, ignoring non-finite entries. `None` when
    /// nothing finite remains.
    pub fn from_values(values: &[f64]) -> Option<BoxStats> {
        let sorted = sorted_finite(values);
        if sorted.is_empty() {
            return None;
        }

        let q1 = quantile_sorted(&sorted, 0.25);
        let median = quantile_sorted(&sorted, 0.5);
        let q3 = quantile_sorted(&sorted, 0.75);
        let iqr = q3 - q1;
        let low_fence = q1 - WHISKER_IQR_FACTOR * iqr;
        let high_fence = q3 + WHISKER_IQR_FACTOR * iqr;

        let inside: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|v| *v >= low_fence && *v <= high_fence)
            .collect();
        // Whiskers never retract inside the box.
        let whisker_low = inside.first().copied().unwrap_or(q1).min(q1);
        let whisker_high = inside.last().copied().unwrap_or(q3).max(q3);

        let fliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < low_fence || *v > high_fence)
            .collect();

        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;

        Some(BoxStats {
            count: sorted.len(),
            mean,
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            fliers,
        })
    }
}
