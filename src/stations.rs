/// Station registry for the operations report.
///
/// Holds the treatment and control stations named in the configuration and
/// the treatment × control pairs compared in the snow depth figures. This is
/// the single source of truth for station names: ingestion, figure naming
/// and template captions all take names from here.

use crate::config::ReportConfig;

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// Which side of the comparison a station sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationRole {
    /// Site downwind of the operation.
    Treatment,
    /// Nearby reference site outside the operation's influence.
    Control,
}

/// One treatment/control comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationPair {
    pub treatment: String,
    pub control: String,
}

impl StationPair {
    /// "La Sal Mtn vs Camp jackson"
    pub fn label(&self) -> String {
        format!("{} vs {}", self.treatment, self.control)
    }

    /// "La_Sal_Mtn_vs_Camp_jackson", used in figure file names.
    pub fn file_stem(&self) -> String {
        format!("{}_vs_{}", file_stem(&self.treatment), file_stem(&self.control))
    }
}

/// File-name-safe form of a station name: spaces and slashes become `_`.
pub fn file_stem(station: &str) -> String {
    station.replace([' ', '/'], "_")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationRegistry {
    treatment: Vec<String>,
    control: Vec<String>,
    cumulative_precip: Vec<String>,
}

impl StationRegistry {
    pub fn new(treatment: Vec<String>, control: Vec<String>, cumulative_precip: Vec<String>) -> Self {
        Self {
            treatment,
            control,
            cumulative_precip,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(
            config.stations.treatment.clone(),
            config.stations.control.clone(),
            config.stations.cumulative_precip.clone(),
        )
    }

    /// Treatment stations then control stations, each name once.
    pub fn all_stations(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for name in self.treatment.iter().chain(&self.control) {
            if !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        out
    }

    /// Every treatment × control combination, treatment-major, in
    /// configuration order.
    pub fn pairs(&self) -> Vec<StationPair> {
        self.treatment
            .iter()
            .flat_map(|t| {
                self.control.iter().map(move |c| StationPair {
                    treatment: t.clone(),
                    control: c.clone(),
                })
            })
            .collect()
    }

    pub fn role(&self, station: &str) -> Option<StationRole> {
        if self.treatment.iter().any(|s| s == station) {
            Some(StationRole::Treatment)
        } else if self.control.iter().any(|s| s == station) {
            Some(StationRole::Control)
        } else {
            None
        }
    }

    /// Whether a station's precipitation column is a running total that
    /// needs decumulating: configured explicitly, a SNOTEL site by name, or
    /// an "accumulation" column by header.
    pub fn is_cumulative(&self, station: &str, precip_header: &str) -> bool {
        self.cumulative_precip.iter().any(|s| s == station)
            || station.to_lowercase().contains("snotel")
            || precip_header.to_lowercase().contains("accum")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn la_sal() -> StationRegistry {
        StationRegistry::new(
            names(&["La Sal Mtn", "Lasal Mtn lower", "Gold Basin"]),
            names(&["Camp jackson", "Buckboard Flat", "Elke Ridge"]),
            names(&["Gold Basin"]),
        )
    }

    #[test]
    fn test_pairs_cover_every_combination_in_order() {
        let pairs = la_sal().pairs();
        assert_eq!(pairs.len(), 9);
        assert_eq!(pairs[0].label(), "La Sal Mtn vs Camp jackson");
        assert_eq!(pairs[1].label(), "La Sal Mtn vs Buckboard Flat");
        assert_eq!(pairs[8].label(), "Gold Basin vs Elke Ridge");
    }

    #[test]
    fn test_no_duplicate_pairs() {
        let mut seen = std::collections::HashSet::new();
        for pair in la_sal().pairs() {
            assert!(seen.insert(pair.label()), "duplicate pair '{}'", pair.label());
        }
    }

    #[test]
    fn test_file_stem_replaces_spaces_and_slashes() {
        assert_eq!(file_stem("La Sal Mtn"), "La_Sal_Mtn");
        assert_eq!(file_stem("Upper/Lower Site"), "Upper_Lower_Site");
        let pair = StationPair {
            treatment: "La Sal Mtn".to_string(),
            control: "Camp jackson".to_string(),
        };
        assert_eq!(pair.file_stem(), "La_Sal_Mtn_vs_Camp_jackson");
    }

    #[test]
    fn test_all_stations_lists_each_name_once() {
        let registry = StationRegistry::new(names(&["A", "B"]), names(&["B", "C"]), vec![]);
        assert_eq!(registry.all_stations(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_roles() {
        let registry = la_sal();
        assert_eq!(registry.role("Gold Basin"), Some(StationRole::Treatment));
        assert_eq!(registry.role("Elke Ridge"), Some(StationRole::Control));
        assert_eq!(registry.role("Moab"), None);
    }

    #[test]
    fn test_cumulative_detection() {
        let registry = la_sal();
        assert!(registry.is_cumulative("Gold Basin", "Precip (in)"), "configured station");
        assert!(registry.is_cumulative("Camp Jackson SNOTEL", "Precip (in)"), "SNOTEL by name");
        assert!(registry.is_cumulative("Elke Ridge", "Precipitation Accumulation (in)"), "by header");
        assert!(!registry.is_cumulative("Elke Ridge", "Precipitation Increment (in)"));
    }

    #[test]
    fn test_from_config_uses_configured_lists() {
        let config = ReportConfig::from_toml_str(
            "[stations]\ntreatment = [\"T1\"]\ncontrol = [\"C1\", \"C2\"]\n",
        )
        .unwrap();
        let registry = StationRegistry::from_config(&config);
        assert_eq!(registry.pairs().len(), 2);
        assert_eq!(registry.all_stations(), vec!["T1", "C1", "C2"]);
        assert_eq!(registry.role("T1"), Some(StationRole::Treatment));
    }
}
