//! Analysis Settings
//! Fixed configuration shared by every pipeline stage.

use serde::Serialize;
use std::path::PathBuf;

/// Column holding the entity (country/region) name.
pub const LOCATION_COL: &str = "location";
/// Column holding the observation date.
pub const DATE_COL: &str = "date";
/// Derived death rate column (percentage).
pub const DEATH_RATE_COL: &str = "death_rate";
/// Derived vaccination rate column (percentage of population).
pub const VACCINATION_RATE_COL: &str = "vaccination_rate";

/// Prefix marking a per-period (daily) metric.
const DAILY_PREFIX: &str = "new_";

/// How gaps in a numeric column are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Per-period increment: gaps become zero.
    Daily,
    /// Running counter: interpolate, carry forward, then zero leading gaps.
    Cumulative,
}

impl FillPolicy {
    pub fn for_column(name: &str) -> Self {
        if name.starts_with(DAILY_PREFIX) {
            FillPolicy::Daily
        } else {
            FillPolicy::Cumulative
        }
    }
}

/// Immutable settings passed to each stage.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Ordered allow-list of entities kept after cleaning.
    pub entities: Vec<String>,
    pub numeric_columns: Vec<String>,
    /// Chart dimensions in pixels (width, height).
    pub chart_size: (u32, u32),
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("owid-covid-data.csv"),
            output_dir: PathBuf::from("charts"),
            entities: [
                "Kenya",
                "United States",
                "India",
                "United Kingdom",
                "South Africa",
                "Brazil",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            numeric_columns: [
                "total_cases",
                "new_cases",
                "total_deaths",
                "new_deaths",
                "total_vaccinations",
                "people_vaccinated",
                "people_fully_vaccinated",
                "population",
                "reproduction_rate",
                "stringency_index",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            chart_size: (1200, 700),
        }
    }
}

impl Settings {
    /// Check whether an entity is in the allow-list.
    pub fn is_allowed(&self, entity: &str) -> bool {
        self.entities.iter().any(|e| e == entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_columns_are_detected_by_prefix() {
        assert_eq!(FillPolicy::for_column("new_cases"), FillPolicy::Daily);
        assert_eq!(FillPolicy::for_column("new_deaths"), FillPolicy::Daily);
        assert_eq!(FillPolicy::for_column("total_cases"), FillPolicy::Cumulative);
        assert_eq!(
            FillPolicy::for_column("reproduction_rate"),
            FillPolicy::Cumulative
        );
    }

    #[test]
    fn default_allow_list_is_ordered() {
        let settings = Settings::default();
        assert_eq!(settings.entities[0], "Kenya");
        assert!(settings.is_allowed("India"));
        assert!(!settings.is_allowed("Atlantis"));
    }
}
