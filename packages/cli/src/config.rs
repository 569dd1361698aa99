//! Detection run configuration.
//!
//! A [`DetectionConfig`] is read from TOML. The built-in default lives in
//! `config/default.toml` and is embedded at compile time.

use std::path::{Path, PathBuf};

use basel_hotspots_detector_models::{Strategy, StrategyKind};
use basel_hotspots_event_models::Crs;
use basel_hotspots_source::EventFilter;
use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors from reading a detection config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config lists no strategies")]
    NoStrategies,

    #[error("Config has no {0} strategy")]
    MissingStrategy(StrategyKind),

    #[error("No boundary configured; pass --boundary or set `boundary`")]
    MissingBoundary,
}

/// Everything a detection run needs besides the input data.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfig {
    /// Number of hotspots to keep per strategy; all when absent.
    #[serde(default)]
    pub top_n: Option<usize>,
    /// `GeoJSON` study-area boundary.
    #[serde(default)]
    pub boundary: Option<PathBuf>,
    /// CRS of the boundary coordinates; the source's CRS when absent.
    #[serde(default)]
    pub boundary_crs: Option<Crs>,
    /// CRS detection runs in; the source's CRS when absent.
    #[serde(default)]
    pub target_crs: Option<Crs>,
    #[serde(default)]
    pub filter: EventFilter,
    pub strategies: Vec<Strategy>,
}

impl DetectionConfig {
    /// Parses a config from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed or lists no
    /// strategies.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        if config.strategies.is_empty() {
            return Err(ConfigError::NoStrategies);
        }
        Ok(config)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// The embedded default config.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed.
    #[must_use]
    pub fn embedded() -> Self {
        Self::parse(DEFAULT_CONFIG)
            .unwrap_or_else(|e| panic!("Failed to parse embedded default.toml: {e}"))
    }

    /// Loads `path` if given, the embedded default otherwise.
    ///
    /// # Errors
    ///
    /// Same as [`DetectionConfig::from_path`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::embedded()), Self::from_path)
    }

    /// The strategy of `kind`, or the first configured one when `kind` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingStrategy`] if no strategy of `kind` is
    /// configured.
    pub fn strategy(&self, kind: Option<StrategyKind>) -> Result<&Strategy, ConfigError> {
        match kind {
            None => self.strategies.first().ok_or(ConfigError::NoStrategies),
            Some(kind) => self
                .strategies
                .iter()
                .find(|s| s.kind() == kind)
                .ok_or(ConfigError::MissingStrategy(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use basel_hotspots_detector_models::{CellSize, DistanceParams, GridParams};
    use basel_hotspots_source::ObservationWindow;

    use super::*;

    #[test]
    fn embedded_default_parses() {
        let config = DetectionConfig::embedded();
        assert_eq!(config.top_n, Some(10));
        assert!(config.boundary.is_none());
        assert_eq!(config.filter.observation_window, ObservationWindow::default());
        let kinds: Vec<StrategyKind> = config.strategies.iter().map(Strategy::kind).collect();
        assert_eq!(kinds, StrategyKind::all());
    }

    #[test]
    fn selects_strategies_by_kind() {
        let config = DetectionConfig::embedded();
        assert_eq!(config.strategy(None).unwrap().kind(), StrategyKind::Grid);
        assert_eq!(
            config.strategy(Some(StrategyKind::Distance)).unwrap(),
            &Strategy::Distance(DistanceParams::new(50.0, 8))
        );
    }

    #[test]
    fn reports_missing_strategy() {
        let config = DetectionConfig::parse(
            r#"
            [[strategies]]
            type = "grid"
            cell_size = { length = 100.0 }
            "#,
        )
        .unwrap();
        assert_eq!(
            config.strategies[0],
            Strategy::Grid(GridParams::new(CellSize::Length(100.0), 1.0))
        );
        assert!(config.top_n.is_none());
        assert!(config.filter.is_unrestricted());
        assert!(matches!(
            config.strategy(Some(StrategyKind::Kde)),
            Err(ConfigError::MissingStrategy(StrategyKind::Kde))
        ));
    }

    #[test]
    fn rejects_empty_and_unknown_settings() {
        assert!(matches!(
            DetectionConfig::parse("strategies = []"),
            Err(ConfigError::NoStrategies)
        ));
        assert!(matches!(
            DetectionConfig::parse("top = 3\nstrategies = []"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn parses_crs_and_boundary() {
        let config = DetectionConfig::parse(
            r#"
            boundary = "basel.geojson"
            boundary_crs = "wgs84"
            target_crs = "lv95"

            [[strategies]]
            type = "distance"
            radius = 40.0
            min_size = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.boundary, Some(PathBuf::from("basel.geojson")));
        assert_eq!(config.boundary_crs, Some(Crs::Wgs84));
        assert_eq!(config.target_crs, Some(Crs::Lv95));
    }
}
