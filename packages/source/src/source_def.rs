//! Config-driven data source definition.
//!
//! [`SourceDefinition`] captures everything unique about a CSV export in a
//! serializable config struct: its delimiter, coordinate system, and which
//! columns hold the event attributes. A single generic loader handles every
//! source.

use basel_hotspots_event_models::{AccidentSeverity, Crs, TimePrecision};
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::loader::Row;
use crate::parsing::{
    parse_coordinate_pair, parse_integer, parse_number, parse_severity, parse_timestamp,
    timestamp_from_parts,
};

// ── Top-level source definition ──────────────────────────────────────────

/// A complete, config-driven data source definition.
///
/// Loaded from TOML files embedded at compile time.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"basel_accidents"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Field delimiter (default: comma).
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Coordinate system of the `x`/`y` columns.
    pub crs: Crs,
    /// Column name mappings.
    pub fields: FieldMapping,
    /// Placeholder measurement value to drop, if the export uses one.
    #[serde(default)]
    pub weight_sentinel: Option<WeightSentinel>,
    /// Whether a `0` coordinate means "no location". Defaults to `true` for
    /// LV95, where 0 lies far outside Switzerland, and `false` otherwise.
    #[serde(default)]
    pub zero_is_missing: Option<bool>,
}

const fn default_delimiter() -> char {
    ','
}

/// Maps source-specific CSV column names to event attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    /// Identifier column. Row numbers are used when absent.
    pub id: Option<String>,
    /// Easting / longitude column.
    pub x: String,
    /// Northing / latitude column.
    pub y: String,
    /// How to extract the `occurred_at` timestamp.
    pub occurred_at: Option<TimestampExtractor>,
    /// Category column (e.g. road type or accident type).
    pub category: Option<String>,
    /// Accident severity column.
    pub severity: Option<String>,
    /// Numeric weight column (e.g. a noise level).
    pub weight: Option<String>,
}

/// How to extract the `occurred_at` timestamp from a CSV row.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimestampExtractor {
    /// Single datetime column.
    Simple {
        /// Column name.
        field: String,
        /// `chrono` format string; RFC 3339 and ISO 8601 are tried when it
        /// does not match.
        format: Option<String>,
    },
    /// Separate year, month and hour columns.
    YearMonthHour {
        year: String,
        month: Option<String>,
        hour: Option<String>,
    },
}

/// A placeholder measurement that stands for "no data".
///
/// Values within `tolerance` of `value` are treated as missing and the row
/// is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WeightSentinel {
    pub value: f64,
    pub tolerance: f64,
}

impl WeightSentinel {
    /// Whether `weight` is the placeholder.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn matches(&self, weight: f64) -> bool {
        weight == self.value || (weight - self.value).abs() < self.tolerance
    }
}

// ── Extraction ───────────────────────────────────────────────────────────

impl TimestampExtractor {
    /// Extracts a timestamp and its precision from a CSV row.
    pub(crate) fn extract(&self, row: &Row<'_>) -> Option<(NaiveDateTime, TimePrecision)> {
        match self {
            Self::Simple { field, format } => parse_timestamp(row.get(field)?, format.as_deref())
                .map(|at| (at, TimePrecision::Hour)),
            Self::YearMonthHour { year, month, hour } => {
                let year = parse_integer(row.get(year)?)?;
                // A configured column that is blank or garbled makes the
                // whole timestamp unknown rather than silently defaulted.
                let month = match month {
                    Some(field) => Some(parse_integer(row.get(field)?)?),
                    None => None,
                };
                let hour = match hour {
                    Some(field) => Some(parse_integer(row.get(field)?)?),
                    None => None,
                };
                timestamp_from_parts(year, month, hour)
            }
        }
    }

    fn columns(&self) -> Vec<&str> {
        match self {
            Self::Simple { field, .. } => vec![field.as_str()],
            Self::YearMonthHour { year, month, hour } => std::iter::once(year.as_str())
                .chain(month.as_deref())
                .chain(hour.as_deref())
                .collect(),
        }
    }
}

impl FieldMapping {
    pub(crate) fn coordinates(&self, row: &Row<'_>, zero_is_missing: bool) -> Option<(f64, f64)> {
        parse_coordinate_pair(row.get(&self.x), row.get(&self.y), zero_is_missing)
    }

    pub(crate) fn severity(&self, row: &Row<'_>) -> Option<AccidentSeverity> {
        parse_severity(row.get(self.severity.as_deref()?)?)
    }

    pub(crate) fn weight(&self, row: &Row<'_>) -> Option<f64> {
        parse_number(row.get(self.weight.as_deref()?)?)
    }

    pub(crate) fn category(&self, row: &Row<'_>) -> Option<String> {
        row.get(self.category.as_deref()?).map(String::from)
    }

    /// Every column this mapping reads.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = vec![self.x.as_str(), self.y.as_str()];
        columns.extend(self.id.as_deref());
        if let Some(extractor) = &self.occurred_at {
            columns.extend(extractor.columns());
        }
        columns.extend(self.category.as_deref());
        columns.extend(self.severity.as_deref());
        columns.extend(self.weight.as_deref());
        columns
    }
}

impl SourceDefinition {
    /// Returns the unique source identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether rows with a `0` coordinate are treated as unlocated.
    #[must_use]
    pub fn zero_coordinates_missing(&self) -> bool {
        self.zero_is_missing.unwrap_or(self.crs == Crs::Lv95)
    }
}

/// Parses a TOML string into a [`SourceDefinition`].
///
/// # Errors
///
/// Returns an error string if the TOML is malformed or missing required
/// fields.
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}
