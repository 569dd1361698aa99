//! Source registry: loads all source definitions from embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a new source means adding a
//! TOML file and listing it below.

use crate::SourceError;
use crate::source_def::{SourceDefinition, parse_source_toml};

/// TOML configs embedded at compile time.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    (
        "basel_accidents",
        include_str!("../sources/basel_accidents.toml"),
    ),
    (
        "swiss_accidents",
        include_str!("../sources/swiss_accidents.toml"),
    ),
];

/// Returns all configured source definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (the configs are embedded, so
/// this is caught by the registry tests).
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_source_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up a source definition by id.
///
/// # Errors
///
/// Returns [`SourceError::UnknownSource`] if no source has that id.
pub fn find_source(id: &str) -> Result<SourceDefinition, SourceError> {
    all_sources()
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| SourceError::UnknownSource { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use basel_hotspots_event_models::Crs;

    use super::*;

    #[test]
    fn loads_all_sources() {
        assert_eq!(all_sources().len(), SOURCE_TOMLS.len());
    }

    #[test]
    fn source_ids_match_file_names() {
        for ((name, _), source) in SOURCE_TOMLS.iter().zip(all_sources()) {
            assert_eq!(*name, source.id);
        }
    }

    #[test]
    fn all_sources_have_required_fields() {
        for source in &all_sources() {
            assert!(!source.name.is_empty(), "{}: name is empty", source.id);
            assert!(!source.fields.x.is_empty(), "{}: no x field", source.id);
            assert!(!source.fields.y.is_empty(), "{}: no y field", source.id);
            assert_eq!(source.crs, Crs::Lv95, "{}", source.id);
        }
    }

    #[test]
    fn finds_sources_by_id() {
        let basel = find_source("basel_accidents").unwrap();
        assert_eq!(basel.delimiter, ';');
        assert!(matches!(
            find_source("nope"),
            Err(SourceError::UnknownSource { ref id }) if id == "nope"
        ));
    }
}
