//! Load, filter, clip and reproject events ahead of detection.

use std::collections::BTreeMap;
use std::path::Path;

use basel_hotspots_event_models::EventSet;
use basel_hotspots_source::SourceDefinition;
use basel_hotspots_spatial::{AreaKey, SpatialError, StudyArea, reproject};

use crate::config::{ConfigError, DetectionConfig};

/// Loads `input` with `source` and prepares it as `config` describes.
///
/// # Errors
///
/// Returns an error if loading, filtering, boundary parsing or
/// reprojection fails.
pub fn load_events(
    source: &SourceDefinition,
    input: &Path,
    config: &DetectionConfig,
) -> Result<EventSet, Box<dyn std::error::Error>> {
    let report = basel_hotspots_source::load_path(input, source)?;
    if report.events.is_empty() {
        log::warn!(
            "[{}] No usable events in {} ({} rows read)",
            source.id(),
            input.display(),
            report.rows
        );
    }

    let study_area = load_study_area(source, config)?;
    prepare(&report.events, config, study_area.as_ref())
}

fn load_study_area(
    source: &SourceDefinition,
    config: &DetectionConfig,
) -> Result<Option<StudyArea>, SpatialError> {
    config
        .boundary
        .as_deref()
        .map(|path| StudyArea::from_path(path, config.boundary_crs.unwrap_or(source.crs)))
        .transpose()
}

/// Loads `input`, applies the config's filter and counts events per
/// boundary region, year and category.
///
/// # Errors
///
/// Returns [`ConfigError::MissingBoundary`] without a configured boundary,
/// otherwise the same errors as [`load_events`].
pub fn tally_regions(
    source: &SourceDefinition,
    input: &Path,
    config: &DetectionConfig,
) -> Result<BTreeMap<AreaKey, usize>, Box<dyn std::error::Error>> {
    let study_area = load_study_area(source, config)?.ok_or(ConfigError::MissingBoundary)?;
    let report = basel_hotspots_source::load_path(input, source)?;
    count_regions(&report.events, config, &study_area)
}

/// Filters `events` and counts them per region of `study_area`.
///
/// # Errors
///
/// Returns an error if the filter is invalid or the events cannot be
/// reprojected into the boundary's CRS.
pub fn count_regions(
    events: &EventSet,
    config: &DetectionConfig,
    study_area: &StudyArea,
) -> Result<BTreeMap<AreaKey, usize>, Box<dyn std::error::Error>> {
    let events = config.filter.apply(events)?;
    let in_area_crs = reproject(&events, study_area.crs())?;
    Ok(study_area.count_by_area(&in_area_crs)?)
}

/// Applies the config's filter, the study area and the target CRS.
///
/// Clipping happens in the boundary's CRS; the result is expressed in
/// `target_crs`, or the events' original CRS when none is configured.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a reprojection is not
/// supported.
pub fn prepare(
    events: &EventSet,
    config: &DetectionConfig,
    study_area: Option<&StudyArea>,
) -> Result<EventSet, Box<dyn std::error::Error>> {
    let original_crs = events.crs();
    let mut events = config.filter.apply(events)?;

    if let Some(area) = study_area {
        let in_area_crs = reproject(&events, area.crs())?;
        events = area.clip(&in_area_crs)?;
    }

    let target = config.target_crs.unwrap_or(original_crs);
    if !target.is_metric() {
        log::warn!("Detecting in {target}: distance parameters are interpreted as degrees");
    }
    events = reproject(&events, target)?;

    log::info!("{} events ready for detection in {target}", events.len());
    Ok(events)
}
