#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial collaborators for hotspot detection.
//!
//! [`StudyArea`] holds boundary polygons in an R-tree and clips event sets
//! to the region they cover (e.g. the canton of Basel-Stadt). The [`lv95`]
//! module converts between Swiss LV95 metres and WGS84 degrees.
//!
//! Besides clipping, a study area made of named regions (municipalities,
//! cantons) tallies events per region, year and category with
//! [`StudyArea::count_by_area`].

pub mod lv95;

use std::collections::BTreeMap;
use std::path::Path;

use basel_hotspots_event_models::{Coordinate, Crs, EventSet, InvalidEventError};
use geo::{BoundingRect as _, Contains as _, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};

pub use lv95::reproject;

/// Errors from boundary loading and reprojection.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Boundary contains no polygons")]
    EmptyBoundary,

    #[error("CRS mismatch: boundary is {boundary}, events are {events}")]
    CrsMismatch { boundary: Crs, events: Crs },

    #[error("Cannot reproject from {from} to {to}")]
    UnsupportedReprojection { from: Crs, to: Crs },

    #[error(transparent)]
    InvalidEvent(#[from] InvalidEventError),
}

/// Grouping key of a regional tally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AreaKey {
    /// Boundary polygon name, empty for an unnamed polygon.
    pub area: String,
    pub year: Option<i32>,
    pub category: Option<String>,
}

/// One boundary polygon stored in the R-tree.
struct AreaEntry {
    name: Option<String>,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for AreaEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Region of interest made of one or more boundary polygons.
///
/// A coordinate is inside the study area when any polygon contains it.
/// Polygon boundaries themselves are outside.
pub struct StudyArea {
    crs: Crs,
    areas: RTree<AreaEntry>,
}

impl StudyArea {
    /// Parses a `GeoJSON` document whose coordinates are in `crs`.
    ///
    /// Accepts a bare `Polygon`/`MultiPolygon` geometry, a `Feature`, or a
    /// `FeatureCollection`. Non-polygon geometries are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid `GeoJSON` or contains no
    /// polygons.
    pub fn from_geojson_str(geojson: &str, crs: Crs) -> Result<Self, SpatialError> {
        let parsed: GeoJson = geojson.parse()?;

        let features = match parsed {
            GeoJson::Geometry(geometry) => vec![(None, Some(geometry))],
            GeoJson::Feature(feature) => vec![feature_parts(feature)],
            GeoJson::FeatureCollection(collection) => {
                collection.features.into_iter().map(feature_parts).collect()
            }
        };

        let mut entries = Vec::new();
        for (name, geometry) in features {
            let Some(polygon) = geometry.and_then(to_multipolygon) else {
                log::warn!(
                    "Skipping non-polygon boundary feature {}",
                    name.as_deref().unwrap_or("<unnamed>")
                );
                continue;
            };
            entries.push(AreaEntry {
                name,
                envelope: compute_envelope(&polygon),
                polygon,
            });
        }

        if entries.is_empty() {
            return Err(SpatialError::EmptyBoundary);
        }
        log::info!("Loaded {} boundary polygons into study area", entries.len());

        Ok(Self {
            crs,
            areas: RTree::bulk_load(entries),
        })
    }

    /// Reads and parses a `GeoJSON` boundary file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>, crs: Crs) -> Result<Self, SpatialError> {
        let path = path.as_ref();
        log::debug!("Reading study area boundary from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&contents, crs)
    }

    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Number of boundary polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.areas.size() == 0
    }

    #[must_use]
    pub fn contains(&self, coord: &Coordinate) -> bool {
        self.area_name(coord).is_some()
    }

    /// Name of the first polygon containing `coord`, or an empty string for
    /// an unnamed one. `None` when outside the study area.
    #[must_use]
    pub fn area_name(&self, coord: &Coordinate) -> Option<&str> {
        let point = geo::Point::new(coord.x, coord.y);
        let query_env = AABB::from_point([coord.x, coord.y]);

        self.areas
            .locate_in_envelope_intersecting(&query_env)
            .find(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.name.as_deref().unwrap_or(""))
    }

    /// Counts events per containing area, year and category.
    ///
    /// Events outside every polygon are not counted. An event inside
    /// overlapping polygons counts toward the first one found.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::CrsMismatch`] if the events are not in the
    /// boundary's CRS.
    pub fn count_by_area(&self, events: &EventSet) -> Result<BTreeMap<AreaKey, usize>, SpatialError> {
        self.check_crs(events)?;
        let mut counts = BTreeMap::new();
        let mut outside = 0_usize;
        for event in events {
            let Some(area) = self.area_name(&event.position) else {
                outside += 1;
                continue;
            };
            let key = AreaKey {
                area: area.to_string(),
                year: event.year(),
                category: event.category.clone(),
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        if outside > 0 {
            log::info!("{outside} events lie outside every study area polygon");
        }
        log::debug!("Tallied {} area/year/category groups", counts.len());
        Ok(counts)
    }

    fn check_crs(&self, events: &EventSet) -> Result<(), SpatialError> {
        if events.crs() != self.crs {
            return Err(SpatialError::CrsMismatch {
                boundary: self.crs,
                events: events.crs(),
            });
        }
        Ok(())
    }

    /// Returns the events inside the study area.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::CrsMismatch`] if the events are not in the
    /// boundary's CRS.
    pub fn clip(&self, events: &EventSet) -> Result<EventSet, SpatialError> {
        self.check_crs(events)?;
        let clipped = events.retain(|e| self.contains(&e.position));
        log::info!(
            "Study area kept {} of {} events",
            clipped.len(),
            events.len()
        );
        Ok(clipped)
    }
}

fn feature_parts(feature: geojson::Feature) -> (Option<String>, Option<geojson::Geometry>) {
    let name = feature
        .property("name")
        .and_then(|v| v.as_str())
        .map(ToString::to_string);
    (name, feature.geometry)
}

/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
