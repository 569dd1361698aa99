//! Encoding of hotspot rankings as JSON or `GeoJSON`, and of regional
//! tallies as JSON.

use std::collections::BTreeMap;

use basel_hotspots_detector::DetectError;
use basel_hotspots_detector_models::{Extent, Hotspot, HotspotRanking, StrategyKind};
use basel_hotspots_event_models::{Coordinate, Crs};
use basel_hotspots_spatial::AreaKey;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// Vertices used to draw a circular extent as a polygon.
const CIRCLE_SEGMENTS: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OutputFormat {
    /// Rankings as plain JSON.
    #[default]
    Json,
    /// One `FeatureCollection` with a location and an extent feature per
    /// hotspot.
    Geojson,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RankedHotspot<'a> {
    rank: usize,
    #[serde(flatten)]
    hotspot: &'a Hotspot,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RankingOutput<'a> {
    strategy: StrategyKind,
    crs: Crs,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    hotspots: Vec<RankedHotspot<'a>>,
}

impl<'a> RankingOutput<'a> {
    fn new(ranking: &'a HotspotRanking, crs: Crs) -> Self {
        Self {
            strategy: ranking.strategy,
            crs,
            error: None,
            hotspots: ranking
                .ranked()
                .map(|(rank, hotspot)| RankedHotspot { rank, hotspot })
                .collect(),
        }
    }

    fn failed(strategy: StrategyKind, crs: Crs, error: &DetectError) -> Self {
        Self {
            strategy,
            crs,
            error: Some(error.to_string()),
            hotspots: Vec::new(),
        }
    }
}

/// Encodes one ranking.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_ranking(
    ranking: &HotspotRanking,
    crs: Crs,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&RankingOutput::new(ranking, crs)),
        OutputFormat::Geojson => Ok(GeoJson::from(feature_collection([ranking], crs)).to_string()),
    }
}

/// Encodes the results of a strategy comparison, failures included.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_comparison(
    results: &[(StrategyKind, Result<HotspotRanking, DetectError>)],
    crs: Crs,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => {
            let outputs: Vec<RankingOutput<'_>> = results
                .iter()
                .map(|(kind, result)| match result {
                    Ok(ranking) => RankingOutput::new(ranking, crs),
                    Err(e) => RankingOutput::failed(*kind, crs, e),
                })
                .collect();
            serde_json::to_string_pretty(&outputs)
        }
        OutputFormat::Geojson => {
            let rankings = results.iter().filter_map(|(_, r)| r.as_ref().ok());
            Ok(GeoJson::from(feature_collection(rankings, crs)).to_string())
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegionCount<'a> {
    area: &'a str,
    year: Option<i32>,
    category: Option<&'a str>,
    count: usize,
}

/// Encodes per-region counts as a JSON array ordered by area, year and
/// category.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_regions(counts: &BTreeMap<AreaKey, usize>) -> Result<String, serde_json::Error> {
    let rows: Vec<RegionCount<'_>> = counts
        .iter()
        .map(|(key, &count)| RegionCount {
            area: &key.area,
            year: key.year,
            category: key.category.as_deref(),
            count,
        })
        .collect();
    serde_json::to_string_pretty(&rows)
}

fn feature_collection<'a>(
    rankings: impl IntoIterator<Item = &'a HotspotRanking>,
    crs: Crs,
) -> FeatureCollection {
    let mut features = Vec::new();
    for ranking in rankings {
        for (rank, hotspot) in ranking.ranked() {
            let properties = hotspot_properties(rank, hotspot, crs);

            let mut location = Feature::from(Geometry::new(point(hotspot.location)));
            let mut location_props = properties.clone();
            location_props.insert("role".to_string(), "location".into());
            location.properties = Some(location_props);
            features.push(location);

            let mut extent = Feature::from(Geometry::new(extent_geometry(&hotspot.extent)));
            let mut extent_props = properties;
            extent_props.insert("role".to_string(), "extent".into());
            extent.properties = Some(extent_props);
            features.push(extent);
        }
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn hotspot_properties(rank: usize, hotspot: &Hotspot, crs: Crs) -> JsonObject {
    let mut properties = JsonObject::new();
    properties.insert("rank".to_string(), rank.into());
    properties.insert("strategy".to_string(), hotspot.strategy.as_ref().into());
    properties.insert("score".to_string(), hotspot.score.into());
    properties.insert("eventCount".to_string(), hotspot.event_count.into());
    properties.insert("crs".to_string(), crs.as_ref().into());
    let extent_type = match hotspot.extent {
        Extent::Cell { .. } => "cell",
        Extent::Circle { radius, .. } => {
            properties.insert("radius".to_string(), radius.into());
            "circle"
        }
        Extent::Hull { .. } => "hull",
    };
    properties.insert("extentType".to_string(), extent_type.into());
    properties
}

fn point(c: Coordinate) -> Value {
    Value::Point(vec![c.x, c.y])
}

/// Closed ring through `vertices`.
fn ring(vertices: impl IntoIterator<Item = Coordinate>) -> Vec<Vec<f64>> {
    let mut ring: Vec<Vec<f64>> = vertices.into_iter().map(|c| vec![c.x, c.y]).collect();
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }
    ring
}

#[allow(clippy::cast_precision_loss)]
fn extent_geometry(extent: &Extent) -> Value {
    match extent {
        Extent::Cell { min, max } => Value::Polygon(vec![ring([
            *min,
            Coordinate::new(max.x, min.y),
            *max,
            Coordinate::new(min.x, max.y),
        ])]),
        Extent::Circle { center, radius } if *radius > 0.0 => {
            let vertices = (0..CIRCLE_SEGMENTS).map(|i| {
                let angle = std::f64::consts::TAU * i as f64 / CIRCLE_SEGMENTS as f64;
                Coordinate::new(
                    radius.mul_add(angle.cos(), center.x),
                    radius.mul_add(angle.sin(), center.y),
                )
            });
            Value::Polygon(vec![ring(vertices)])
        }
        Extent::Circle { center, .. } => point(*center),
        Extent::Hull { vertices } => Value::Polygon(vec![ring(vertices.iter().copied())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking() -> HotspotRanking {
        HotspotRanking {
            strategy: StrategyKind::Grid,
            hotspots: vec![
                Hotspot {
                    location: Coordinate::new(5.0, 5.0),
                    score: 4.0,
                    extent: Extent::Cell {
                        min: Coordinate::new(0.0, 0.0),
                        max: Coordinate::new(10.0, 10.0),
                    },
                    event_count: 4,
                    strategy: StrategyKind::Grid,
                },
                Hotspot {
                    location: Coordinate::new(20.0, 0.0),
                    score: 1.0,
                    extent: Extent::Circle {
                        center: Coordinate::new(20.0, 0.0),
                        radius: 0.0,
                    },
                    event_count: 1,
                    strategy: StrategyKind::Grid,
                },
            ],
        }
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("geojson".parse::<OutputFormat>().unwrap(), OutputFormat::Geojson);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    }

    #[test]
    fn json_carries_ranks_and_flattened_hotspots() {
        let json = encode_ranking(&ranking(), Crs::Lv95, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["strategy"], "grid");
        assert_eq!(value["crs"], "lv95");
        assert!(value.get("error").is_none());
        assert_eq!(value["hotspots"][0]["rank"], 1);
        assert_eq!(value["hotspots"][0]["eventCount"], 4);
        assert_eq!(value["hotspots"][0]["extent"]["type"], "cell");
        assert_eq!(value["hotspots"][1]["rank"], 2);
    }

    #[test]
    fn geojson_has_location_and_extent_per_hotspot() {
        let text = encode_ranking(&ranking(), Crs::Projected, OutputFormat::Geojson).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 4);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[0]["properties"]["role"], "location");
        assert_eq!(features[1]["geometry"]["type"], "Polygon");
        assert_eq!(
            features[1]["geometry"]["coordinates"][0].as_array().unwrap().len(),
            5
        );
        // A zero-radius circle has no area to draw.
        assert_eq!(features[3]["geometry"]["type"], "Point");
        assert_eq!(features[3]["properties"]["extentType"], "circle");
    }

    #[test]
    fn circle_extent_becomes_closed_polygon() {
        let Value::Polygon(rings) = extent_geometry(&Extent::Circle {
            center: Coordinate::new(0.0, 0.0),
            radius: 2.0,
        }) else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), CIRCLE_SEGMENTS + 1);
        assert_eq!(rings[0].first(), rings[0].last());
    }

    #[test]
    fn regions_encode_as_flat_rows() {
        let counts = BTreeMap::from([
            (
                AreaKey {
                    area: "Riehen".to_string(),
                    year: Some(2012),
                    category: Some("Minor road".to_string()),
                },
                3,
            ),
            (
                AreaKey {
                    area: "Basel".to_string(),
                    year: None,
                    category: None,
                },
                1,
            ),
        ]);
        let value: serde_json::Value =
            serde_json::from_str(&encode_regions(&counts).unwrap()).unwrap();
        assert_eq!(value[0]["area"], "Basel");
        assert!(value[0]["year"].is_null());
        assert_eq!(value[1]["category"], "Minor road");
        assert_eq!(value[1]["count"], 3);
    }

    #[test]
    fn comparison_reports_failures_inline() {
        let results = vec![
            (StrategyKind::Grid, Ok(ranking())),
            (
                StrategyKind::Kde,
                Err(DetectError::InsufficientData {
                    strategy: StrategyKind::Kde,
                    required: 2,
                    actual: 1,
                    reason: "events for a kernel density estimate",
                }),
            ),
        ];
        let json = encode_comparison(&results, Crs::Lv95, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["hotspots"].as_array().unwrap().len(), 2);
        assert_eq!(value[1]["strategy"], "kde");
        assert!(value[1]["error"].as_str().unwrap().contains("Insufficient data"));

        let geojson = encode_comparison(&results, Crs::Lv95, OutputFormat::Geojson).unwrap();
        let value: serde_json::Value = serde_json::from_str(&geojson).unwrap();
        assert_eq!(value["features"].as_array().unwrap().len(), 4);
    }
}
