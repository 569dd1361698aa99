//! LV95 (EPSG:2056) <-> WGS84 conversion.
//!
//! Uses the swisstopo approximate formulas, accurate to about one metre
//! within Switzerland.

use basel_hotspots_event_models::{Coordinate, Crs, EventSet};

use crate::SpatialError;

/// Converts an LV95 easting/northing to WGS84 longitude/latitude.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn lv95_to_wgs84(coord: Coordinate) -> Coordinate {
    // Auxiliary values in units of 1000 km relative to Bern.
    let y = (coord.x - 2_600_000.0) / 1_000_000.0;
    let x = (coord.y - 1_200_000.0) / 1_000_000.0;

    let lambda = 2.677_909_4 + 4.728_982 * y + 0.791_484 * y * x + 0.1306 * y * x * x
        - 0.0436 * y * y * y;
    let phi = 16.902_389_2 + 3.238_272 * x
        - 0.270_978 * y * y
        - 0.002_528 * x * x
        - 0.0447 * y * y * x
        - 0.0140 * x * x * x;

    // Results are in units of 10000", convert to degrees.
    Coordinate::new(lambda * 100.0 / 36.0, phi * 100.0 / 36.0)
}

/// Converts a WGS84 longitude/latitude to LV95 easting/northing.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn wgs84_to_lv95(coord: Coordinate) -> Coordinate {
    let phi = coord.y.mul_add(3600.0, -169_028.66) / 10_000.0;
    let lambda = coord.x.mul_add(3600.0, -26_782.5) / 10_000.0;

    let east = 2_600_072.37 + 211_455.93 * lambda
        - 10_938.51 * lambda * phi
        - 0.36 * lambda * phi * phi
        - 44.54 * lambda * lambda * lambda;
    let north = 1_200_147.07
        + 308_807.95 * phi
        + 3_745.25 * lambda * lambda
        + 76.63 * phi * phi
        - 194.56 * lambda * lambda * phi
        + 119.79 * phi * phi * phi;

    Coordinate::new(east, north)
}

/// Returns `events` expressed in `target`.
///
/// # Errors
///
/// * [`SpatialError::UnsupportedReprojection`] when either side is
///   [`Crs::Projected`] and the systems differ.
/// * [`SpatialError::InvalidEvent`] if a converted position falls outside
///   the target system's domain.
pub fn reproject(events: &EventSet, target: Crs) -> Result<EventSet, SpatialError> {
    let source = events.crs();
    let convert: fn(Coordinate) -> Coordinate = match (source, target) {
        (from, to) if from == to => return Ok(events.clone()),
        (Crs::Lv95, Crs::Wgs84) => lv95_to_wgs84,
        (Crs::Wgs84, Crs::Lv95) => wgs84_to_lv95,
        (from, to) => return Err(SpatialError::UnsupportedReprojection { from, to }),
    };
    log::debug!("Reprojecting {} events from {source} to {target}", events.len());
    Ok(events.map_positions(target, convert)?)
}

#[cfg(test)]
mod tests {
    use basel_hotspots_event_models::Event;

    use super::*;

    /// Reference point from the swisstopo conversion documentation.
    const REF_WGS84: Coordinate = Coordinate::new(8.730_497_2, 46.044_130_6);
    const REF_LV95: Coordinate = Coordinate::new(2_700_000.0, 1_100_000.0);

    #[test]
    fn wgs84_to_lv95_matches_reference() {
        let lv95 = wgs84_to_lv95(REF_WGS84);
        assert!(lv95.distance(&REF_LV95) < 1.5, "{lv95:?}");
    }

    #[test]
    fn lv95_to_wgs84_matches_reference() {
        let wgs = lv95_to_wgs84(REF_LV95);
        assert!((wgs.x - REF_WGS84.x).abs() < 2e-5, "{wgs:?}");
        assert!((wgs.y - REF_WGS84.y).abs() < 2e-5, "{wgs:?}");
    }

    #[test]
    fn basel_round_trip_stays_within_metres() {
        let marktplatz = Coordinate::new(2_611_350.0, 1_267_400.0);
        let wgs = lv95_to_wgs84(marktplatz);
        assert!((7.5..7.7).contains(&wgs.x) && (47.5..47.6).contains(&wgs.y));
        let back = wgs84_to_lv95(wgs);
        assert!(back.distance(&marktplatz) < 2.0, "{back:?}");
    }

    #[test]
    fn reprojects_event_sets() {
        let events = EventSet::new(
            Crs::Lv95,
            vec![Event::new("a", REF_LV95.x, REF_LV95.y).with_weight(3.0)],
        )
        .unwrap();
        let wgs = reproject(&events, Crs::Wgs84).unwrap();
        assert_eq!(wgs.crs(), Crs::Wgs84);
        assert_eq!(wgs.events()[0].weight, Some(3.0));
        assert!((wgs.events()[0].position.y - REF_WGS84.y).abs() < 2e-5);

        let same = reproject(&events, Crs::Lv95).unwrap();
        assert_eq!(same, events);
    }

    #[test]
    fn refuses_unknown_projections() {
        let events = EventSet::new(Crs::Projected, vec![Event::new("a", 1.0, 1.0)]).unwrap();
        assert!(matches!(
            reproject(&events, Crs::Wgs84),
            Err(SpatialError::UnsupportedReprojection {
                from: Crs::Projected,
                to: Crs::Wgs84
            })
        ));
    }
}
