//! Grid-binning detection.
//!
//! The bounding box of the events is tiled with square cells anchored at its
//! minimum corner. Each event lands in exactly one cell: cells include their
//! lower and left edges, and events on the maximum edge of the bounding box
//! are kept in the last row/column so the grid never grows past the data.

use std::collections::BTreeMap;

use basel_hotspots_detector_models::{CellSize, Extent, GridParams, Hotspot, StrategyKind};
use basel_hotspots_event_models::{Bounds, Coordinate, EventSet};

use crate::DetectError;

#[derive(Debug, Default, Clone, Copy)]
struct CellTally {
    score: f64,
    count: usize,
}

/// Bins `events` and returns one hotspot per cell whose score reaches the
/// threshold.
///
/// # Errors
///
/// * [`DetectError::InvalidParameter`] if the cell size is not positive, the
///   threshold is not finite, or `events` is empty.
/// * [`DetectError::InsufficientData`] if the cell size is given as a count
///   and every event shares one coordinate.
pub fn detect(events: &EventSet, params: &GridParams) -> Result<Vec<Hotspot>, DetectError> {
    validate(params)?;

    let Some(bounds) = events.bounds() else {
        return Err(DetectError::invalid(
            "events",
            "grid binning needs at least one event to define a bounding region",
        ));
    };

    let size = resolve_cell_size(params.cell_size, &bounds)?;
    let cols = span(bounds.width(), size);
    let rows = span(bounds.height(), size);
    log::debug!("Grid of {cols}x{rows} cells, cell size {size}");

    let mut cells: BTreeMap<(u64, u64), CellTally> = BTreeMap::new();
    for event in events {
        let col = index(event.position.x - bounds.min.x, size, cols);
        let row = index(event.position.y - bounds.min.y, size, rows);
        let tally = cells.entry((col, row)).or_default();
        tally.score += if params.weighted {
            event.weight_or_unit()
        } else {
            1.0
        };
        tally.count += 1;
    }
    log::debug!("{} of {} grid cells are occupied", cells.len(), cols.saturating_mul(rows));

    let hotspots = cells
        .into_iter()
        .filter(|(_, tally)| tally.score >= params.threshold)
        .map(|((col, row), tally)| cell_hotspot(&bounds, size, col, row, tally))
        .collect();

    Ok(hotspots)
}

fn validate(params: &GridParams) -> Result<(), DetectError> {
    match params.cell_size {
        CellSize::Length(length) if !(length.is_finite() && length > 0.0) => {
            return Err(DetectError::invalid(
                "cell_size",
                format!("cell length must be a positive finite number, got {length}"),
            ));
        }
        CellSize::Count(0) => {
            return Err(DetectError::invalid(
                "cell_size",
                "cell count must be at least 1",
            ));
        }
        _ => {}
    }
    if !params.threshold.is_finite() {
        return Err(DetectError::invalid(
            "threshold",
            format!("threshold must be finite, got {}", params.threshold),
        ));
    }
    Ok(())
}

fn resolve_cell_size(cell_size: CellSize, bounds: &Bounds) -> Result<f64, DetectError> {
    match cell_size {
        CellSize::Length(length) => Ok(length),
        CellSize::Count(count) => {
            let size = bounds.width().max(bounds.height()) / f64::from(count);
            if size > 0.0 {
                Ok(size)
            } else {
                Err(DetectError::InsufficientData {
                    strategy: StrategyKind::Grid,
                    required: 2,
                    actual: 1,
                    reason: "distinct coordinates to derive a cell size from a cell count",
                })
            }
        }
    }
}

/// Number of cells needed to cover `extent`, at least one.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn span(extent: f64, size: f64) -> u64 {
    ((extent / size).ceil() as u64).max(1)
}

/// Cell index of an offset from the grid origin, clamped to the last cell.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn index(offset: f64, size: f64, span: u64) -> u64 {
    ((offset / size).floor() as u64).min(span - 1)
}

#[allow(clippy::cast_precision_loss)]
fn cell_hotspot(bounds: &Bounds, size: f64, col: u64, row: u64, tally: CellTally) -> Hotspot {
    let min = Coordinate::new(
        (col as f64).mul_add(size, bounds.min.x),
        (row as f64).mul_add(size, bounds.min.y),
    );
    let max = Coordinate::new(min.x + size, min.y + size);
    Hotspot {
        location: Coordinate::new(size.mul_add(0.5, min.x), size.mul_add(0.5, min.y)),
        score: tally.score,
        extent: Extent::Cell { min, max },
        event_count: tally.count,
        strategy: StrategyKind::Grid,
    }
}

#[cfg(test)]
mod tests {
    use basel_hotspots_event_models::{Crs, Event};

    use super::*;

    fn set(points: &[(f64, f64)]) -> EventSet {
        let events = points
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Event::new(i.to_string(), *x, *y))
            .collect();
        EventSet::new(Crs::Projected, events).unwrap()
    }

    #[test]
    fn identical_coordinates_form_one_hotspot() {
        let events = set(&[(5.0, 5.0); 7]);
        for threshold in [1.0, 7.0] {
            let hotspots =
                detect(&events, &GridParams::new(CellSize::Length(2.0), threshold)).unwrap();
            assert_eq!(hotspots.len(), 1);
            assert!((hotspots[0].score - 7.0).abs() < f64::EPSILON);
            assert_eq!(hotspots[0].event_count, 7);
        }
    }

    #[test]
    fn threshold_above_count_yields_nothing() {
        let events = set(&[(5.0, 5.0); 3]);
        let hotspots = detect(&events, &GridParams::new(CellSize::Length(2.0), 4.0)).unwrap();
        assert!(hotspots.is_empty());
    }

    #[test]
    fn boundary_events_go_to_exactly_one_cell() {
        // Origin at x = 0; the event at x = 10 sits on the edge between the
        // first and second cell, the one at x = 20 on the grid's outer edge.
        let events = set(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]);
        let hotspots = detect(&events, &GridParams::new(CellSize::Length(10.0), 1.0)).unwrap();
        assert_eq!(hotspots.len(), 2);
        let total: usize = hotspots.iter().map(|h| h.event_count).sum();
        assert_eq!(total, 3);

        let first = &hotspots[0];
        assert_eq!(first.event_count, 1);
        assert_eq!(
            first.extent,
            Extent::Cell {
                min: Coordinate::new(0.0, 0.0),
                max: Coordinate::new(10.0, 10.0),
            }
        );
        let second = &hotspots[1];
        assert_eq!(second.event_count, 2);
        assert_eq!(second.location, Coordinate::new(15.0, 5.0));
    }

    #[test]
    fn cell_count_divides_the_wider_side() {
        let events = set(&[(0.0, 0.0), (100.0, 10.0), (99.0, 9.0)]);
        let hotspots = detect(&events, &GridParams::new(CellSize::Count(4), 1.0)).unwrap();
        assert_eq!(hotspots.len(), 2);
        let Extent::Cell { min, max } = hotspots[1].extent else {
            panic!("grid hotspots always carry cell extents");
        };
        assert!((max.x - min.x - 25.0).abs() < 1e-9);
        assert_eq!(hotspots[1].event_count, 2);
    }

    #[test]
    fn cell_count_handles_north_south_line() {
        let events = set(&[(0.0, 0.0), (0.0, 100.0), (0.0, 99.0)]);
        let hotspots = detect(&events, &GridParams::new(CellSize::Count(4), 1.0)).unwrap();
        assert_eq!(hotspots.len(), 2);
        let Extent::Cell { min, max } = hotspots[1].extent else {
            panic!("grid hotspots always carry cell extents");
        };
        assert!((max.y - min.y - 25.0).abs() < 1e-9);
        assert_eq!(hotspots[1].event_count, 2);
    }

    #[test]
    fn weighted_binning_sums_weights() {
        let events = EventSet::new(
            Crs::Projected,
            vec![
                Event::new("a", 1.0, 1.0).with_weight(60.5),
                Event::new("b", 1.5, 1.5).with_weight(70.0),
                Event::new("c", 1.2, 1.1),
            ],
        )
        .unwrap();
        let mut params = GridParams::new(CellSize::Length(5.0), 0.0);
        params.weighted = true;
        let hotspots = detect(&events, &params).unwrap();
        assert_eq!(hotspots.len(), 1);
        assert!((hotspots[0].score - 131.5).abs() < 1e-9);
        assert_eq!(hotspots[0].event_count, 3);
    }

    #[test]
    fn rejects_invalid_parameters() {
        let events = set(&[(0.0, 0.0)]);
        for size in [CellSize::Length(0.0), CellSize::Length(-2.0), CellSize::Count(0)] {
            let err = detect(&events, &GridParams::new(size, 1.0)).unwrap_err();
            assert!(matches!(
                err,
                DetectError::InvalidParameter {
                    name: "cell_size",
                    ..
                }
            ));
        }
        let err = detect(
            &events,
            &GridParams::new(CellSize::Length(1.0), f64::NAN),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DetectError::InvalidParameter {
                name: "threshold",
                ..
            }
        ));
    }

    #[test]
    fn rejects_empty_event_set() {
        let events = EventSet::empty(Crs::Projected);
        let err = detect(&events, &GridParams::new(CellSize::Length(1.0), 1.0)).unwrap_err();
        assert!(matches!(
            err,
            DetectError::InvalidParameter { name: "events", .. }
        ));
    }

    #[test]
    fn count_on_single_coordinate_is_degenerate() {
        let events = set(&[(3.0, 3.0), (3.0, 3.0)]);
        let err = detect(&events, &GridParams::new(CellSize::Count(10), 1.0)).unwrap_err();
        assert!(matches!(err, DetectError::InsufficientData { .. }));
    }
}
