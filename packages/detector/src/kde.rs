//! Kernel density estimation peak extraction.
//!
//! The density surface is evaluated on a regular grid covering the events'
//! bounding box, padded by the kernel's support radius so peaks at the edge
//! of the data are not clipped. Kernel contributions are gathered through an
//! R-tree, so each grid point only visits events within the support radius.
//!
//! Peaks are grid points that dominate their eight neighbours. Ties between
//! equal neighbours are broken in row-major order, and a final suppression
//! pass drops any peak within one grid cell of a higher one. A peak needs at
//! least [`MIN_EVENTS`] events within the kernel's half-maximum radius, so
//! an isolated event never becomes a hotspot on its own.

use std::collections::{BTreeSet, HashSet, VecDeque};

use basel_hotspots_detector_models::{DensityThreshold, Extent, Hotspot, KdeParams, StrategyKind};
use basel_hotspots_event_models::{Coordinate, EventSet};
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::DetectError;
use crate::geometry;

/// Largest evaluation grid accepted, in grid points.
pub const MAX_GRID_POINTS: usize = 16_000_000;

/// KDE is undefined for fewer events than this, and a peak supported by
/// fewer events is not reported.
pub const MIN_EVENTS: usize = 2;

type WeightedPoint = GeomWithData<[f64; 2], f64>;

/// Density values on a regular grid, stored row-major.
struct DensityGrid {
    origin: Coordinate,
    resolution: f64,
    cols: usize,
    rows: usize,
    values: Vec<f64>,
}

impl DensityGrid {
    #[allow(clippy::cast_precision_loss)]
    fn point(&self, col: usize, row: usize) -> Coordinate {
        Coordinate::new(
            (col as f64).mul_add(self.resolution, self.origin.x),
            (row as f64).mul_add(self.resolution, self.origin.y),
        )
    }

    const fn idx(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }

    const fn col_row(&self, idx: usize) -> (usize, usize) {
        (idx % self.cols, idx / self.cols)
    }

    const fn on_border(&self, col: usize, row: usize) -> bool {
        col == 0 || row == 0 || col + 1 == self.cols || row + 1 == self.rows
    }

    /// Indices of the up to eight neighbours of `(col, row)`.
    fn neighbours8(&self, col: usize, row: usize) -> impl Iterator<Item = usize> + '_ {
        let cols = col.saturating_sub(1)..=(col + 1).min(self.cols - 1);
        let rows = row.saturating_sub(1)..=(row + 1).min(self.rows - 1);
        rows.flat_map(move |r| cols.clone().map(move |c| (c, r)))
            .filter(move |&(c, r)| (c, r) != (col, row))
            .map(|(c, r)| self.idx(c, r))
    }

    /// Indices of the up to four edge-adjacent neighbours of `(col, row)`.
    fn neighbours4(&self, col: usize, row: usize) -> impl Iterator<Item = usize> + '_ {
        let left = col.checked_sub(1).map(|c| (c, row));
        let right = (col + 1 < self.cols).then_some((col + 1, row));
        let down = row.checked_sub(1).map(|r| (col, r));
        let up = (row + 1 < self.rows).then_some((col, row + 1));
        [left, right, down, up]
            .into_iter()
            .flatten()
            .map(|(c, r)| self.idx(c, r))
    }
}

/// Estimates the density surface and returns its peaks as hotspots.
///
/// # Errors
///
/// * [`DetectError::InvalidParameter`] if the bandwidth or resolution is not
///   positive, the threshold is out of range, or the evaluation grid would
///   exceed [`MAX_GRID_POINTS`].
/// * [`DetectError::InsufficientData`] with fewer than [`MIN_EVENTS`] events
///   or when every event weight is zero.
pub fn detect(events: &EventSet, params: &KdeParams) -> Result<Vec<Hotspot>, DetectError> {
    validate(params)?;

    if events.len() < MIN_EVENTS {
        return Err(DetectError::InsufficientData {
            strategy: StrategyKind::Kde,
            required: MIN_EVENTS,
            actual: events.len(),
            reason: "events for a kernel density estimate",
        });
    }

    let points: Vec<WeightedPoint> = events
        .iter()
        .map(|e| {
            let weight = if params.weighted {
                e.weight_or_unit()
            } else {
                1.0
            };
            GeomWithData::new([e.position.x, e.position.y], weight)
        })
        .collect();
    let total_weight: f64 = points.iter().map(|p| p.data).sum();
    if total_weight <= 0.0 {
        return Err(DetectError::InsufficientData {
            strategy: StrategyKind::Kde,
            required: 1,
            actual: 0,
            reason: "events with a positive weight",
        });
    }
    let tree = RTree::bulk_load(points);

    let grid = evaluate(events, params, &tree, total_weight)?;
    let max_density = grid.values.iter().copied().fold(0.0, f64::max);
    if max_density <= 0.0 {
        return Ok(Vec::new());
    }

    let threshold = match params.threshold {
        DensityThreshold::Absolute(value) => value,
        DensityThreshold::Relative(fraction) => fraction * max_density,
    };

    let candidates = local_maxima(&grid, threshold);
    let peaks = suppress_adjacent(&grid, candidates);
    log::debug!(
        "KDE grid {}x{}: max density {max_density:e}, {} peaks above {threshold:e}",
        grid.cols,
        grid.rows,
        peaks.len()
    );

    let half_max_radius = params.kernel.half_max_radius(params.bandwidth);
    let peak_set: BTreeSet<usize> = peaks.iter().copied().collect();
    let mut isolated = 0_usize;
    let hotspots: Vec<Hotspot> = peaks
        .iter()
        .filter_map(|&peak| {
            let (col, row) = grid.col_row(peak);
            let location = grid.point(col, row);
            let event_count = tree
                .locate_within_distance([location.x, location.y], half_max_radius * half_max_radius)
                .count();
            if event_count < MIN_EVENTS {
                isolated += 1;
                return None;
            }
            Some(Hotspot {
                location,
                score: grid.values[peak],
                extent: half_max_extent(&grid, peak, &peak_set, half_max_radius),
                event_count,
                strategy: StrategyKind::Kde,
            })
        })
        .collect();
    if isolated > 0 {
        log::debug!("Dropped {isolated} KDE peaks supported by a single event");
    }

    Ok(hotspots)
}

fn validate(params: &KdeParams) -> Result<(), DetectError> {
    if !(params.bandwidth.is_finite() && params.bandwidth > 0.0) {
        return Err(DetectError::invalid(
            "bandwidth",
            format!(
                "bandwidth must be a positive finite number, got {}",
                params.bandwidth
            ),
        ));
    }
    if !(params.resolution.is_finite() && params.resolution > 0.0) {
        return Err(DetectError::invalid(
            "resolution",
            format!(
                "resolution must be a positive finite number, got {}",
                params.resolution
            ),
        ));
    }
    match params.threshold {
        DensityThreshold::Absolute(value) if !(value.is_finite() && value >= 0.0) => {
            Err(DetectError::invalid(
                "threshold",
                format!("absolute density threshold must be finite and >= 0, got {value}"),
            ))
        }
        DensityThreshold::Relative(fraction) if !(fraction > 0.0 && fraction <= 1.0) => {
            Err(DetectError::invalid(
                "threshold",
                format!("relative density threshold must be in (0, 1], got {fraction}"),
            ))
        }
        _ => Ok(()),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn evaluate(
    events: &EventSet,
    params: &KdeParams,
    tree: &RTree<WeightedPoint>,
    total_weight: f64,
) -> Result<DensityGrid, DetectError> {
    let support = params.kernel.support_radius(params.bandwidth);
    // Non-empty: callers check the event count first.
    let Some(bounds) = events.bounds() else {
        return Err(DetectError::InsufficientData {
            strategy: StrategyKind::Kde,
            required: MIN_EVENTS,
            actual: 0,
            reason: "events for a kernel density estimate",
        });
    };
    let region = bounds.padded(support);

    let cols_f = (region.width() / params.resolution).floor() + 1.0;
    let rows_f = (region.height() / params.resolution).floor() + 1.0;
    if cols_f * rows_f > MAX_GRID_POINTS as f64 {
        return Err(DetectError::invalid(
            "resolution",
            format!(
                "evaluation grid of {cols_f}x{rows_f} points exceeds {MAX_GRID_POINTS}; \
                 use a coarser resolution"
            ),
        ));
    }
    let cols = cols_f as usize;
    let rows = rows_f as usize;

    let mut grid = DensityGrid {
        origin: region.min,
        resolution: params.resolution,
        cols,
        rows,
        values: Vec::with_capacity(cols * rows),
    };

    let h = params.bandwidth;
    let norm = 1.0 / (total_weight * h * h);
    for row in 0..rows {
        for col in 0..cols {
            let p = grid.point(col, row);
            let sum: f64 = tree
                .locate_within_distance([p.x, p.y], support * support)
                .map(|q| {
                    let [qx, qy] = *q.geom();
                    q.data * params.kernel.value((p.x - qx).hypot(p.y - qy) / h)
                })
                .sum();
            grid.values.push(sum * norm);
        }
    }

    Ok(grid)
}

/// Grid indices that dominate their neighbourhood and reach `threshold`,
/// in row-major order.
fn local_maxima(grid: &DensityGrid, threshold: f64) -> Vec<usize> {
    (0..grid.values.len())
        .filter(|&idx| {
            let value = grid.values[idx];
            if value <= 0.0 || value < threshold {
                return false;
            }
            let (col, row) = grid.col_row(idx);
            grid.neighbours8(col, row).all(|n| {
                let other = grid.values[n];
                other < value || (other <= value && n > idx)
            })
        })
        .collect()
}

/// Keeps the higher of any two peaks within one grid cell of each other.
fn suppress_adjacent(grid: &DensityGrid, mut candidates: Vec<usize>) -> Vec<usize> {
    candidates.sort_by(|&a, &b| grid.values[b].total_cmp(&grid.values[a]).then(a.cmp(&b)));

    let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
    for idx in candidates {
        let (col, row) = grid.col_row(idx);
        let adjacent = kept.iter().any(|&k| {
            let (kc, kr) = grid.col_row(k);
            kc.abs_diff(col) <= 1 && kr.abs_diff(row) <= 1
        });
        if !adjacent {
            kept.push(idx);
        }
    }
    kept
}

/// Convex hull of the connected region at or above half the peak density.
///
/// Falls back to a circle of `fallback_radius` when the contour is
/// ambiguous: the region touches the grid border, swallows another peak, or
/// has no area.
fn half_max_extent(
    grid: &DensityGrid,
    peak: usize,
    peaks: &BTreeSet<usize>,
    fallback_radius: f64,
) -> Extent {
    let (peak_col, peak_row) = grid.col_row(peak);
    let center = grid.point(peak_col, peak_row);
    let fallback = Extent::Circle {
        center,
        radius: fallback_radius,
    };
    let level = grid.values[peak] / 2.0;

    let mut visited = HashSet::from([peak]);
    let mut queue = VecDeque::from([peak]);
    let mut region = Vec::new();

    while let Some(idx) = queue.pop_front() {
        let (col, row) = grid.col_row(idx);
        if grid.on_border(col, row) || (idx != peak && peaks.contains(&idx)) {
            return fallback;
        }
        region.push(grid.point(col, row));
        for n in grid.neighbours4(col, row) {
            if grid.values[n] >= level && visited.insert(n) {
                queue.push_back(n);
            }
        }
    }

    match geometry::hull_or_circle(&region, center) {
        hull @ Extent::Hull { .. } => hull,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use basel_hotspots_detector_models::Kernel;
    use basel_hotspots_event_models::{Crs, Event};

    use super::*;

    fn cluster_with_singleton() -> EventSet {
        let mut events: Vec<Event> = (0..10)
            .map(|i| {
                let angle = f64::from(i) * std::f64::consts::TAU / 10.0;
                Event::new(format!("c{i}"), angle.cos() * 0.8, angle.sin() * 0.8)
            })
            .collect();
        events.push(Event::new("far", 300.0, 0.0));
        EventSet::new(Crs::Projected, events).unwrap()
    }

    #[test]
    fn far_singleton_is_not_a_peak() {
        let events = cluster_with_singleton();
        let params = KdeParams::new(5.0, 1.0).with_threshold(DensityThreshold::Relative(0.5));
        let hotspots = detect(&events, &params).unwrap();
        assert_eq!(hotspots.len(), 1);
        let peak = hotspots[0].location;
        assert!(peak.x.abs() <= 1.0 && peak.y.abs() <= 1.0, "peak at {peak:?}");
        assert_eq!(hotspots[0].event_count, 10);
    }

    #[test]
    fn lone_event_is_not_a_peak_under_default_threshold() {
        let events = EventSet::new(
            Crs::Projected,
            vec![
                Event::new("a", 0.0, 0.0),
                Event::new("b", 0.05, 0.0),
                Event::new("c", 0.0, 0.05),
                Event::new("far", 100.0, 0.0),
            ],
        )
        .unwrap();
        let hotspots = detect(&events, &KdeParams::new(1.0, 0.25)).unwrap();
        assert_eq!(hotspots.len(), 1, "{hotspots:?}");
        assert!(hotspots[0].location.x.abs() < 1.0);
        assert_eq!(hotspots[0].event_count, 3);
    }

    #[test]
    fn two_separated_clusters_give_two_peaks() {
        let mut events = Vec::new();
        for i in 0..8 {
            let d = f64::from(i) * 0.1;
            events.push(Event::new(format!("a{i}"), d, -d));
        }
        for i in 0..4 {
            let d = f64::from(i) * 0.1;
            events.push(Event::new(format!("b{i}"), 100.0 + d, d));
        }
        let events = EventSet::new(Crs::Projected, events).unwrap();
        let params = KdeParams::new(4.0, 1.0).with_threshold(DensityThreshold::Relative(0.3));
        let mut hotspots = detect(&events, &params).unwrap();
        assert_eq!(hotspots.len(), 2);
        hotspots.sort_by(|a, b| b.score.total_cmp(&a.score));
        assert!(hotspots[0].location.x < 50.0);
        assert!(hotspots[1].location.x > 50.0);
        assert!(hotspots[0].score > hotspots[1].score);
    }

    #[test]
    fn isolated_peak_gets_a_hull_extent() {
        let events = cluster_with_singleton();
        let params = KdeParams::new(5.0, 1.0).with_threshold(DensityThreshold::Relative(0.5));
        let hotspots = detect(&events, &params).unwrap();
        let extent = &hotspots[0].extent;
        assert!(matches!(extent, Extent::Hull { .. }), "{extent:?}");
        // Half-max region of a ~5 unit Gaussian spans a few units around
        // the peak, never the whole padded grid.
        assert!(extent.area() > 1.0 && extent.area() < 400.0);
    }

    #[test]
    fn epanechnikov_kernel_also_finds_the_cluster() {
        let events = cluster_with_singleton();
        let params = KdeParams::new(5.0, 1.0)
            .with_kernel(Kernel::Epanechnikov)
            .with_threshold(DensityThreshold::Relative(0.5));
        let hotspots = detect(&events, &params).unwrap();
        assert_eq!(hotspots.len(), 1);
    }

    #[test]
    fn adjacent_peaks_are_suppressed() {
        let grid = DensityGrid {
            origin: Coordinate::new(0.0, 0.0),
            resolution: 1.0,
            cols: 4,
            rows: 3,
            values: vec![
                0.0, 0.0, 0.0, 0.0, //
                0.0, 5.0, 4.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, //
            ],
        };
        let kept = suppress_adjacent(&grid, vec![5, 6]);
        assert_eq!(kept, vec![5]);
    }

    #[test]
    fn plateau_yields_single_maximum() {
        let grid = DensityGrid {
            origin: Coordinate::new(0.0, 0.0),
            resolution: 1.0,
            cols: 4,
            rows: 3,
            values: vec![
                0.0, 0.0, 0.0, 0.0, //
                0.0, 3.0, 3.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, //
            ],
        };
        assert_eq!(local_maxima(&grid, 1.0), vec![5]);
    }

    fn diamond_grid() -> DensityGrid {
        let mut values = vec![0.0; 49];
        values[3 * 7 + 3] = 4.0;
        for idx in [2 * 7 + 3, 4 * 7 + 3, 3 * 7 + 2, 3 * 7 + 4] {
            values[idx] = 3.0;
        }
        DensityGrid {
            origin: Coordinate::new(0.0, 0.0),
            resolution: 1.0,
            cols: 7,
            rows: 7,
            values,
        }
    }

    #[test]
    fn half_max_region_becomes_a_hull() {
        let grid = diamond_grid();
        let peak = grid.idx(3, 3);
        let extent = half_max_extent(&grid, peak, &BTreeSet::from([peak]), 2.5);
        let Extent::Hull { vertices } = &extent else {
            panic!("expected hull, got {extent:?}");
        };
        assert_eq!(vertices.len(), 4);
        assert!((extent.area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn half_max_region_reaching_another_peak_falls_back_to_circle() {
        let grid = diamond_grid();
        let peak = grid.idx(3, 3);
        let peaks = BTreeSet::from([peak, grid.idx(4, 3)]);
        assert_eq!(
            half_max_extent(&grid, peak, &peaks, 2.5),
            Extent::Circle {
                center: Coordinate::new(3.0, 3.0),
                radius: 2.5,
            }
        );
    }

    #[test]
    fn requires_two_events() {
        let events = EventSet::new(Crs::Projected, vec![Event::new("a", 0.0, 0.0)]).unwrap();
        let err = detect(&events, &KdeParams::new(1.0, 1.0)).unwrap_err();
        assert_eq!(
            err,
            DetectError::InsufficientData {
                strategy: StrategyKind::Kde,
                required: 2,
                actual: 1,
                reason: "events for a kernel density estimate",
            }
        );
    }

    #[test]
    fn rejects_invalid_parameters() {
        let events = cluster_with_singleton();
        for (params, name) in [
            (KdeParams::new(0.0, 1.0), "bandwidth"),
            (KdeParams::new(-1.0, 1.0), "bandwidth"),
            (KdeParams::new(1.0, 0.0), "resolution"),
            (
                KdeParams::new(1.0, 1.0).with_threshold(DensityThreshold::Relative(1.5)),
                "threshold",
            ),
            (
                KdeParams::new(1.0, 1.0).with_threshold(DensityThreshold::Absolute(f64::NAN)),
                "threshold",
            ),
            (KdeParams::new(1.0, 1e-4), "resolution"),
        ] {
            let err = detect(&events, &params).unwrap_err();
            assert!(
                matches!(err, DetectError::InvalidParameter { name: n, .. } if n == name),
                "{params:?}: {err:?}"
            );
        }
    }

    #[test]
    fn zero_weights_are_insufficient() {
        let events = EventSet::new(
            Crs::Projected,
            vec![
                Event::new("a", 0.0, 0.0).with_weight(0.0),
                Event::new("b", 1.0, 0.0).with_weight(0.0),
            ],
        )
        .unwrap();
        let mut params = KdeParams::new(1.0, 0.5);
        params.weighted = true;
        assert!(matches!(
            detect(&events, &params),
            Err(DetectError::InsufficientData { .. })
        ));
    }
}
