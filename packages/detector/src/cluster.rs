//! Density-based distance clustering.
//!
//! An event is a *core* event when at least `min_size` events (itself
//! included) lie within `radius` of it. Core events within `radius` of each
//! other chain into one cluster; non-core events within `radius` of a core
//! event join it as *border* events; everything else is noise.
//!
//! Events are first put into canonical order (position, id, timestamp), so
//! cluster membership and numbering never depend on input order. Clusters
//! are seeded from the lowest unclaimed core event, and a border event
//! reachable from several clusters belongs to the one seeded first.

use std::collections::VecDeque;

use basel_hotspots_detector_models::{DistanceParams, Hotspot, StrategyKind};
use basel_hotspots_event_models::{Coordinate, Event, EventSet};
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::DetectError;
use crate::geometry;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Clusters `events` and returns one hotspot per cluster.
///
/// With `min_size = 1` every event is its own cluster.
///
/// # Errors
///
/// * [`DetectError::InvalidParameter`] if `radius` is not a positive finite
///   number or `min_size` is zero.
/// * [`DetectError::InsufficientData`] if `events` is empty.
pub fn detect(events: &EventSet, params: &DistanceParams) -> Result<Vec<Hotspot>, DetectError> {
    validate(params)?;

    if events.is_empty() {
        return Err(DetectError::InsufficientData {
            strategy: StrategyKind::Distance,
            required: 1,
            actual: 0,
            reason: "events to cluster",
        });
    }

    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by(|a, b| a.canonical_cmp(b));
    let positions: Vec<Coordinate> = ordered.iter().map(|e| e.position).collect();

    if params.min_size == 1 {
        return Ok(positions
            .iter()
            .map(|&p| cluster_hotspot(&[p]))
            .collect());
    }

    let labels = label(&positions, params);
    let cluster_count = labels.iter().flatten().max().map_or(0, |max| max + 1);

    let mut members: Vec<Vec<Coordinate>> = vec![Vec::new(); cluster_count];
    for (position, label) in positions.iter().zip(&labels) {
        if let Some(cluster) = label {
            members[*cluster].push(*position);
        }
    }
    log::debug!(
        "{cluster_count} clusters, {} noise events",
        labels.iter().filter(|l| l.is_none()).count()
    );

    Ok(members.iter().map(|m| cluster_hotspot(m)).collect())
}

fn validate(params: &DistanceParams) -> Result<(), DetectError> {
    if !(params.radius.is_finite() && params.radius > 0.0) {
        return Err(DetectError::invalid(
            "radius",
            format!(
                "radius must be a positive finite number, got {}",
                params.radius
            ),
        ));
    }
    if params.min_size == 0 {
        return Err(DetectError::invalid("min_size", "min_size must be at least 1"));
    }
    Ok(())
}

/// Cluster label of every position, `None` for noise.
fn label(positions: &[Coordinate], params: &DistanceParams) -> Vec<Option<usize>> {
    let tree = RTree::bulk_load(
        positions
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new([p.x, p.y], i))
            .collect(),
    );
    let radius_2 = params.radius * params.radius;

    let neighbours: Vec<Vec<usize>> = positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut found: Vec<usize> = tree
                .locate_within_distance([p.x, p.y], radius_2)
                .map(|n| n.data)
                .filter(|&j| j != i)
                .collect();
            found.sort_unstable();
            found
        })
        .collect();
    let is_core: Vec<bool> = neighbours
        .iter()
        .map(|n| n.len() + 1 >= params.min_size)
        .collect();

    let mut labels: Vec<Option<usize>> = vec![None; positions.len()];
    let mut next_cluster = 0;
    for seed in 0..positions.len() {
        if !is_core[seed] || labels[seed].is_some() {
            continue;
        }
        let cluster = next_cluster;
        next_cluster += 1;
        labels[seed] = Some(cluster);

        let mut queue = VecDeque::from([seed]);
        while let Some(current) = queue.pop_front() {
            for &n in &neighbours[current] {
                if labels[n].is_some() {
                    continue;
                }
                labels[n] = Some(cluster);
                if is_core[n] {
                    queue.push_back(n);
                }
            }
        }
    }

    labels
}

#[allow(clippy::cast_precision_loss)]
fn cluster_hotspot(members: &[Coordinate]) -> Hotspot {
    let location = geometry::centroid(members);
    Hotspot {
        location,
        score: members.len() as f64,
        extent: geometry::hull_or_circle(members, location),
        event_count: members.len(),
        strategy: StrategyKind::Distance,
    }
}
