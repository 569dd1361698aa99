//! Deterministic ordering of raw hotspots.

use std::cmp::Ordering;

use basel_hotspots_detector_models::{Hotspot, HotspotRanking, StrategyKind};

/// Orders hotspots by descending score, breaking ties by ascending location
/// (`x`, then `y`).
#[must_use]
pub fn compare_hotspots(a: &Hotspot, b: &Hotspot) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.location.total_cmp(&b.location))
}

/// Sorts `hotspots` into a ranking, keeping at most `top_n` of them.
#[must_use]
pub fn rank(strategy: StrategyKind, mut hotspots: Vec<Hotspot>, top_n: Option<usize>) -> HotspotRanking {
    hotspots.sort_by(compare_hotspots);
    if let Some(n) = top_n {
        hotspots.truncate(n);
    }
    HotspotRanking { strategy, hotspots }
}
