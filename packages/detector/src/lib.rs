#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hotspot detection over an in-memory [`EventSet`].
//!
//! Three interchangeable approaches share one contract, the
//! [`DetectHotspots`] trait:
//!
//! - [`grid`]: bins events into a regular grid and reports dense cells.
//! - [`kde`]: evaluates a kernel density surface and reports its peaks.
//! - [`cluster`]: groups events with a density-based (core/border/noise)
//!   distance rule and reports each cluster.
//!
//! Raw hotspots from any approach go through [`ranking::rank`], which sorts
//! by score and breaks ties by location so repeated runs produce identical
//! output.
//!
//! Every strategy is a pure function of its inputs. [`compare`] exploits
//! that by running several strategies over the same event set on scoped
//! threads without any synchronization.
//!
//! # Usage
//!
//! ```rust
//! use basel_hotspots_detector::detect;
//! use basel_hotspots_detector_models::{CellSize, GridParams, Strategy};
//! use basel_hotspots_event_models::{Crs, Event, EventSet};
//!
//! let events = EventSet::new(
//!     Crs::Projected,
//!     vec![Event::new("a", 1.0, 1.0), Event::new("b", 2.0, 2.0)],
//! )
//! .unwrap();
//! let strategy = Strategy::Grid(GridParams::new(CellSize::Length(10.0), 1.0));
//! let ranking = detect(&events, &strategy, Some(5)).unwrap();
//! assert_eq!(ranking.hotspots[0].score, 2.0);
//! ```

pub mod cluster;
mod geometry;
pub mod grid;
pub mod kde;
pub mod ranking;

use basel_hotspots_detector_models::{
    DistanceParams, GridParams, Hotspot, HotspotRanking, KdeParams, Strategy, StrategyKind,
};
use basel_hotspots_event_models::EventSet;

/// Errors from hotspot detection.
///
/// An empty result is not an error: it is returned as an empty
/// [`HotspotRanking`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectError {
    /// A caller-supplied parameter is outside its valid domain.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was refused.
        reason: String,
    },

    /// The event set is too small or degenerate for the strategy.
    #[error("Insufficient data for {strategy} detection: {reason} (need {required}, got {actual})")]
    InsufficientData {
        /// Strategy that refused the input.
        strategy: StrategyKind,
        /// Minimum required quantity.
        required: usize,
        /// Quantity supplied.
        actual: usize,
        /// What was counted.
        reason: &'static str,
    },

    /// The detection thread stopped before producing a result.
    #[error("{strategy} detection aborted before completion")]
    Aborted {
        /// Strategy whose run was lost.
        strategy: StrategyKind,
    },
}

impl DetectError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Common capability of every detection approach.
pub trait DetectHotspots {
    /// Which approach this is.
    fn kind(&self) -> StrategyKind;

    /// Produces unranked hotspots.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError`] if a parameter is invalid or the event set is
    /// unusable for this approach.
    fn detect_raw(&self, events: &EventSet) -> Result<Vec<Hotspot>, DetectError>;

    /// Produces hotspots ranked by score, truncated to `top_n` if given.
    ///
    /// # Errors
    ///
    /// Same as [`DetectHotspots::detect_raw`].
    fn detect(&self, events: &EventSet, top_n: Option<usize>) -> Result<HotspotRanking, DetectError> {
        let hotspots = self.detect_raw(events)?;
        Ok(ranking::rank(self.kind(), hotspots, top_n))
    }
}

impl DetectHotspots for GridParams {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Grid
    }

    fn detect_raw(&self, events: &EventSet) -> Result<Vec<Hotspot>, DetectError> {
        grid::detect(events, self)
    }
}

impl DetectHotspots for KdeParams {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Kde
    }

    fn detect_raw(&self, events: &EventSet) -> Result<Vec<Hotspot>, DetectError> {
        kde::detect(events, self)
    }
}

impl DetectHotspots for DistanceParams {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Distance
    }

    fn detect_raw(&self, events: &EventSet) -> Result<Vec<Hotspot>, DetectError> {
        cluster::detect(events, self)
    }
}

impl DetectHotspots for Strategy {
    fn kind(&self) -> StrategyKind {
        Self::kind(self)
    }

    fn detect_raw(&self, events: &EventSet) -> Result<Vec<Hotspot>, DetectError> {
        match self {
            Self::Grid(params) => params.detect_raw(events),
            Self::Kde(params) => params.detect_raw(events),
            Self::Distance(params) => params.detect_raw(events),
        }
    }
}

/// Runs one strategy and ranks its hotspots.
///
/// # Errors
///
/// Returns [`DetectError`] if the strategy's parameters are invalid or the
/// event set is unusable for it. No partial ranking is ever returned.
pub fn detect(
    events: &EventSet,
    strategy: &Strategy,
    top_n: Option<usize>,
) -> Result<HotspotRanking, DetectError> {
    log::debug!(
        "Running {} detection over {} events",
        strategy.kind(),
        events.len()
    );
    let ranking = DetectHotspots::detect(strategy, events, top_n)?;
    log::info!(
        "{} detection found {} hotspots",
        ranking.strategy,
        ranking.len()
    );
    Ok(ranking)
}

/// Runs several strategies over the same events in parallel.
///
/// Results are returned in the order of `strategies`. Each strategy only
/// reads the shared event set, so the threads need no synchronization.
#[must_use]
pub fn compare(
    events: &EventSet,
    strategies: &[Strategy],
    top_n: Option<usize>,
) -> Vec<Result<HotspotRanking, DetectError>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = strategies
            .iter()
            .map(|strategy| {
                let handle = scope.spawn(move || detect(events, strategy, top_n));
                (strategy.kind(), handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(kind, handle)| {
                handle.join().unwrap_or_else(|_| {
                    log::error!("{kind} detection thread panicked");
                    Err(DetectError::Aborted { strategy: kind })
                })
            })
            .collect()
    })
}
