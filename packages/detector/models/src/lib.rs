#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hotspot detection parameters and result types.
//!
//! A [`Strategy`] is a closed set of tagged variants, one per detection
//! approach, each carrying its own parameter struct. Every strategy produces
//! [`Hotspot`]s, which the detector orders into a [`HotspotRanking`].
//!
//! All parameter types deserialize from TOML so detection runs can be
//! described in configuration files:
//!
//! ```toml
//! [[strategies]]
//! type = "grid"
//! cell_size = { count = 75 }
//! threshold = 5.0
//!
//! [[strategies]]
//! type = "distance"
//! radius = 40.0
//! min_size = 8
//! ```

use basel_hotspots_event_models::Coordinate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Which detection approach produced a result.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StrategyKind {
    /// Regular grid binning with per-cell counts
    Grid,
    /// Kernel density estimation peak extraction
    Kde,
    /// Density-based distance clustering
    Distance,
}

impl StrategyKind {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Grid, Self::Kde, Self::Distance]
    }
}

// ── Grid binning ─────────────────────────────────────────────────────────

/// Size of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellSize {
    /// Side length in coordinate units.
    Length(f64),
    /// Number of cells across the wider side of the events' bounding box.
    /// Events along a north-south line still get cells of non-zero size.
    Count(u32),
}

/// Parameters for grid-binning detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    pub cell_size: CellSize,
    /// Minimum accumulated score for a cell to be reported.
    #[serde(default = "default_grid_threshold")]
    pub threshold: f64,
    /// Accumulate event weights instead of counting events.
    #[serde(default)]
    pub weighted: bool,
}

const fn default_grid_threshold() -> f64 {
    1.0
}

impl GridParams {
    #[must_use]
    pub const fn new(cell_size: CellSize, threshold: f64) -> Self {
        Self {
            cell_size,
            threshold,
            weighted: false,
        }
    }
}

// ── KDE peaks ────────────────────────────────────────────────────────────

/// Smoothing kernel used by KDE.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Kernel {
    /// Bivariate normal kernel, truncated at three bandwidths.
    #[default]
    Gaussian,
    /// Bivariate Epanechnikov kernel with compact support of one bandwidth.
    Epanechnikov,
}

impl Kernel {
    /// Kernel value at normalized distance `u = d / h`.
    ///
    /// Normalized so that it integrates to 1 over the plane for `h = 1`.
    #[must_use]
    pub fn value(self, u: f64) -> f64 {
        match self {
            Self::Gaussian => {
                if u > Self::GAUSSIAN_CUTOFF {
                    0.0
                } else {
                    (-0.5 * u * u).exp() / std::f64::consts::TAU
                }
            }
            Self::Epanechnikov => {
                if u >= 1.0 {
                    0.0
                } else {
                    std::f64::consts::FRAC_2_PI * (1.0 - u * u)
                }
            }
        }
    }

    /// Distance beyond which the kernel contributes nothing.
    #[must_use]
    pub fn support_radius(self, bandwidth: f64) -> f64 {
        match self {
            Self::Gaussian => Self::GAUSSIAN_CUTOFF * bandwidth,
            Self::Epanechnikov => bandwidth,
        }
    }

    /// Distance at which a single event's kernel drops to half its peak.
    #[must_use]
    pub fn half_max_radius(self, bandwidth: f64) -> f64 {
        match self {
            Self::Gaussian => (2.0 * std::f64::consts::LN_2).sqrt() * bandwidth,
            Self::Epanechnikov => std::f64::consts::FRAC_1_SQRT_2 * bandwidth,
        }
    }

    const GAUSSIAN_CUTOFF: f64 = 3.0;
}

/// Minimum density for a KDE peak to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityThreshold {
    /// Absolute density value.
    Absolute(f64),
    /// Fraction of the highest density on the evaluation grid, in `(0, 1]`.
    Relative(f64),
}

impl Default for DensityThreshold {
    fn default() -> Self {
        Self::Relative(0.25)
    }
}

/// Parameters for KDE peak detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KdeParams {
    /// Kernel bandwidth in coordinate units.
    pub bandwidth: f64,
    /// Spacing of the evaluation grid in coordinate units.
    pub resolution: f64,
    #[serde(default)]
    pub threshold: DensityThreshold,
    #[serde(default)]
    pub kernel: Kernel,
    /// Weight each event's kernel by the event weight.
    #[serde(default)]
    pub weighted: bool,
}

impl KdeParams {
    #[must_use]
    pub fn new(bandwidth: f64, resolution: f64) -> Self {
        Self {
            bandwidth,
            resolution,
            threshold: DensityThreshold::default(),
            kernel: Kernel::default(),
            weighted: false,
        }
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: DensityThreshold) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }
}

// ── Distance clustering ──────────────────────────────────────────────────

/// Parameters for density-based distance clustering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceParams {
    /// Neighbourhood radius in coordinate units.
    pub radius: f64,
    /// Minimum number of events (including itself) around a core event.
    pub min_size: usize,
}

impl DistanceParams {
    #[must_use]
    pub const fn new(radius: f64, min_size: usize) -> Self {
        Self { radius, min_size }
    }
}

// ── Strategy ─────────────────────────────────────────────────────────────

/// A detection approach together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    Grid(GridParams),
    Kde(KdeParams),
    Distance(DistanceParams),
}

impl Strategy {
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::Grid(_) => StrategyKind::Grid,
            Self::Kde(_) => StrategyKind::Kde,
            Self::Distance(_) => StrategyKind::Distance,
        }
    }
}

impl From<GridParams> for Strategy {
    fn from(params: GridParams) -> Self {
        Self::Grid(params)
    }
}

impl From<KdeParams> for Strategy {
    fn from(params: KdeParams) -> Self {
        Self::Kde(params)
    }
}

impl From<DistanceParams> for Strategy {
    fn from(params: DistanceParams) -> Self {
        Self::Distance(params)
    }
}

// ── Results ──────────────────────────────────────────────────────────────

/// Spatial extent of a hotspot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Extent {
    /// Axis-aligned grid cell.
    Cell { min: Coordinate, max: Coordinate },
    /// Circle around a point.
    Circle { center: Coordinate, radius: f64 },
    /// Convex polygon, counter-clockwise, first vertex not repeated.
    Hull { vertices: Vec<Coordinate> },
}

impl Extent {
    /// Area in squared coordinate units.
    #[must_use]
    pub fn area(&self) -> f64 {
        match self {
            Self::Cell { min, max } => (max.x - min.x) * (max.y - min.y),
            Self::Circle { radius, .. } => std::f64::consts::PI * radius * radius,
            Self::Hull { vertices } => {
                let n = vertices.len();
                let twice: f64 = (0..n)
                    .map(|i| {
                        let a = vertices[i];
                        let b = vertices[(i + 1) % n];
                        a.x.mul_add(b.y, -(b.x * a.y))
                    })
                    .sum();
                twice.abs() / 2.0
            }
        }
    }
}

/// A detected cluster of elevated event density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    /// Cell centroid, density peak, or member centroid.
    pub location: Coordinate,
    /// Count, weighted sum, density estimate, or cluster size.
    pub score: f64,
    pub extent: Extent,
    /// Number of events contributing to the hotspot.
    pub event_count: usize,
    pub strategy: StrategyKind,
}

/// Hotspots ordered by descending score, ties broken by location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotRanking {
    pub strategy: StrategyKind,
    pub hotspots: Vec<Hotspot>,
}

impl HotspotRanking {
    #[must_use]
    pub fn len(&self) -> usize {
        self.hotspots.len()
    }

    /// An empty ranking is a valid outcome, not an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hotspots.is_empty()
    }

    /// Hotspots paired with their 1-based rank.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &Hotspot)> {
        self.hotspots.iter().enumerate().map(|(i, h)| (i + 1, h))
    }
}
