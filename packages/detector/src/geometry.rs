//! Extent helpers shared by the strategies.

use basel_hotspots_detector_models::Extent;
use basel_hotspots_event_models::Coordinate;
use geo::{Area as _, ConvexHull as _, MultiPoint, Point};

/// Arithmetic mean of `points`. Callers guarantee a non-empty slice.
#[allow(clippy::cast_precision_loss)]
pub fn centroid(points: &[Coordinate]) -> Coordinate {
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Coordinate::new(sx / n, sy / n)
}

/// Convex hull of `points`, or the bounding circle around `center` when the
/// hull has no area (fewer than three distinct, non-collinear points).
pub fn hull_or_circle(points: &[Coordinate], center: Coordinate) -> Extent {
    if points.len() >= 3 {
        let multi: MultiPoint<f64> = points.iter().map(|c| Point::new(c.x, c.y)).collect();
        let hull = multi.convex_hull();
        if hull.unsigned_area() > 0.0 {
            let mut vertices: Vec<Coordinate> = hull
                .exterior()
                .coords()
                .map(|c| Coordinate::new(c.x, c.y))
                .collect();
            // Exterior rings are closed; drop the repeated first vertex.
            if vertices.len() > 1 && vertices.first() == vertices.last() {
                vertices.pop();
            }
            return Extent::Hull { vertices };
        }
    }
    bounding_circle(points, center)
}

/// Smallest circle around `center` containing every point.
pub fn bounding_circle(points: &[Coordinate], center: Coordinate) -> Extent {
    let radius = points
        .iter()
        .map(|p| p.distance(&center))
        .fold(0.0, f64::max);
    Extent::Circle { center, radius }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_is_mean() {
        let c = centroid(&[Coordinate::new(0.0, 0.0), Coordinate::new(4.0, 2.0)]);
        assert_eq!(c, Coordinate::new(2.0, 1.0));
    }

    #[test]
    fn square_gives_open_hull() {
        let points = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(2.0, 0.0),
            Coordinate::new(2.0, 2.0),
            Coordinate::new(0.0, 2.0),
            Coordinate::new(1.0, 1.0),
        ];
        let extent = hull_or_circle(&points, centroid(&points));
        let Extent::Hull { vertices } = &extent else {
            panic!("expected hull, got {extent:?}");
        };
        assert_eq!(vertices.len(), 4);
        assert!((extent.area() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_points_fall_back_to_circle() {
        let points = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(2.0, 0.0),
        ];
        let extent = hull_or_circle(&points, Coordinate::new(1.0, 0.0));
        assert_eq!(
            extent,
            Extent::Circle {
                center: Coordinate::new(1.0, 0.0),
                radius: 1.0
            }
        );
    }
}
