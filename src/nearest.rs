//! Nearest-segment queries.
//!
//! Answers "how far is this coordinate from the route" by projecting the coordinate onto
//! every segment and keeping the minimum. Distances are geographic meters; use
//! [`min_screen_distance_to_route`] for on-screen points.
//!
//! Routes with at least [`SPATIAL_INDEX_MIN_SEGMENTS`] segments carry an R-tree of
//! segment envelopes built at construction. The index only prunes segments that cannot
//! beat the current best, so indexed and linear queries return the same distance.
//! Segments crossing the antimeridian get an envelope spanning every longitude so that
//! no window can miss them.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geo_utils::{meters_per_point, project_onto_segment, SegmentProjection, MEAN_EARTH_RADIUS};
use crate::{Coordinate, Route};

/// Distance reported when there is no route to measure against.
///
/// Callers compare against this value with `==` to detect "no active route".
pub const NO_ROUTE_DISTANCE: f64 = f64::MAX;

/// Segment count from which routes build a spatial index.
pub const SPATIAL_INDEX_MIN_SEGMENTS: usize = 512;

/// The segment of a route closest to a query coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestSegment {
    /// Index of the segment's start waypoint
    pub segment: usize,
    /// Closest point on that segment and its distance in meters
    pub projection: SegmentProjection,
}

/// Minimum distance in meters from `point` to any segment of `route`.
///
/// # Arguments
///
/// * `point` - Query coordinate, typically the user's location
/// * `route` - Route to measure against, or `None` when no route is active
///
/// # Returns
///
/// The distance in meters, or [`NO_ROUTE_DISTANCE`] when `route` is `None`.
///
/// # Example
/// ```
/// use directions_overlay::{Coordinate, Route, TravelMode, min_distance_to_route, NO_ROUTE_DISTANCE};
///
/// let start = Coordinate::new(51.38713, -1.0316);
/// let route = Route::new(vec![start, Coordinate::new(51.4554, -0.9742)], TravelMode::FastestDriving)?;
///
/// assert!(min_distance_to_route(&start, Some(&route)) < 1e-6);
/// assert_eq!(min_distance_to_route(&start, None), NO_ROUTE_DISTANCE);
/// # Ok::<(), directions_overlay::DirectionsError>(())
/// ```
///
/// # Performance
///
/// O(n) in the number of segments for short routes. Routes with at least
/// [`SPATIAL_INDEX_MIN_SEGMENTS`] segments answer from their R-tree, typically in
/// O(log n).
pub fn min_distance_to_route(point: &Coordinate, route: Option<&Route>) -> f64 {
    route
        .and_then(|route| nearest_segment(point, route))
        .map_or(NO_ROUTE_DISTANCE, |nearest| nearest.projection.distance)
}

/// Minimum distance from `point` to `route` in on-screen points at `zoom`, for a map
/// drawn with `tile_size` point tiles.
///
/// The ground resolution is taken at the query coordinate's latitude. Returns
/// [`NO_ROUTE_DISTANCE`] unchanged when `route` is `None`.
pub fn min_screen_distance_to_route(
    point: &Coordinate,
    route: Option<&Route>,
    zoom: f64,
    tile_size: f64,
) -> f64 {
    let meters = min_distance_to_route(point, route);
    if meters == NO_ROUTE_DISTANCE {
        return NO_ROUTE_DISTANCE;
    }
    meters / meters_per_point(point.latitude, zoom, tile_size)
}

/// Find the segment of `route` closest to `point`.
///
/// When several segments are equally close the one appearing first in the route wins,
/// though callers should only rely on the distance.
pub fn nearest_segment(point: &Coordinate, route: &Route) -> Option<NearestSegment> {
    match route.segment_index() {
        Some(index) => index.nearest(point, route),
        None => linear_nearest(point, route),
    }
}

/// Parallel variant of [`min_distance_to_route`] for very long routes.
#[cfg(feature = "parallel")]
pub fn min_distance_to_route_parallel(point: &Coordinate, route: Option<&Route>) -> f64 {
    use rayon::prelude::*;

    let Some(route) = route else {
        return NO_ROUTE_DISTANCE;
    };

    route
        .waypoints()
        .par_windows(2)
        .map(|w| project_onto_segment(point, &w[0].coordinate, &w[1].coordinate).distance)
        .reduce(|| NO_ROUTE_DISTANCE, f64::min)
}

/// Minimum distance for each of `points`, computed in parallel.
///
/// Useful for checking a buffered batch of location fixes at once.
#[cfg(feature = "parallel")]
pub fn min_distances_to_route(points: &[Coordinate], route: Option<&Route>) -> Vec<f64> {
    use rayon::prelude::*;

    points
        .par_iter()
        .map(|p| min_distance_to_route(p, route))
        .collect()
}

fn linear_nearest(point: &Coordinate, route: &Route) -> Option<NearestSegment> {
    route
        .segments()
        .enumerate()
        .map(|(segment, (start, end))| NearestSegment {
            segment,
            projection: project_onto_segment(point, start, end),
        })
        .min_by(|a, b| a.projection.distance.total_cmp(&b.projection.distance))
}

// =============================================================================
// R-tree Segment Index
// =============================================================================

/// A route segment with its start waypoint index, in `[lng, lat]` space
#[derive(Debug, Clone, Copy)]
struct IndexedSegment {
    idx: usize,
    start: [f64; 2],
    end: [f64; 2],
}

impl IndexedSegment {
    /// Whether the segment takes the short way across the antimeridian.
    fn wraps(&self) -> bool {
        (self.end[0] - self.start[0]).abs() > 180.0
    }
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        if self.wraps() {
            AABB::from_corners(
                [-180.0, self.start[1].min(self.end[1])],
                [180.0, self.start[1].max(self.end[1])],
            )
        } else {
            AABB::from_corners(self.start, self.end)
        }
    }
}

impl PointDistance for IndexedSegment {
    // Planar distance in degrees, only used to pick a starting candidate
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.end[0] - self.start[0];
        let dy = self.end[1] - self.start[1];
        let len_2 = dx * dx + dy * dy;
        let t = if len_2 > 0.0 {
            (((point[0] - self.start[0]) * dx + (point[1] - self.start[1]) * dy) / len_2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let fx = self.start[0] + t * dx - point[0];
        let fy = self.start[1] + t * dy - point[1];
        fx * fx + fy * fy
    }
}

/// Spatial index over the segments of one route.
#[derive(Debug, Clone)]
pub(crate) struct SegmentIndex {
    tree: RTree<IndexedSegment>,
}

impl SegmentIndex {
    pub(crate) fn build(coordinates: &[Coordinate]) -> Self {
        let segments: Vec<IndexedSegment> = coordinates
            .windows(2)
            .enumerate()
            .map(|(idx, w)| IndexedSegment {
                idx,
                start: [w[0].longitude, w[0].latitude],
                end: [w[1].longitude, w[1].latitude],
            })
            .collect();
        Self { tree: RTree::bulk_load(segments) }
    }

    fn nearest(&self, point: &Coordinate, route: &Route) -> Option<NearestSegment> {
        let project = |segment: &IndexedSegment| {
            let waypoints = route.waypoints();
            NearestSegment {
                segment: segment.idx,
                projection: project_onto_segment(
                    point,
                    &waypoints[segment.idx].coordinate,
                    &waypoints[segment.idx + 1].coordinate,
                ),
            }
        };

        let seed = self.tree.nearest_neighbor(&[point.longitude, point.latitude])?;
        let mut best = project(seed);

        // Any segment closer than `best` has its closest point inside this window
        let Some(window) = search_window(point, best.projection.distance) else {
            return linear_nearest(point, route);
        };

        for candidate in self.tree.locate_in_envelope_intersecting(&window) {
            let nearest = project(candidate);
            let closer = nearest.projection.distance < best.projection.distance;
            let tie_earlier = nearest.projection.distance == best.projection.distance && nearest.segment < best.segment;
            if closer || tie_earlier {
                best = nearest;
            }
        }

        Some(best)
    }
}

/// Latitude/longitude box holding every coordinate within `radius` meters of `point`.
///
/// Returns `None` when the box would reach a pole or wrap the antimeridian.
fn search_window(point: &Coordinate, radius: f64) -> Option<AABB<[f64; 2]>> {
    // Angular radius, widened against rounding in the haversine evaluation
    let delta = radius / MEAN_EARTH_RADIUS * (1.0 + 1e-9) + 1e-12;
    if !delta.is_finite() || delta >= std::f64::consts::FRAC_PI_2 {
        return None;
    }

    let dlat = delta.to_degrees();
    let min_lat = point.latitude - dlat;
    let max_lat = point.latitude + dlat;
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return None;
    }

    let ratio = delta.sin() / point.latitude.to_radians().cos();
    if ratio.is_nan() || ratio >= 1.0 {
        return None;
    }

    let dlng = ratio.asin().to_degrees();
    let min_lng = point.longitude - dlng;
    let max_lng = point.longitude + dlng;
    if min_lng < -180.0 || max_lng > 180.0 {
        return None;
    }

    Some(AABB::from_corners([min_lng, min_lat], [max_lng, max_lat]))
}

// ============================================================================
// Tests
// ============================================================================
