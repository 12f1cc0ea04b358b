//! # Geographic Utilities
//!
//! Coordinate and distance primitives used by every query in this crate.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates |
//! | [`polyline_length`] | Total length of a coordinate sequence in meters |
//! | [`project_onto_segment`] | Closest point on a finite segment to a coordinate |
//! | [`longitude_delta`] | Shortest signed longitude difference, across the antimeridian |
//! | [`meters_per_point`] | Ground resolution of the map at a latitude and zoom |
//! | [`to_screen_distance`] | Convert meters to on-screen points at a location and zoom |
//! | [`world_point`] / [`from_world_point`] | Web Mercator world-space projection |
//!
//! ## Example
//!
//! ```rust
//! use directions_overlay::{Coordinate, geo_utils};
//!
//! let start = Coordinate::new(51.38713, -1.0316);
//! let end = Coordinate::new(51.4554, -0.9742);
//!
//! let meters = geo_utils::haversine_distance(&start, &end);
//! let points = geo_utils::to_screen_distance(meters, &start, 12.0);
//! println!("{:.0}m is {:.0}pt on screen at zoom 12", meters, points);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Great-circle distance on a sphere with the mean Earth radius (6,371,008.8 m).
//! Symmetric, zero for identical coordinates and satisfies the triangle inequality.
//!
//! ### Segment Projection
//!
//! The perpendicular foot is found in a local equirectangular plane centred on the
//! query coordinate (longitude scaled by `cos(latitude)`), clamped to the segment, and
//! the reported distance is the haversine distance to that foot. At route scale
//! (segments of a few kilometres) the planar foot is within centimetres of the
//! spherical one.
//!
//! Longitude differences always take the short way round, so a segment between
//! `179.9` and `-179.9` is 0.2 degrees wide and crosses the antimeridian.
//!
//! ### Screen Conversion
//!
//! Map surfaces use Web Mercator with square tiles (`256` points at zoom 0). The ground
//! distance covered by one point shrinks with `cos(latitude)` and halves with every zoom
//! level.

use geo::{Distance, Haversine, Point};

use crate::Coordinate;

/// Mean Earth radius in meters, matching `geo`'s haversine implementation.
pub const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;

/// WGS84 equatorial radius in meters, the sphere Web Mercator is defined on.
pub const EQUATORIAL_EARTH_RADIUS: f64 = 6_378_137.0;

/// Tile edge length in points at zoom level 0.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the Web Mercator projection.
pub const MERCATOR_MAX_LATITUDE: f64 = 85.051_128_78;

/// Squared planar segment length below which a segment is treated as a single point.
const DEGENERATE_SEGMENT_EPSILON: f64 = 1e-18;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two coordinates using the Haversine formula.
///
/// # Arguments
///
/// * `p1` - First coordinate
/// * `p2` - Second coordinate
///
/// # Returns
///
/// Distance in meters along the surface of a sphere with the mean Earth radius.
///
/// # Example
///
/// ```rust
/// use directions_overlay::{Coordinate, geo_utils};
///
/// let london = Coordinate::new(51.5074, -0.1278);
/// let paris = Coordinate::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
///
/// # Performance
///
/// O(1) with a handful of trigonometric calls. Called once per segment by every
/// distance query, so long routes use the spatial index in [`crate::nearest`].
#[inline]
pub fn haversine_distance(p1: &Coordinate, p2: &Coordinate) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the total length of a polyline in meters.
///
/// Sums the haversine distance between consecutive coordinates. Empty or single-point
/// input returns 0.0.
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Segment Projection
// =============================================================================

/// Result of projecting a coordinate onto a finite segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Closest point on the segment
    pub point: Coordinate,
    /// Position of `point` along the segment, in `[0, 1]` (0 = start, 1 = end)
    pub fraction: f64,
    /// Haversine distance from the query coordinate to `point`, in meters
    pub distance: f64,
}

/// Find the closest point on the segment `[seg_start, seg_end]` to `p`.
///
/// When the perpendicular foot falls outside the segment the result is clamped to the
/// nearer endpoint. A segment whose endpoints coincide is treated as a single point.
/// Segments crossing the antimeridian are handled.
///
/// # Arguments
///
/// * `p` - Query coordinate
/// * `seg_start` - First endpoint of the segment
/// * `seg_end` - Second endpoint of the segment
///
/// # Returns
///
/// The closest point, its position along the segment and its distance to `p` in meters.
/// The distance is never larger than the distance from `p` to either endpoint.
///
/// # Example
///
/// ```rust
/// use directions_overlay::{Coordinate, geo_utils};
///
/// let a = Coordinate::new(0.0, 0.0);
/// let b = Coordinate::new(0.0, 1.0);
/// let p = Coordinate::new(0.01, 0.5);
///
/// let projection = geo_utils::project_onto_segment(&p, &a, &b);
/// assert!((projection.fraction - 0.5).abs() < 1e-6);
/// assert!((projection.distance - 1_112.0).abs() < 5.0);
/// ```
pub fn project_onto_segment(
    p: &Coordinate,
    seg_start: &Coordinate,
    seg_end: &Coordinate,
) -> SegmentProjection {
    let cos_lat = p.latitude.to_radians().cos();

    // Local plane with `p` at the origin
    let ax = longitude_delta(p.longitude, seg_start.longitude) * cos_lat;
    let ay = seg_start.latitude - p.latitude;
    let dx = longitude_delta(seg_start.longitude, seg_end.longitude) * cos_lat;
    let dy = seg_end.latitude - seg_start.latitude;

    let len_2 = dx * dx + dy * dy;
    let fraction = if len_2 <= DEGENERATE_SEGMENT_EPSILON {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len_2).clamp(0.0, 1.0)
    };

    let foot = interpolate(seg_start, seg_end, fraction);
    let mut best = SegmentProjection {
        point: foot,
        fraction,
        distance: haversine_distance(p, &foot),
    };

    // The planar foot can lose to an endpoint by a hair on the sphere
    for (endpoint, endpoint_fraction) in [(seg_start, 0.0), (seg_end, 1.0)] {
        let d = haversine_distance(p, endpoint);
        if d < best.distance {
            best = SegmentProjection {
                point: *endpoint,
                fraction: endpoint_fraction,
                distance: d,
            };
        }
    }

    best
}

/// Linear interpolation in latitude/longitude between two coordinates.
///
/// Longitude moves the short way round; the result is wrapped back into `[-180, 180]`.
#[inline]
pub fn interpolate(a: &Coordinate, b: &Coordinate, fraction: f64) -> Coordinate {
    Coordinate::new(
        a.latitude + fraction * (b.latitude - a.latitude),
        wrap_longitude(a.longitude + fraction * longitude_delta(a.longitude, b.longitude)),
    )
}

/// Signed difference `to - from` in degrees, taking the short way round.
///
/// Always in `[-180, 180]`; a difference of exactly 180 degrees keeps its sign.
///
/// ```rust
/// use directions_overlay::geo_utils::longitude_delta;
///
/// assert_eq!(longitude_delta(10.0, 20.0), 10.0);
/// assert!((longitude_delta(179.9, -179.9) - 0.2).abs() < 1e-9);
/// ```
#[inline]
pub fn longitude_delta(from: f64, to: f64) -> f64 {
    wrap_longitude(to - from)
}

/// Bring a longitude into `[-180, 180]`. Values already in range are returned unchanged.
#[inline]
pub fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        longitude
    } else {
        (longitude + 180.0).rem_euclid(360.0) - 180.0
    }
}

// =============================================================================
// Web Mercator / Screen Conversion
// =============================================================================

/// Size of the whole world in points at the given zoom level.
#[inline]
pub fn world_size(zoom: f64, tile_size: f64) -> f64 {
    tile_size * zoom.exp2()
}

/// Ground distance in meters covered by one on-screen point at `latitude` and `zoom`.
///
/// Latitudes beyond the Mercator limit are clamped to it.
pub fn meters_per_point(latitude: f64, zoom: f64, tile_size: f64) -> f64 {
    let lat = latitude.clamp(-MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE);
    let equator = 2.0 * std::f64::consts::PI * EQUATORIAL_EARTH_RADIUS;
    lat.to_radians().cos() * equator / world_size(zoom, tile_size)
}

/// Convert a geographic distance at `coordinate` into on-screen points at `zoom`.
///
/// Assumes the standard [`TILE_SIZE`]; divide by [`meters_per_point`] directly for
/// surfaces with other tile sizes.
///
/// # Arguments
///
/// * `meters` - Ground distance
/// * `coordinate` - Where the distance is measured; sets the Mercator scale
/// * `zoom` - Map zoom level (fractional zooms allowed)
///
/// # Returns
///
/// The distance in on-screen points.
///
/// # Example
///
/// ```rust
/// use directions_overlay::{Coordinate, geo_utils};
///
/// let equator = Coordinate::new(0.0, 0.0);
/// // At zoom 0 the 40,075 km equator spans one 256pt tile
/// let points = geo_utils::to_screen_distance(40_075_016.686, &equator, 0.0);
/// assert!((points - 256.0).abs() < 0.01);
/// ```
pub fn to_screen_distance(meters: f64, coordinate: &Coordinate, zoom: f64) -> f64 {
    meters / meters_per_point(coordinate.latitude, zoom, TILE_SIZE)
}

/// Project a coordinate into Web Mercator world space, in points at `zoom`.
///
/// `x` grows eastwards from the antimeridian, `y` grows southwards from the northern
/// Mercator limit.
pub fn world_point(coordinate: &Coordinate, zoom: f64, tile_size: f64) -> (f64, f64) {
    let size = world_size(zoom, tile_size);
    let lat = coordinate
        .latitude
        .clamp(-MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE)
        .to_radians();

    let x = (coordinate.longitude + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * size;
    (x, y)
}

/// Inverse of [`world_point`]. Results are clamped to valid longitude and Mercator latitude.
pub fn from_world_point(x: f64, y: f64, zoom: f64, tile_size: f64) -> Coordinate {
    let size = world_size(zoom, tile_size);
    let longitude = (x / size * 360.0 - 180.0).clamp(-180.0, 180.0);
    let n = std::f64::consts::PI * (1.0 - 2.0 * y / size);
    let latitude = n
        .sinh()
        .atan()
        .to_degrees()
        .clamp(-MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE);
    Coordinate::new(latitude, longitude)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn sample_points() -> Vec<Coordinate> {
        vec![
            Coordinate::new(51.38713, -1.0316),
            Coordinate::new(51.4554, -0.9742),
            Coordinate::new(48.8566, 2.3522),
            Coordinate::new(-33.8688, 151.2093),
            Coordinate::new(0.0, 0.0),
        ]
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = Coordinate::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = Coordinate::new(51.5074, -0.1278);
        let paris = Coordinate::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0));
    }

    #[test]
    fn test_haversine_symmetric_and_triangle() {
        let points = sample_points();
        for a in &points {
            for b in &points {
                let ab = haversine_distance(a, b);
                assert!(approx_eq(ab, haversine_distance(b, a), 1e-6));
                for c in &points {
                    let ac = haversine_distance(a, c);
                    let cb = haversine_distance(c, b);
                    assert!(ab <= ac + cb + 1e-3);
                }
            }
        }
    }

    #[test]
    fn test_polyline_length() {
        let empty: Vec<Coordinate> = vec![];
        assert_eq!(polyline_length(&empty), 0.0);
        assert_eq!(polyline_length(&[Coordinate::new(51.5, -0.1)]), 0.0);

        let track = vec![
            Coordinate::new(51.5074, -0.1278),
            Coordinate::new(51.5080, -0.1280),
            Coordinate::new(51.5090, -0.1280),
        ];
        let expected = haversine_distance(&track[0], &track[1]) + haversine_distance(&track[1], &track[2]);
        assert!(approx_eq(polyline_length(&track), expected, 1e-9));
    }

    #[test]
    fn test_projection_perpendicular_foot() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 1.0);
        let p = Coordinate::new(0.01, 0.25);

        let projection = project_onto_segment(&p, &a, &b);
        assert!(approx_eq(projection.fraction, 0.25, 1e-6));
        assert!(approx_eq(projection.point.longitude, 0.25, 1e-6));
        assert!(approx_eq(projection.point.latitude, 0.0, 1e-12));
        // 0.01 degrees of latitude
        assert!(approx_eq(projection.distance, 1_111.95, 1.0));
    }

    #[test]
    fn test_projection_clamps_to_nearer_endpoint() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 1.0);

        let before = project_onto_segment(&Coordinate::new(0.0, -0.5), &a, &b);
        assert_eq!(before.fraction, 0.0);
        assert_eq!(before.point, a);

        let after = project_onto_segment(&Coordinate::new(0.3, 1.5), &a, &b);
        assert_eq!(after.fraction, 1.0);
        assert_eq!(after.point, b);
        assert!(approx_eq(after.distance, haversine_distance(&Coordinate::new(0.3, 1.5), &b), 1e-9));
    }

    #[test]
    fn test_projection_degenerate_segment() {
        let a = Coordinate::new(51.5, -0.12);
        let p = Coordinate::new(51.51, -0.13);

        let projection = project_onto_segment(&p, &a, &a);
        assert_eq!(projection.point, a);
        assert_eq!(projection.distance, haversine_distance(&p, &a));
    }

    #[test]
    fn test_projection_never_worse_than_endpoints() {
        let points = sample_points();
        for p in &points {
            for s in &points {
                for e in &points {
                    let projection = project_onto_segment(p, s, e);
                    assert!((0.0..=1.0).contains(&projection.fraction));
                    assert!(projection.distance <= haversine_distance(p, s) + 1e-9);
                    assert!(projection.distance <= haversine_distance(p, e) + 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_longitude_wrapping() {
        assert_eq!(wrap_longitude(180.0), 180.0);
        assert_eq!(wrap_longitude(-180.0), -180.0);
        assert!(approx_eq(wrap_longitude(190.0), -170.0, 1e-9));
        assert!(approx_eq(wrap_longitude(-359.8), 0.2, 1e-9));

        assert!(approx_eq(longitude_delta(179.9, -179.9), 0.2, 1e-9));
        assert!(approx_eq(longitude_delta(-179.9, 179.9), -0.2, 1e-9));
        assert_eq!(longitude_delta(-1.0316, -0.9742), -0.9742 - -1.0316);
    }

    #[test]
    fn test_interpolate_across_antimeridian() {
        let west = Coordinate::new(0.0, 179.9);
        let east = Coordinate::new(0.0, -179.9);

        let mid = interpolate(&west, &east, 0.5);
        assert!(approx_eq(mid.longitude.abs(), 180.0, 1e-9));
        let quarter = interpolate(&west, &east, 0.25);
        assert!(approx_eq(quarter.longitude, 179.95, 1e-9));
        let three_quarters = interpolate(&west, &east, 0.75);
        assert!(approx_eq(three_quarters.longitude, -179.95, 1e-9));
    }

    #[test]
    fn test_projection_across_antimeridian() {
        let west = Coordinate::new(0.0, 179.9);
        let east = Coordinate::new(0.0, -179.9);
        let length = haversine_distance(&west, &east);
        assert!(approx_eq(length, 22_239.0, 10.0));

        // On the segment, right at the antimeridian
        let on_line = project_onto_segment(&Coordinate::new(0.0, 180.0), &west, &east);
        assert!(on_line.distance < 1e-6, "got {}", on_line.distance);
        assert!(approx_eq(on_line.fraction, 0.5, 1e-9));

        // 0.01 degrees north of the crossing, from either side of the line
        for lng in [179.95, -179.95] {
            let projection = project_onto_segment(&Coordinate::new(0.01, lng), &west, &east);
            assert!(approx_eq(projection.distance, 1_111.95, 1.0), "got {}", projection.distance);
            assert!(approx_eq(projection.point.longitude, lng, 1e-6));
        }
    }

    #[test]
    fn test_meters_per_point_shrinks_with_zoom_and_latitude() {
        let equator_z0 = meters_per_point(0.0, 0.0, TILE_SIZE);
        assert!(approx_eq(equator_z0, 156_543.03, 0.01));
        assert!(approx_eq(meters_per_point(0.0, 1.0, TILE_SIZE), equator_z0 / 2.0, 1e-6));
        assert!(meters_per_point(60.0, 0.0, TILE_SIZE) < equator_z0);
        assert!(approx_eq(meters_per_point(60.0, 0.0, TILE_SIZE), equator_z0 * 0.5, 1e-6));
    }

    #[test]
    fn test_to_screen_distance_scales_with_zoom() {
        let c = Coordinate::new(51.4, -1.0);
        let at_10 = to_screen_distance(1000.0, &c, 10.0);
        let at_11 = to_screen_distance(1000.0, &c, 11.0);
        assert!(approx_eq(at_11, at_10 * 2.0, 1e-9));
    }

    #[test]
    fn test_world_point_roundtrip_and_orientation() {
        let origin = world_point(&Coordinate::new(0.0, 0.0), 0.0, TILE_SIZE);
        assert!(approx_eq(origin.0, 128.0, 1e-9));
        assert!(approx_eq(origin.1, 128.0, 1e-9));

        let north = world_point(&Coordinate::new(51.4, -1.0), 3.0, TILE_SIZE);
        let south = world_point(&Coordinate::new(-33.8, 151.2), 3.0, TILE_SIZE);
        assert!(north.1 < south.1);
        assert!(north.0 < south.0);

        let back = from_world_point(north.0, north.1, 3.0, TILE_SIZE);
        assert!(approx_eq(back.latitude, 51.4, 1e-9));
        assert!(approx_eq(back.longitude, -1.0, 1e-9));
    }
}
