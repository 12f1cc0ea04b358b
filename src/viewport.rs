//! Viewport fitting.
//!
//! A [`Region`] is the bounding box of every waypoint of a route plus the padding (in
//! on-screen points) the camera should keep free on each edge. The padding only turns
//! into degrees once a zoom level is known, so the region carries both and resolves them
//! on demand:
//!
//! - [`Region::padded_bounds`] expands the box by the padding at a given zoom
//! - [`Region::camera_for_viewport`] picks the center and zoom that fit the padded box
//!   into a viewport of a given size
//!
//! Routes crossing the antimeridian or reaching beyond the Web Mercator latitude limit
//! are not handled specially: the region still contains every waypoint, but the fitted
//! camera may show far more of the map than needed.

use log::warn;

use crate::geo_utils::{from_world_point, world_point};
use crate::{Bounds, Coordinate, OverlayConfig, Route};

/// Padding in points used when the host does not override it.
pub const DEFAULT_EDGE_PADDING: f64 = 125.0;

/// Map extent framing a route, with edge padding in on-screen points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    /// Bounding box of every waypoint
    pub bounds: Bounds,
    /// Points to keep free on every edge of the viewport
    pub padding: f64,
}

/// Camera position produced by fitting a region into a viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraTarget {
    pub center: Coordinate,
    pub zoom: f64,
}

/// Compute the region framing every waypoint of `route` with `padding` points per edge.
///
/// Negative or non-finite padding is treated as zero.
///
/// # Example
/// ```
/// use directions_overlay::{bounding_region, Coordinate, Route, TravelMode, DEFAULT_EDGE_PADDING};
///
/// let route = Route::new(
///     vec![Coordinate::new(51.38713, -1.0316), Coordinate::new(51.4554, -0.9742)],
///     TravelMode::FastestDriving,
/// )?;
///
/// let region = bounding_region(&route, DEFAULT_EDGE_PADDING);
/// assert!(route.coordinates().all(|c| region.contains(c)));
/// # Ok::<(), directions_overlay::DirectionsError>(())
/// ```
pub fn bounding_region(route: &Route, padding: f64) -> Region {
    Region {
        bounds: route.bounds(),
        padding: sanitize_padding(padding),
    }
}

pub(crate) fn sanitize_padding(padding: f64) -> f64 {
    if padding.is_finite() && padding >= 0.0 {
        padding
    } else {
        warn!("[Viewport] Ignoring invalid edge padding {}, using 0", padding);
        0.0
    }
}

impl Region {
    /// Whether `point` lies inside the unpadded bounds.
    pub fn contains(&self, point: &Coordinate) -> bool {
        self.bounds.contains(point)
    }

    /// Bounds expanded by the padding as seen at `zoom`.
    ///
    /// Always contains the unpadded bounds; larger padding never yields smaller bounds.
    pub fn padded_bounds(&self, zoom: f64, tile_size: f64) -> Bounds {
        if self.padding == 0.0 {
            return self.bounds;
        }

        let (x0, y0) = world_point(&self.bounds.north_west(), zoom, tile_size);
        let (x1, y1) = world_point(&self.bounds.south_east(), zoom, tile_size);

        let p = self.padding;
        let north_west = from_world_point(x0 - p, y0 - p, zoom, tile_size);
        let south_east = from_world_point(x1 + p, y1 + p, zoom, tile_size);

        Bounds {
            min_lat: south_east.latitude.min(self.bounds.min_lat),
            max_lat: north_west.latitude.max(self.bounds.max_lat),
            min_lng: north_west.longitude.min(self.bounds.min_lng),
            max_lng: south_east.longitude.max(self.bounds.max_lng),
        }
    }

    /// Center and zoom that fit the region, padding included, into a `width` x `height`
    /// viewport (in points).
    ///
    /// The zoom is clamped to the configured fit range. A region collapsed to a single
    /// point gets the maximum zoom.
    pub fn camera_for_viewport(&self, width: f64, height: f64, config: &OverlayConfig) -> CameraTarget {
        let tile_size = config.tile_size;
        let (x0, y0) = world_point(&self.bounds.north_west(), 0.0, tile_size);
        let (x1, y1) = world_point(&self.bounds.south_east(), 0.0, tile_size);

        let fit = |available: f64, span: f64| {
            if span > 0.0 {
                (available.max(1.0) / span).log2()
            } else {
                f64::INFINITY
            }
        };

        let zoom_x = fit(width - 2.0 * self.padding, x1 - x0);
        let zoom_y = fit(height - 2.0 * self.padding, y1 - y0);
        let zoom = zoom_x
            .min(zoom_y)
            .min(config.max_fit_zoom)
            .max(config.min_fit_zoom);

        CameraTarget {
            center: from_world_point((x0 + x1) / 2.0, (y0 + y1) / 2.0, 0.0, tile_size),
            zoom,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
