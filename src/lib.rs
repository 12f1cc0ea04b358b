//! # Directions Overlay
//!
//! Route geometry engine for map directions overlays.
//!
//! This library provides:
//! - An immutable route model built from an ordered list of waypoints
//! - Minimum distance from any coordinate to the active route (drift detection)
//! - Viewport fitting with edge padding for "zoom to route" camera moves
//! - A registry holding the single active route and its overlay, with observer notifications
//!
//! The map widget, the directions provider and the actual drawing are collaborators
//! outside this crate: they hand routes in, receive [`OverlayEvent`]s and apply
//! [`CameraTarget`]s.
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel processing with rayon
//! - **`serde`** - Serialize/deserialize value types and [`RouteDelivery`]
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use directions_overlay::{
//!     Coordinate, DisplayMode, OverlayConfig, OverlayRegistry, Route, TravelMode,
//!     NO_ROUTE_DISTANCE,
//! };
//!
//! let registry = OverlayRegistry::new(OverlayConfig::default());
//! let user = Coordinate::new(51.42, -1.0);
//! assert_eq!(registry.distance_to_active_route(&user), NO_ROUTE_DISTANCE);
//!
//! let route = Route::new(
//!     vec![Coordinate::new(51.38713, -1.0316), Coordinate::new(51.4554, -0.9742)],
//!     TravelMode::FastestDriving,
//! )?;
//! registry.set_active_route(route, DisplayMode::Overview);
//!
//! let drift = registry.distance_to_active_route(&user);
//! println!("User is {:.0}m away from the route", drift);
//! # Ok::<(), directions_overlay::DirectionsError>(())
//! ```

// Coordinate & distance primitives
pub mod geo_utils;

// Route model
pub mod route;
pub use route::{Route, RouteDelivery, RouteId, RouteSummary, TravelMode, Waypoint};

// Nearest-segment queries
pub mod nearest;
pub use nearest::{
    min_distance_to_route, min_screen_distance_to_route, nearest_segment, NearestSegment,
    NO_ROUTE_DISTANCE, SPATIAL_INDEX_MIN_SEGMENTS,
};
#[cfg(feature = "parallel")]
pub use nearest::{min_distance_to_route_parallel, min_distances_to_route};

// Viewport fitting
pub mod viewport;
pub use viewport::{bounding_region, CameraTarget, Region, DEFAULT_EDGE_PADDING};

// Active route / overlay registry
pub mod overlay;
pub use overlay::{DisplayMode, Overlay, OverlayEvent, OverlayObserver, OverlayRegistry};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("DirectionsOverlayRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate with latitude and longitude in degrees (WGS84).
///
/// # Example
/// ```
/// use directions_overlay::Coordinate;
/// let point = Coordinate::new(51.38713, -1.0316); // Reading
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the coordinate is finite and within latitude/longitude range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Axis-aligned latitude/longitude bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from coordinates. Returns `None` for empty input.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coordinate>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self {
            min_lat: first.latitude,
            max_lat: first.latitude,
            min_lng: first.longitude,
            max_lng: first.longitude,
        };

        for p in points {
            bounds.min_lat = bounds.min_lat.min(p.latitude);
            bounds.max_lat = bounds.max_lat.max(p.latitude);
            bounds.min_lng = bounds.min_lng.min(p.longitude);
            bounds.max_lng = bounds.max_lng.max(p.longitude);
        }

        Some(bounds)
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Whether `point` lies inside or on the edge of the bounds.
    pub fn contains(&self, point: &Coordinate) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }

    /// Whether `other` lies entirely inside these bounds.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
            && other.min_lng >= self.min_lng
            && other.max_lng <= self.max_lng
    }

    /// North-west corner (max latitude, min longitude).
    pub fn north_west(&self) -> Coordinate {
        Coordinate::new(self.max_lat, self.min_lng)
    }

    /// South-east corner (min latitude, max longitude).
    pub fn south_east(&self) -> Coordinate {
        Coordinate::new(self.min_lat, self.max_lng)
    }
}

/// Configuration for the overlay registry and viewport fitting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct OverlayConfig {
    /// Padding in points kept free on every edge when zooming to the route.
    /// Default: 125.0
    pub edge_padding: f64,

    /// Lowest zoom level a fitted camera may use.
    /// Default: 0.0
    pub min_fit_zoom: f64,

    /// Highest zoom level a fitted camera may use. Also used for routes that collapse
    /// to a single point.
    /// Default: 21.0
    pub max_fit_zoom: f64,

    /// Edge length of a map tile in points at zoom 0.
    /// Default: 256.0
    pub tile_size: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            edge_padding: DEFAULT_EDGE_PADDING,
            min_fit_zoom: 0.0,
            max_fit_zoom: 21.0,
            tile_size: geo_utils::TILE_SIZE,
        }
    }
}

/// Reasons a route is rejected at construction.
///
/// This is the crate's only error type, and every variant means "invalid route": the
/// waypoints or provided totals cannot describe a route. Construction is all or nothing,
/// so no partially built [`Route`] is ever returned alongside one. A missing active route
/// is not an error; queries report it with
/// [`NO_ROUTE_DISTANCE`] or `None`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum DirectionsError {
    #[error("invalid route: expected at least 2 waypoints, got {count}")]
    TooFewWaypoints { count: usize },

    #[error("invalid route: waypoint {index} has invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    #[error("invalid route: provided {field} must be finite and non-negative, got {value}")]
    InvalidSummary { field: &'static str, value: f64 },
}

pub type Result<T> = std::result::Result<T, DirectionsError>;

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{debug, info};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Callback interface for overlay changes.
    /// Implement this in Kotlin/Swift to redraw the map surface.
    #[uniffi::export(callback_interface)]
    pub trait OverlayEventCallback: Send + Sync {
        /// Called when an overlay was created, replaced or redrawn.
        /// `path` is empty when the display mode hides the route.
        fn on_overlay_changed(&self, path: Vec<Coordinate>, display_mode: DisplayMode);

        /// Called when the active route was removed.
        fn on_overlay_cleared(&self);

        /// Called when the host asked to zoom to the route.
        fn on_camera_fit(&self, region: Region);
    }

    struct CallbackObserver {
        callback: Box<dyn OverlayEventCallback>,
    }

    impl OverlayObserver for CallbackObserver {
        fn on_overlay_event(&self, event: &OverlayEvent) {
            match event {
                OverlayEvent::Created(current)
                | OverlayEvent::Replaced { current, .. }
                | OverlayEvent::Redrawn { current, .. } => {
                    self.callback.on_overlay_changed(current.path().to_vec(), current.display_mode())
                }
                OverlayEvent::Cleared(_) => self.callback.on_overlay_cleared(),
                OverlayEvent::CameraFit(region) => self.callback.on_camera_fit(*region),
            }
        }
    }

    /// Directions overlay engine exposed to mobile hosts.
    #[derive(uniffi::Object)]
    pub struct FfiDirectionsOverlay {
        registry: OverlayRegistry,
        // The registry only holds weak references to observers
        callbacks: Mutex<Vec<Arc<CallbackObserver>>>,
    }

    #[uniffi::export]
    impl FfiDirectionsOverlay {
        #[uniffi::constructor]
        pub fn new(config: OverlayConfig) -> Arc<Self> {
            init_logging();
            info!("[DirectionsOverlayRust] Creating overlay engine with {:?}", config);
            Arc::new(Self {
                registry: OverlayRegistry::new(config),
                callbacks: Mutex::new(Vec::new()),
            })
        }

        /// Build a route from delivered waypoints and make it the active route.
        pub fn set_route(
            &self,
            waypoints: Vec<Coordinate>,
            travel_mode: TravelMode,
            display_mode: DisplayMode,
            distance_meters: Option<f64>,
            duration_seconds: Option<f64>,
        ) -> std::result::Result<RouteSummary, DirectionsError> {
            debug!("[DirectionsOverlayRust] set_route with {} waypoints", waypoints.len());
            let route = Route::with_summary(waypoints, travel_mode, distance_meters, duration_seconds)?;
            let summary = route.summary();
            self.registry.set_active_route(route, display_mode);
            Ok(summary)
        }

        pub fn clear_route(&self) {
            self.registry.clear_active_route();
        }

        pub fn set_display_mode(&self, display_mode: DisplayMode) -> bool {
            self.registry.set_display_mode(display_mode)
        }

        pub fn display_mode(&self) -> Option<DisplayMode> {
            self.registry.display_mode()
        }

        /// Distance in meters to the active route, or `NO_ROUTE_DISTANCE`.
        pub fn distance_to_route(&self, point: Coordinate) -> f64 {
            self.registry.distance_to_active_route(&point)
        }

        /// Distance in points to the active route at `zoom`, or `NO_ROUTE_DISTANCE`.
        pub fn screen_distance_to_route(&self, point: Coordinate, zoom: f64) -> f64 {
            self.registry.screen_distance_to_active_route(&point, zoom)
        }

        pub fn route_summary(&self) -> Option<RouteSummary> {
            self.registry.route_summary()
        }

        pub fn set_edge_padding(&self, padding: f64) {
            self.registry.set_edge_padding(padding);
        }

        pub fn zoom_to_route(&self) -> Option<Region> {
            self.registry.zoom_to_active_route()
        }

        pub fn camera_for_viewport(&self, width: f64, height: f64) -> Option<CameraTarget> {
            self.registry.camera_for_viewport(width, height)
        }

        pub fn add_callback(&self, callback: Box<dyn OverlayEventCallback>) {
            let observer = Arc::new(CallbackObserver { callback });
            self.registry.add_observer(&observer);
            self.callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(observer);
        }

        /// Drop all registered callbacks.
        pub fn clear_callbacks(&self) {
            self.callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    /// Convert meters at a location into on-screen points at `zoom`.
    #[uniffi::export]
    pub fn ffi_to_screen_distance(meters: f64, coordinate: Coordinate, zoom: f64) -> f64 {
        geo_utils::to_screen_distance(meters, &coordinate, zoom)
    }

    /// Get default configuration.
    #[uniffi::export]
    pub fn default_overlay_config() -> OverlayConfig {
        init_logging();
        OverlayConfig::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(51.38713, -1.0316).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_bounds_from_points() {
        let points = [
            Coordinate::new(51.50, -0.13),
            Coordinate::new(51.51, -0.12),
            Coordinate::new(51.505, -0.125),
        ];
        let bounds = Bounds::from_points(&points).unwrap();
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lat, 51.51);
        assert_eq!(bounds.min_lng, -0.13);
        assert_eq!(bounds.max_lng, -0.12);
        assert!(points.iter().all(|p| bounds.contains(p)));
        assert!(!bounds.contains(&Coordinate::new(51.52, -0.125)));

        let empty: [Coordinate; 0] = [];
        assert!(Bounds::from_points(&empty).is_none());
    }

    #[test]
    fn test_bounds_corners_and_center() {
        let bounds = Bounds { min_lat: 10.0, max_lat: 20.0, min_lng: -5.0, max_lng: 5.0 };
        assert_eq!(bounds.north_west(), Coordinate::new(20.0, -5.0));
        assert_eq!(bounds.south_east(), Coordinate::new(10.0, 5.0));
        assert_eq!(bounds.center(), Coordinate::new(15.0, 0.0));

        let inner = Bounds { min_lat: 12.0, max_lat: 18.0, min_lng: -1.0, max_lng: 1.0 };
        assert!(bounds.contains_bounds(&inner));
        assert!(!inner.contains_bounds(&bounds));
    }

    #[test]
    fn test_default_config() {
        let config = OverlayConfig::default();
        assert_eq!(config.edge_padding, 125.0);
        assert_eq!(config.tile_size, 256.0);
        assert!(config.min_fit_zoom < config.max_fit_zoom);
    }

    #[test]
    fn test_error_messages_name_invalid_route() {
        let errors = [
            DirectionsError::TooFewWaypoints { count: 1 },
            DirectionsError::InvalidCoordinate { index: 0, latitude: 95.0, longitude: 0.0 },
            DirectionsError::InvalidSummary { field: "distance", value: -1.0 },
        ];
        for error in errors {
            assert!(error.to_string().starts_with("invalid route"));
        }
    }
}
