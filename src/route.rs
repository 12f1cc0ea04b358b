//! Route model.
//!
//! A [`Route`] is the immutable representation of computed directions: an ordered list of
//! waypoints, the travel mode and the totals derived from the waypoint geometry. Every
//! derived value (length, estimated duration, bounds, spatial index) is computed exactly
//! once in the constructor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::geo_utils::polyline_length;
use crate::nearest::{SegmentIndex, SPATIAL_INDEX_MIN_SEGMENTS};
use crate::{Bounds, Coordinate, DirectionsError, Result};

static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a constructed route. Clones of a route share its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(u64);

impl RouteId {
    fn next() -> Self {
        Self(NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route-{}", self.0)
    }
}

/// Kind of travelling the directions were computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum TravelMode {
    #[default]
    FastestDriving,
    ShortestDriving,
    Pedestrian,
    PedestrianIncludingPublicTransport,
    Bicycle,
}

impl TravelMode {
    pub const ALL: [TravelMode; 5] = [
        TravelMode::FastestDriving,
        TravelMode::ShortestDriving,
        TravelMode::Pedestrian,
        TravelMode::PedestrianIncludingPublicTransport,
        TravelMode::Bicycle,
    ];

    /// Average speed used to estimate a duration when the provider did not supply one.
    pub fn nominal_speed_kmh(self) -> f64 {
        match self {
            TravelMode::FastestDriving => 50.0,
            TravelMode::ShortestDriving => 40.0,
            TravelMode::Pedestrian => 5.0,
            TravelMode::PedestrianIncludingPublicTransport => 20.0,
            TravelMode::Bicycle => 15.0,
        }
    }

    pub fn is_driving(self) -> bool {
        matches!(self, TravelMode::FastestDriving | TravelMode::ShortestDriving)
    }

    pub fn name(self) -> &'static str {
        match self {
            TravelMode::FastestDriving => "fastest-driving",
            TravelMode::ShortestDriving => "shortest-driving",
            TravelMode::Pedestrian => "pedestrian",
            TravelMode::PedestrianIncludingPublicTransport => "pedestrian-public-transport",
            TravelMode::Bicycle => "bicycle",
        }
    }

    /// Estimated travel time in seconds for `meters` at the nominal speed.
    fn estimate_seconds(self, meters: f64) -> f64 {
        let hours = meters / 1000.0 / self.nominal_speed_kmh();
        hours * 3600.0
    }
}

/// One point of a route.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub coordinate: Coordinate,
    /// Position within the owning route, assigned at route construction
    pub index: usize,
    /// Optional label (address, stop name)
    pub name: Option<String>,
}

impl Waypoint {
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate, index: 0, name: None }
    }

    pub fn named(coordinate: Coordinate, name: impl Into<String>) -> Self {
        Self { coordinate, index: 0, name: Some(name.into()) }
    }
}

impl From<Coordinate> for Waypoint {
    fn from(coordinate: Coordinate) -> Self {
        Waypoint::new(coordinate)
    }
}

/// Summary fields of a route for display by the host.
///
/// Distance and duration prefer provider-supplied totals over the geometric ones.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteSummary {
    pub from: Coordinate,
    pub to: Coordinate,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub travel_mode: TravelMode,
}

/// Route as delivered by a directions provider, before validation.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteDelivery {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    pub waypoints: Vec<Coordinate>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub travel_mode: TravelMode,
    #[cfg_attr(feature = "serde", serde(default))]
    pub distance_meters: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration_seconds: Option<f64>,
}

impl TryFrom<RouteDelivery> for Route {
    type Error = DirectionsError;

    fn try_from(delivery: RouteDelivery) -> Result<Self> {
        Route::build(
            delivery.name,
            delivery.waypoints.into_iter().map(Waypoint::from).collect(),
            delivery.travel_mode,
            delivery.distance_meters,
            delivery.duration_seconds,
        )
    }
}

/// Immutable computed route.
///
/// # Example
/// ```
/// use directions_overlay::{Coordinate, Route, TravelMode};
///
/// let route = Route::new(
///     vec![Coordinate::new(51.38713, -1.0316), Coordinate::new(51.4554, -0.9742)],
///     TravelMode::FastestDriving,
/// ).unwrap();
///
/// assert_eq!(route.segment_count(), 1);
/// assert!(route.distance_meters() > 8_000.0);
///
/// // Fewer than two waypoints is rejected
/// assert!(Route::new(vec![Coordinate::new(51.38713, -1.0316)], TravelMode::Bicycle).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Route {
    id: RouteId,
    name: Option<String>,
    waypoints: Vec<Waypoint>,
    travel_mode: TravelMode,
    distance_meters: f64,
    duration_seconds: f64,
    provided_distance_meters: Option<f64>,
    provided_duration_seconds: Option<f64>,
    bounds: Bounds,
    segment_index: Option<SegmentIndex>,
}

impl Route {
    /// Build a route from ordered waypoints.
    ///
    /// # Arguments
    ///
    /// * `waypoints` - Coordinates or [`Waypoint`]s in travel order. Ordinals are
    ///   reassigned from 0.
    /// * `travel_mode` - Mode the route was computed for; sets the duration estimate
    ///
    /// # Returns
    ///
    /// The route with its length, estimated duration and bounds computed.
    ///
    /// # Errors
    ///
    /// [`DirectionsError::TooFewWaypoints`] for fewer than 2 waypoints and
    /// [`DirectionsError::InvalidCoordinate`] for the first non-finite or out-of-range
    /// coordinate.
    ///
    /// # Performance
    ///
    /// O(n) in the number of waypoints, plus an O(n log n) R-tree bulk load for routes
    /// with at least [`SPATIAL_INDEX_MIN_SEGMENTS`] segments.
    pub fn new<I, W>(waypoints: I, travel_mode: TravelMode) -> Result<Self>
    where
        I: IntoIterator<Item = W>,
        W: Into<Waypoint>,
    {
        Self::with_summary(waypoints, travel_mode, None, None)
    }

    /// Build a route carrying provider-supplied totals.
    ///
    /// The provided values are kept alongside the geometric length and estimated
    /// duration; they never replace the geometry used by queries.
    ///
    /// # Arguments
    ///
    /// * `waypoints` - Coordinates or [`Waypoint`]s in travel order
    /// * `travel_mode` - Mode the route was computed for
    /// * `distance_meters` - Provider's total distance, if known
    /// * `duration_seconds` - Provider's total duration, if known
    ///
    /// # Errors
    ///
    /// Everything [`Route::new`] rejects, plus [`DirectionsError::InvalidSummary`] for a
    /// provided total that is negative or non-finite.
    ///
    /// # Example
    ///
    /// ```
    /// use directions_overlay::{Coordinate, Route, TravelMode};
    ///
    /// let waypoints = vec![Coordinate::new(51.38713, -1.0316), Coordinate::new(51.4554, -0.9742)];
    /// let route = Route::with_summary(waypoints, TravelMode::FastestDriving, Some(11_200.0), Some(900.0))?;
    ///
    /// // The summary reports the provider's totals, queries use the geometry
    /// assert_eq!(route.summary().distance_meters, 11_200.0);
    /// assert!(route.distance_meters() < 11_200.0);
    /// # Ok::<(), directions_overlay::DirectionsError>(())
    /// ```
    pub fn with_summary<I, W>(
        waypoints: I,
        travel_mode: TravelMode,
        distance_meters: Option<f64>,
        duration_seconds: Option<f64>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = W>,
        W: Into<Waypoint>,
    {
        Self::build(
            None,
            waypoints.into_iter().map(Into::into).collect(),
            travel_mode,
            distance_meters,
            duration_seconds,
        )
    }

    fn build(
        name: Option<String>,
        mut waypoints: Vec<Waypoint>,
        travel_mode: TravelMode,
        provided_distance_meters: Option<f64>,
        provided_duration_seconds: Option<f64>,
    ) -> Result<Self> {
        if waypoints.len() < 2 {
            return Err(DirectionsError::TooFewWaypoints { count: waypoints.len() });
        }

        if let Some((index, w)) = waypoints.iter().enumerate().find(|(_, w)| !w.coordinate.is_valid()) {
            return Err(DirectionsError::InvalidCoordinate {
                index,
                latitude: w.coordinate.latitude,
                longitude: w.coordinate.longitude,
            });
        }

        check_provided("distance", provided_distance_meters)?;
        check_provided("duration", provided_duration_seconds)?;

        for (index, w) in waypoints.iter_mut().enumerate() {
            w.index = index;
        }

        let coordinates: Vec<Coordinate> = waypoints.iter().map(|w| w.coordinate).collect();
        let distance_meters = polyline_length(&coordinates);
        let duration_seconds = travel_mode.estimate_seconds(distance_meters);
        let bounds = Bounds::from_points(&coordinates).ok_or(DirectionsError::TooFewWaypoints { count: 0 })?;

        let segment_count = coordinates.len() - 1;
        let segment_index = (segment_count >= SPATIAL_INDEX_MIN_SEGMENTS).then(|| SegmentIndex::build(&coordinates));

        let route = Self {
            id: RouteId::next(),
            name,
            waypoints,
            travel_mode,
            distance_meters,
            duration_seconds,
            provided_distance_meters,
            provided_duration_seconds,
            bounds,
            segment_index,
        };

        debug!(
            "[Route] Built {} ({} waypoints, {:.0}m, {}, indexed: {})",
            route.id,
            route.waypoints.len(),
            route.distance_meters,
            route.travel_mode.name(),
            route.segment_index.is_some()
        );

        Ok(route)
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Waypoint coordinates in route order.
    pub fn coordinates(&self) -> impl ExactSizeIterator<Item = &Coordinate> + '_ {
        self.waypoints.iter().map(|w| &w.coordinate)
    }

    /// Consecutive waypoint pairs, in route order.
    pub fn segments(&self) -> impl ExactSizeIterator<Item = (&Coordinate, &Coordinate)> + '_ {
        self.waypoints
            .windows(2)
            .map(|w| (&w[0].coordinate, &w[1].coordinate))
    }

    pub fn segment_count(&self) -> usize {
        self.waypoints.len() - 1
    }

    pub fn start(&self) -> Coordinate {
        self.waypoints[0].coordinate
    }

    pub fn end(&self) -> Coordinate {
        self.waypoints[self.waypoints.len() - 1].coordinate
    }

    pub fn travel_mode(&self) -> TravelMode {
        self.travel_mode
    }

    /// Sum of the haversine distances between consecutive waypoints, in meters.
    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    /// Duration in seconds estimated from the geometric length and the travel mode.
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Total distance as reported by the directions provider, if any.
    pub fn provided_distance_meters(&self) -> Option<f64> {
        self.provided_distance_meters
    }

    /// Total duration as reported by the directions provider, if any.
    pub fn provided_duration_seconds(&self) -> Option<f64> {
        self.provided_duration_seconds
    }

    /// Bounding box of all waypoints.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Totals for display, preferring provided values over computed ones.
    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            from: self.start(),
            to: self.end(),
            distance_meters: self.provided_distance_meters.unwrap_or(self.distance_meters),
            duration_seconds: self.provided_duration_seconds.unwrap_or(self.duration_seconds),
            travel_mode: self.travel_mode,
        }
    }

    pub(crate) fn segment_index(&self) -> Option<&SegmentIndex> {
        self.segment_index.as_ref()
    }
}

fn check_provided(field: &'static str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(DirectionsError::InvalidSummary { field, value: v }),
        _ => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::haversine_distance;

    fn reading_route() -> Vec<Coordinate> {
        vec![
            Coordinate::new(51.38713, -1.0316),
            Coordinate::new(51.4100, -1.0100),
            Coordinate::new(51.4554, -0.9742),
        ]
    }

    #[test]
    fn test_rejects_too_few_waypoints() {
        let empty: Vec<Coordinate> = vec![];
        assert_eq!(
            Route::new(empty, TravelMode::FastestDriving).unwrap_err(),
            DirectionsError::TooFewWaypoints { count: 0 }
        );
        assert_eq!(
            Route::new(vec![Coordinate::new(51.0, -1.0)], TravelMode::Pedestrian).unwrap_err(),
            DirectionsError::TooFewWaypoints { count: 1 }
        );
    }

    #[test]
    fn test_rejects_invalid_coordinates() {
        let points = vec![
            Coordinate::new(51.0, -1.0),
            Coordinate::new(f64::NAN, -1.0),
            Coordinate::new(51.1, -1.0),
        ];
        match Route::new(points, TravelMode::Bicycle) {
            Err(DirectionsError::InvalidCoordinate { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected invalid coordinate, got {:?}", other),
        }

        let out_of_range = vec![Coordinate::new(51.0, -1.0), Coordinate::new(51.0, 200.0)];
        assert!(Route::new(out_of_range, TravelMode::Bicycle).is_err());
    }

    #[test]
    fn test_rejects_invalid_provided_totals() {
        let result = Route::with_summary(reading_route(), TravelMode::FastestDriving, Some(-5.0), None);
        assert_eq!(
            result.unwrap_err(),
            DirectionsError::InvalidSummary { field: "distance", value: -5.0 }
        );

        let result = Route::with_summary(reading_route(), TravelMode::FastestDriving, None, Some(f64::INFINITY));
        assert!(matches!(result, Err(DirectionsError::InvalidSummary { field: "duration", .. })));
    }

    #[test]
    fn test_derived_quantities() {
        let points = reading_route();
        let route = Route::new(points.clone(), TravelMode::FastestDriving).unwrap();

        assert_eq!(route.segment_count(), 2);
        assert_eq!(route.segments().len(), 2);
        assert_eq!(route.start(), points[0]);
        assert_eq!(route.end(), points[2]);

        let expected = haversine_distance(&points[0], &points[1]) + haversine_distance(&points[1], &points[2]);
        assert!((route.distance_meters() - expected).abs() < 1e-9);

        // 50 km/h
        let expected_seconds = expected / 1000.0 / 50.0 * 3600.0;
        assert!((route.duration_seconds() - expected_seconds).abs() < 1e-6);

        let bounds = route.bounds();
        assert!(points.iter().all(|p| bounds.contains(p)));
        assert!(route.segment_index().is_none());
    }

    #[test]
    fn test_waypoints_are_renumbered() {
        let waypoints = vec![
            Waypoint { coordinate: Coordinate::new(51.0, -1.0), index: 7, name: None },
            Waypoint::named(Coordinate::new(51.1, -1.0), "Station"),
            Waypoint::new(Coordinate::new(51.2, -1.0)),
        ];
        let route = Route::new(waypoints, TravelMode::Pedestrian).unwrap();
        let indices: Vec<usize> = route.waypoints().iter().map(|w| w.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(route.waypoints()[1].name.as_deref(), Some("Station"));
    }

    #[test]
    fn test_provided_totals_kept_separately() {
        let route = Route::with_summary(reading_route(), TravelMode::ShortestDriving, Some(12_345.0), Some(900.0)).unwrap();
        assert_eq!(route.provided_distance_meters(), Some(12_345.0));
        assert_eq!(route.provided_duration_seconds(), Some(900.0));
        assert!((route.distance_meters() - 12_345.0).abs() > 1.0);

        let summary = route.summary();
        assert_eq!(summary.distance_meters, 12_345.0);
        assert_eq!(summary.duration_seconds, 900.0);
        assert_eq!(summary.travel_mode, TravelMode::ShortestDriving);
        assert_eq!(summary.from, route.start());
        assert_eq!(summary.to, route.end());
    }

    #[test]
    fn test_route_ids_unique_and_shared_by_clones() {
        let a = Route::new(reading_route(), TravelMode::FastestDriving).unwrap();
        let b = Route::new(reading_route(), TravelMode::FastestDriving).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_travel_modes() {
        for mode in TravelMode::ALL {
            assert!(mode.nominal_speed_kmh() > 0.0);
            assert!(!mode.name().is_empty());
        }
        assert!(TravelMode::FastestDriving.is_driving());
        assert!(!TravelMode::Bicycle.is_driving());
    }

    #[test]
    fn test_try_from_delivery() {
        let delivery = RouteDelivery {
            name: Some("To work".to_string()),
            waypoints: reading_route(),
            travel_mode: TravelMode::Bicycle,
            distance_meters: Some(9_000.0),
            duration_seconds: None,
        };
        let route = Route::try_from(delivery).unwrap();
        assert_eq!(route.name(), Some("To work"));
        assert_eq!(route.travel_mode(), TravelMode::Bicycle);
        assert_eq!(route.provided_distance_meters(), Some(9_000.0));

        let short = RouteDelivery { waypoints: vec![Coordinate::new(51.0, -1.0)], ..Default::default() };
        assert!(Route::try_from(short).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_delivery_from_json() {
        let json = r#"{
            "waypoints": [
                {"latitude": 51.38713, "longitude": -1.0316},
                {"latitude": 51.4554, "longitude": -0.9742}
            ],
            "travel_mode": "pedestrian",
            "duration_seconds": 6000.0
        }"#;
        let delivery: RouteDelivery = serde_json::from_str(json).unwrap();
        assert_eq!(delivery.travel_mode, TravelMode::Pedestrian);
        assert!(delivery.name.is_none());

        let route = Route::try_from(delivery).unwrap();
        assert_eq!(route.provided_duration_seconds(), Some(6000.0));
        assert_eq!(route.summary().duration_seconds, 6000.0);
    }
}
