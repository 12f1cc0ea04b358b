//! Active route and overlay registry.
//!
//! An [`OverlayRegistry`] owns the single active route slot: the [`Overlay`] built from
//! the current route and display mode. Hosts own the registry (one per map surface) and
//! feed it routes; rendering components subscribe as [`OverlayObserver`]s.
//!
//! ## Threading
//!
//! Every method takes `&self`, so the registry can sit behind an `Arc` shared between the
//! UI thread and a background directions fetch. New overlays are built before the slot
//! lock is taken and published with one pointer swap: a concurrent query sees either the
//! previous overlay or the new one, never a mix. Distance and viewport queries run on a
//! snapshot taken under a read lock and release it before doing any geometry.
//!
//! ## Observers
//!
//! Observers are held through [`Weak`] references. The registry never keeps an observer
//! alive; dropped observers are pruned on the next notification.
//!
//! Every change queues its event while it still holds the slot lock, so the queue is in
//! the order the changes were applied. Events are delivered from that queue after the
//! locks are released, one at a time, to every observer. A change made from inside an
//! observer callback, or by another thread while delivery is running, is queued and
//! delivered after the current event by whichever thread is already delivering. An
//! observer therefore never sees `Cleared` before the `Created` it ends, and the last
//! event it receives describes the slot's current state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use log::{debug, info, warn};

use crate::nearest::{min_distance_to_route, min_screen_distance_to_route};
use crate::viewport::{bounding_region, sanitize_padding, CameraTarget, Region};
use crate::{Coordinate, OverlayConfig, Route, RouteSummary};

/// How the active route is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum DisplayMode {
    /// Draw nothing; the route stays queryable
    None,
    /// Draw a polyline through all waypoints
    #[default]
    Overview,
}

/// Render-facing artifact for the active route.
///
/// Built from a route and a display mode and never modified; a display-mode change
/// produces a new overlay for the same route.
#[derive(Debug)]
pub struct Overlay {
    generation: u64,
    route: Arc<Route>,
    display_mode: DisplayMode,
    path: Vec<Coordinate>,
}

impl Overlay {
    fn new(generation: u64, route: Arc<Route>, display_mode: DisplayMode) -> Self {
        let path = match display_mode {
            DisplayMode::None => Vec::new(),
            DisplayMode::Overview => route.coordinates().copied().collect(),
        };
        Self { generation, route, display_mode, path }
    }

    /// Identifies this overlay among every overlay the registry has created.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// Coordinates to draw, empty when the display mode hides the route.
    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    pub fn is_visible(&self) -> bool {
        !self.path.is_empty()
    }

    /// Whether this overlay was built for `route` (or a clone of it).
    pub fn is_for(&self, route: &Route) -> bool {
        self.route.id() == route.id()
    }
}

/// Change notification sent to observers.
#[derive(Debug, Clone)]
pub enum OverlayEvent {
    /// A route became active while none was
    Created(Arc<Overlay>),
    /// A new route replaced the active one; `previous` is discarded
    Replaced { previous: Arc<Overlay>, current: Arc<Overlay> },
    /// The display mode changed; same route, new overlay
    Redrawn { previous: Arc<Overlay>, current: Arc<Overlay> },
    /// The active route was removed
    Cleared(Arc<Overlay>),
    /// The host asked the camera to frame the active route
    CameraFit(Region),
}

/// Receiver of overlay notifications, typically the map rendering component.
///
/// Callbacks may call back into the registry; changes made there are delivered after
/// the current event.
pub trait OverlayObserver: Send + Sync {
    fn on_overlay_event(&self, event: &OverlayEvent);
}

/// Events waiting for delivery, in the order their changes were applied.
#[derive(Default)]
struct Dispatch {
    pending: VecDeque<OverlayEvent>,
    draining: bool,
}

/// Lets the next change take over delivery if an observer panics mid-drain.
struct DrainReset<'a>(&'a Mutex<Dispatch>);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).draining = false;
        }
    }
}

/// Holds the single active route, its overlay and the registered observers.
///
/// # Example
/// ```
/// use directions_overlay::{Coordinate, DisplayMode, OverlayConfig, OverlayRegistry, Route, TravelMode};
///
/// let registry = OverlayRegistry::new(OverlayConfig::default());
/// let route = Route::new(
///     vec![Coordinate::new(51.38713, -1.0316), Coordinate::new(51.4554, -0.9742)],
///     TravelMode::FastestDriving,
/// )?;
///
/// registry.set_active_route(route.clone(), DisplayMode::Overview);
/// assert!(registry.overlay_for(&route).is_some());
///
/// // Hiding the overlay keeps the route queryable
/// registry.set_display_mode(DisplayMode::None);
/// assert!(registry.distance_to_active_route(&route.start()) < 1e-6);
///
/// registry.clear_active_route();
/// assert!(registry.overlay_for(&route).is_none());
/// # Ok::<(), directions_overlay::DirectionsError>(())
/// ```
pub struct OverlayRegistry {
    config: RwLock<OverlayConfig>,
    active: RwLock<Option<Arc<Overlay>>>,
    generation: AtomicU64,
    observers: Mutex<Vec<Weak<dyn OverlayObserver>>>,
    dispatch: Mutex<Dispatch>,
}

impl Default for OverlayRegistry {
    fn default() -> Self {
        Self::new(OverlayConfig::default())
    }
}

impl std::fmt::Debug for OverlayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRegistry")
            .field("config", &self.config())
            .field("active", &self.active_overlay())
            .finish_non_exhaustive()
    }
}

impl OverlayRegistry {
    pub fn new(mut config: OverlayConfig) -> Self {
        config.edge_padding = sanitize_padding(config.edge_padding);
        Self {
            config: RwLock::new(config),
            active: RwLock::new(None),
            generation: AtomicU64::new(0),
            observers: Mutex::new(Vec::new()),
            dispatch: Mutex::new(Dispatch::default()),
        }
    }

    // ------------------------------------------------------------------
    // Active route lifecycle
    // ------------------------------------------------------------------

    /// Make `route` the active route, discarding the previous route and overlay.
    pub fn set_active_route(&self, route: impl Into<Arc<Route>>, display_mode: DisplayMode) -> Arc<Overlay> {
        let route = route.into();
        let overlay = Arc::new(Overlay::new(self.next_generation(), route, display_mode));

        {
            let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
            let event = match slot.replace(Arc::clone(&overlay)) {
                Some(previous) => {
                    debug!("[OverlayRegistry] Discarding overlay for {}", previous.route.id());
                    OverlayEvent::Replaced { previous, current: Arc::clone(&overlay) }
                }
                None => OverlayEvent::Created(Arc::clone(&overlay)),
            };
            self.enqueue(event);
        }

        info!(
            "[OverlayRegistry] Active route set to {} ({} waypoints, {:?})",
            overlay.route.id(),
            overlay.route.waypoints().len(),
            display_mode
        );
        self.deliver_pending();

        overlay
    }

    /// Remove the active route and overlay. Returns the removed overlay, if any.
    pub fn clear_active_route(&self) -> Option<Arc<Overlay>> {
        let previous = {
            let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
            let previous = slot.take()?;
            self.enqueue(OverlayEvent::Cleared(Arc::clone(&previous)));
            previous
        };

        info!("[OverlayRegistry] Cleared active route {}", previous.route.id());
        self.deliver_pending();
        Some(previous)
    }

    /// Change how the active route is drawn without replacing the route.
    ///
    /// Returns `true` if the overlay was redrawn; `false` when there is no active route
    /// or the mode is unchanged.
    pub fn set_display_mode(&self, display_mode: DisplayMode) -> bool {
        let (previous, current) = {
            let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
            let Some(previous) = slot.as_ref().map(Arc::clone) else {
                warn!("[OverlayRegistry] Display mode {:?} set without an active route", display_mode);
                return false;
            };
            if previous.display_mode == display_mode {
                return false;
            }

            let current = Arc::new(Overlay::new(
                self.next_generation(),
                Arc::clone(&previous.route),
                display_mode,
            ));
            *slot = Some(Arc::clone(&current));
            self.enqueue(OverlayEvent::Redrawn {
                previous: Arc::clone(&previous),
                current: Arc::clone(&current),
            });
            (previous, current)
        };

        debug!(
            "[OverlayRegistry] Display mode {:?} -> {:?} for {}",
            previous.display_mode,
            display_mode,
            current.route.id()
        );
        self.deliver_pending();
        true
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn active_overlay(&self) -> Option<Arc<Overlay>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn active_route(&self) -> Option<Arc<Route>> {
        self.active_overlay().map(|overlay| Arc::clone(&overlay.route))
    }

    pub fn display_mode(&self) -> Option<DisplayMode> {
        self.active_overlay().map(|overlay| overlay.display_mode)
    }

    /// Overlay for `route` if it is the active route.
    pub fn overlay_for(&self, route: &Route) -> Option<Arc<Overlay>> {
        self.active_overlay().filter(|overlay| overlay.is_for(route))
    }

    /// Summary of the active route for display.
    pub fn route_summary(&self) -> Option<RouteSummary> {
        self.active_route().map(|route| route.summary())
    }

    // ------------------------------------------------------------------
    // Geometric queries
    // ------------------------------------------------------------------

    /// Minimum distance in meters from `point` to the active route.
    ///
    /// Returns [`NO_ROUTE_DISTANCE`](crate::NO_ROUTE_DISTANCE) when there is no active
    /// route. Independent of the display mode.
    pub fn distance_to_active_route(&self, point: &Coordinate) -> f64 {
        let route = self.active_route();
        min_distance_to_route(point, route.as_deref())
    }

    /// Minimum distance in on-screen points from `point` to the active route at `zoom`,
    /// using the configured tile size.
    ///
    /// Returns [`NO_ROUTE_DISTANCE`](crate::NO_ROUTE_DISTANCE) when there is no active route.
    pub fn screen_distance_to_active_route(&self, point: &Coordinate, zoom: f64) -> f64 {
        let tile_size = self.config().tile_size;
        let route = self.active_route();
        min_screen_distance_to_route(point, route.as_deref(), zoom, tile_size)
    }

    /// Region framing the active route with the configured edge padding.
    pub fn bounding_region(&self) -> Option<Region> {
        let padding = self.edge_padding();
        self.active_route().map(|route| bounding_region(&route, padding))
    }

    /// Camera position framing the active route in a `width` x `height` viewport.
    pub fn camera_for_viewport(&self, width: f64, height: f64) -> Option<CameraTarget> {
        let config = self.config();
        self.bounding_region()
            .map(|region| region.camera_for_viewport(width, height, &config))
    }

    /// Ask observers to move the camera to the active route.
    ///
    /// Returns the region sent, or `None` without notifying when there is no active route.
    pub fn zoom_to_active_route(&self) -> Option<Region> {
        let padding = self.edge_padding();
        let region = {
            let slot = self.active.read().unwrap_or_else(PoisonError::into_inner);
            let region = bounding_region(&slot.as_ref()?.route, padding);
            self.enqueue(OverlayEvent::CameraFit(region));
            region
        };

        debug!("[OverlayRegistry] Zooming to {:?}", region);
        self.deliver_pending();
        Some(region)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn config(&self) -> OverlayConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn edge_padding(&self) -> f64 {
        self.config.read().unwrap_or_else(PoisonError::into_inner).edge_padding
    }

    /// Override the padding used when framing the route.
    pub fn set_edge_padding(&self, padding: f64) {
        let padding = sanitize_padding(padding);
        self.config.write().unwrap_or_else(PoisonError::into_inner).edge_padding = padding;
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Register an observer without taking ownership of it.
    pub fn add_observer<O: OverlayObserver + 'static>(&self, observer: &Arc<O>) {
        let observer: Weak<O> = Arc::downgrade(observer);
        let observer: Weak<dyn OverlayObserver> = observer;
        self.observers.lock().unwrap_or_else(PoisonError::into_inner).push(observer);
    }

    /// Number of registered observers that are still alive.
    pub fn observer_count(&self) -> usize {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|o| o.strong_count() > 0);
        observers.len()
    }

    /// Queue an event. Callers hold the slot lock so queue order matches change order.
    fn enqueue(&self, event: OverlayEvent) {
        self.dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .push_back(event);
    }

    /// Deliver queued events in order, unless another call is already doing so.
    fn deliver_pending(&self) {
        {
            let mut dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
            if dispatch.draining {
                return;
            }
            dispatch.draining = true;
        }
        let _reset = DrainReset(&self.dispatch);

        loop {
            let event = {
                let mut dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
                match dispatch.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        dispatch.draining = false;
                        return;
                    }
                }
            };

            for observer in self.live_observers() {
                observer.on_overlay_event(&event);
            }
        }
    }

    fn live_observers(&self) -> Vec<Arc<dyn OverlayObserver>> {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|o| o.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// ============================================================================
// Tests
// ============================================================================
