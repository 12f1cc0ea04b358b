//! Example of tracking how far a user drifts from the active route.
//!
//! Run with: cargo run --example drift_detection

use directions_overlay::{
    nearest_segment, Coordinate, DisplayMode, OverlayConfig, OverlayEvent, OverlayObserver,
    OverlayRegistry, Route, TravelMode, NO_ROUTE_DISTANCE,
};
use std::sync::Arc;

/// Drift beyond this many meters triggers a reroute prompt
const REROUTE_THRESHOLD: f64 = 50.0;

struct PrintingMap;

impl OverlayObserver for PrintingMap {
    fn on_overlay_event(&self, event: &OverlayEvent) {
        match event {
            OverlayEvent::Created(o) | OverlayEvent::Replaced { current: o, .. } => {
                println!("   [map] drawing {} ({} points)", o.route().id(), o.path().len())
            }
            OverlayEvent::Redrawn { current, .. } => {
                println!("   [map] redraw as {:?}", current.display_mode())
            }
            OverlayEvent::Cleared(_) => println!("   [map] overlay removed"),
            OverlayEvent::CameraFit(region) => println!(
                "   [map] camera to ({:.4}, {:.4})-({:.4}, {:.4}), padding {}",
                region.bounds.min_lat,
                region.bounds.min_lng,
                region.bounds.max_lat,
                region.bounds.max_lng,
                region.padding
            ),
        }
    }
}

fn main() {
    println!("Drift Detection Example\n");

    let registry = OverlayRegistry::new(OverlayConfig::default());
    let map = Arc::new(PrintingMap);
    registry.add_observer(&map);

    // Reading town centre to the university (London area)
    let route = Route::new(
        vec![
            Coordinate::new(51.4564, -0.9719),
            Coordinate::new(51.4526, -0.9680),
            Coordinate::new(51.4470, -0.9570),
            Coordinate::new(51.4414, -0.9420),
        ],
        TravelMode::Pedestrian,
    )
    .expect("valid route");

    println!("1. Before any route is delivered:");
    let user = Coordinate::new(51.4500, -0.9620);
    let d = registry.distance_to_active_route(&user);
    assert_eq!(d, NO_ROUTE_DISTANCE);
    println!("   distance = NO_ROUTE_DISTANCE\n");

    println!("2. Route delivered:");
    registry.set_active_route(route.clone(), DisplayMode::Overview);
    let summary = route.summary();
    println!(
        "   {:.0}m, ~{:.0} min on foot\n",
        summary.distance_meters,
        summary.duration_seconds / 60.0
    );

    println!("3. Simulated walk:");
    let track = [
        Coordinate::new(51.4563, -0.9717),
        Coordinate::new(51.4540, -0.9700),
        Coordinate::new(51.4500, -0.9620),
        Coordinate::new(51.4480, -0.9650), // wrong turn
        Coordinate::new(51.4460, -0.9690),
    ];
    for (i, position) in track.iter().enumerate() {
        let drift = registry.distance_to_active_route(position);
        let segment = nearest_segment(position, &route).map(|n| n.segment);
        let status = if drift > REROUTE_THRESHOLD { "OFF ROUTE" } else { "on route" };
        println!(
            "   fix {}: {:>6.1}m from segment {:?} [{}]",
            i, drift, segment, status
        );
    }
    println!();

    println!("4. Zoom to route:");
    if let Some(camera) = registry.camera_for_viewport(390.0, 844.0) {
        println!(
            "   center ({:.4}, {:.4}) at zoom {:.2}",
            camera.center.latitude, camera.center.longitude, camera.zoom
        );
    }
    registry.zoom_to_active_route();
    println!();

    println!("5. Hide the overlay, keep tracking:");
    registry.set_display_mode(DisplayMode::None);
    println!(
        "   drift still {:.1}m\n",
        registry.distance_to_active_route(&track[4])
    );

    println!("6. Directions dismissed:");
    registry.clear_active_route();
    assert_eq!(registry.distance_to_active_route(&track[4]), NO_ROUTE_DISTANCE);
}
