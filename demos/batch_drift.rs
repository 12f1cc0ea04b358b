//! Example of checking a long recorded track against a long route in parallel.
//!
//! Run with: cargo run --example batch_drift --features parallel

use directions_overlay::{
    min_distance_to_route, min_distances_to_route, Coordinate, Route, TravelMode,
    SPATIAL_INDEX_MIN_SEGMENTS,
};
use std::time::Instant;

fn main() {
    println!("Batch Drift Example\n");

    // A winding route with enough segments to use the spatial index
    let waypoints: Vec<Coordinate> = (0..5_000)
        .map(|i| {
            let t = i as f64 * 0.0004;
            Coordinate::new(47.0 + t * 0.25, 8.0 + t + 0.002 * (t * 40.0).sin())
        })
        .collect();
    let route = Route::new(waypoints, TravelMode::Bicycle).expect("valid route");

    println!(
        "Route: {} segments (index threshold {}), {:.1}km\n",
        route.segment_count(),
        SPATIAL_INDEX_MIN_SEGMENTS,
        route.distance_meters() / 1000.0
    );

    // GPS track following the route with a growing sideways offset
    let track: Vec<Coordinate> = route
        .coordinates()
        .step_by(5)
        .enumerate()
        .map(|(i, c)| Coordinate::new(c.latitude + 0.00001 * (i % 50) as f64, c.longitude))
        .collect();

    let start = Instant::now();
    let sequential: Vec<f64> = track
        .iter()
        .map(|p| min_distance_to_route(p, Some(&route)))
        .collect();
    let sequential_time = start.elapsed();

    let start = Instant::now();
    let parallel = min_distances_to_route(&track, Some(&route));
    let parallel_time = start.elapsed();

    assert_eq!(sequential, parallel);

    let max = parallel.iter().copied().fold(0.0, f64::max);
    let mean = parallel.iter().sum::<f64>() / parallel.len() as f64;
    let off_route = parallel.iter().filter(|d| **d > 30.0).count();

    println!("Checked {} fixes", track.len());
    println!("  sequential: {:?}", sequential_time);
    println!("  parallel:   {:?}", parallel_time);
    println!("  mean drift: {:.1}m, max drift: {:.1}m", mean, max);
    println!("  fixes more than 30m off route: {}", off_route);
}
