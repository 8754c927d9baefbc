//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use cansat_gcs::engine::PlaybackEngine;
use std::time::Duration;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(500)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Tick a started engine until it stops, with an upper bound
pub fn run_to_completion(engine: &mut PlaybackEngine, max_ticks: usize) -> usize {
    let mut ticks = 0;
    while engine.state().running && ticks < max_ticks {
        engine.tick();
        ticks += 1;
    }
    ticks
}

/// Points of a series as `(x, y)` tuples, for readable assertions
pub fn series_points(engine: &PlaybackEngine, name: &str) -> Vec<(f64, f64)> {
    engine
        .projection()
        .get(name)
        .map(|s| s.points().iter().map(|p| (p[0], p[1])).collect())
        .unwrap_or_default()
}
