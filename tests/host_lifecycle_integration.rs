//! Integration tests for the threaded engine host
//!
//! These tests validate the complete host workflow:
//! - Spawn and shutdown
//! - Playback start, completion and reset
//! - Start failures reported to the display

mod common;

use cansat_gcs::backend::{EngineHost, EngineMessage, HostHandle};
use cansat_gcs::config::AppConfig;
use cansat_gcs::engine::PlaybackEngine;
use cansat_gcs::types::TotalKnown;
use common::builders::{pressure_tilt, replay_config, CsvBuilder};
use common::mock_helpers::{ScriptedSource, Step};
use common::test_timeout;
use std::time::{Duration, Instant};

/// Wait until the host sends a message matching `pred`
fn wait_for(handle: &HostHandle, pred: impl Fn(&EngineMessage) -> bool) -> Option<EngineMessage> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(msg) = handle.recv_timeout(test_timeout()) {
            if pred(&msg) {
                return Some(msg);
            }
        }
    }
    None
}

#[test]
fn test_host_creation_and_shutdown() {
    let engine = PlaybackEngine::from_config(&AppConfig::replay("unused.csv")).unwrap();
    let (host, handle) = EngineHost::new(engine);
    let thread = host.spawn().unwrap();

    handle.shutdown();

    assert!(wait_for(&handle, |m| *m == EngineMessage::Shutdown).is_some());
    assert!(thread.join().is_ok(), "Host thread should exit cleanly");
}

#[test]
fn test_replay_plays_to_completion() {
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"])
        .rows(&["100,1", "101,", "102,3", "103,4"])
        .write();
    let engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    let (host, handle) = EngineHost::new(engine);
    let thread = host.spawn().unwrap();

    handle.start();
    assert_eq!(
        wait_for(&handle, |m| *m == EngineMessage::Completed),
        Some(EngineMessage::Completed)
    );

    // The last snapshot published carries the final cursor
    let snapshot = handle.latest_snapshot().expect("final snapshot");
    assert_eq!(snapshot.state.cursor, 4);
    assert_eq!(snapshot.state.total_known, TotalKnown::Bounded(4));
    assert!(!snapshot.state.running);
    assert_eq!(snapshot.projection.get("TILT_X").unwrap().gaps(), &[1]);

    handle.request_stats();
    match wait_for(&handle, |m| matches!(m, EngineMessage::Stats(_))) {
        Some(EngineMessage::Stats(stats)) => assert_eq!(stats.records_appended, 4),
        other => panic!("expected stats, got {:?}", other),
    }

    handle.shutdown();
    thread.join().unwrap();
}

#[test]
fn test_reset_then_replay_again() {
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"])
        .rows(&["100,1", "101,2"])
        .write();
    let engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    let (host, handle) = EngineHost::new(engine);
    let thread = host.spawn().unwrap();

    handle.start();
    assert!(wait_for(&handle, |m| *m == EngineMessage::Completed).is_some());

    handle.reset();
    handle.start();
    assert!(wait_for(&handle, |m| *m == EngineMessage::Completed).is_some());

    let snapshot = handle.latest_snapshot().expect("final snapshot");
    assert_eq!(snapshot.state.cursor, 2);
    assert_eq!(snapshot.projection.get("PRESSURE").unwrap().len(), 2);

    handle.shutdown();
    thread.join().unwrap();
}

#[test]
fn test_start_failure_is_reported() {
    let config = AppConfig::replay("/nonexistent/flight.csv");
    let engine = PlaybackEngine::from_config(&config).unwrap();
    let (host, handle) = EngineHost::new(engine);
    let thread = host.spawn().unwrap();

    handle.start();
    match wait_for(&handle, |m| matches!(m, EngineMessage::StartFailed(_))) {
        Some(EngineMessage::StartFailed(reason)) => assert!(reason.contains("flight.csv")),
        other => panic!("expected start failure, got {:?}", other),
    }

    handle.shutdown();
    thread.join().unwrap();
}

#[test]
fn test_source_loss_is_reported() {
    let source = ScriptedSource::new(vec![Step::Line("100,1"), Step::Lost("port closed")]);
    let mut config = AppConfig::default().with_channels(pressure_tilt());
    config.tick_interval_ms = 10;
    let engine = PlaybackEngine::new(&config, Box::new(source)).unwrap();
    let (host, handle) = EngineHost::new(engine);
    let thread = host.spawn().unwrap();

    handle.start();
    match wait_for(&handle, |m| matches!(m, EngineMessage::SourceError(_))) {
        Some(EngineMessage::SourceError(reason)) => assert!(reason.contains("port closed")),
        other => panic!("expected source error, got {:?}", other),
    }

    let snapshot = handle.latest_snapshot().expect("snapshot after loss");
    assert_eq!(snapshot.state.cursor, 1);
    assert!(!snapshot.state.running);

    handle.shutdown();
    thread.join().unwrap();
}

#[test]
fn test_slow_display_sees_only_latest_snapshot() {
    let rows: Vec<String> = (0..20).map(|i| format!("{},{}", 100 + i, i)).collect();
    let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"]).rows(&refs).write();
    let engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    let (host, handle) = EngineHost::new(engine);
    let thread = host.spawn().unwrap();

    // Never read snapshots until playback is over
    handle.start();
    assert!(wait_for(&handle, |m| *m == EngineMessage::Completed).is_some());

    let snapshot = handle.latest_snapshot().expect("latest snapshot");
    assert_eq!(snapshot.state.cursor, 20);
    assert!(handle.latest_snapshot().is_none());

    handle.shutdown();
    thread.join().unwrap();
}

#[test]
fn test_dropping_handle_stops_host() {
    let engine = PlaybackEngine::from_config(&AppConfig::replay("unused.csv")).unwrap();
    let (host, handle) = EngineHost::new(engine);
    let thread = host.spawn().unwrap();

    drop(handle);
    assert!(thread.join().is_ok());
}
