//! Integration tests for CSV replay playback
//!
//! These tests drive a real CSV file through the engine:
//! - Row-by-row playback and completion
//! - Absent values as gaps
//! - Malformed rows
//! - Reset and replay

mod common;

use cansat_gcs::config::{AppConfig, ReplayConfig, SourceConfig};
use cansat_gcs::engine::{PlaybackEngine, PlaybackEvent, TickOutcome};
use cansat_gcs::error::{ParseErrorKind, TelemetryError};
use cansat_gcs::types::{FieldValue, TotalKnown};
use common::builders::{pressure_tilt, replay_config, ChannelsBuilder, CsvBuilder};
use common::{run_to_completion, series_points};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

#[test]
fn test_absent_channel_leaves_a_gap() {
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"])
        .rows(&["100,2", "101,"])
        .write();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    engine.start().unwrap();

    engine.tick();
    engine.tick();

    assert_eq!(engine.state().cursor, 2);
    assert_eq!(series_points(&engine, "PRESSURE"), vec![(0.0, 100.0), (1.0, 101.0)]);
    assert_eq!(series_points(&engine, "TILT_X"), vec![(0.0, 2.0)]);
    assert_eq!(engine.projection().get("TILT_X").unwrap().gaps(), &[1]);
}

#[test]
fn test_malformed_row_is_skipped_and_counted() {
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"])
        .rows(&["100,2", "7", "102,3"])
        .write();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    engine.start().unwrap();

    engine.tick();
    let before = engine.stats().parse_errors;
    let outcome = engine.tick();
    assert_eq!(outcome, TickOutcome::Advanced { appended: 0, errors: 1 });
    assert_eq!(engine.stats().parse_errors, before + 1);

    let cursor = engine.state().cursor;
    engine.tick();
    assert_eq!(engine.state().cursor, cursor + 1);

    let err = engine.stats().last_parse_error.clone().unwrap();
    assert_eq!(err.offset, 3);
    assert_eq!(
        err.kind,
        ParseErrorKind::WrongFieldCount {
            expected: 2,
            found: 1
        }
    );
}

#[test]
fn test_completion_is_reported_once() {
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"])
        .rows(&["1,1", "2,2", "3,3"])
        .write();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.subscribe(move |update| {
        if let Some(event) = &update.event {
            sink.lock().unwrap().push(event.clone());
        }
    });

    engine.start().unwrap();
    run_to_completion(&mut engine, 100);

    assert_eq!(engine.state().cursor, 3);
    assert_eq!(engine.state().total_known, TotalKnown::Bounded(3));
    assert!(!engine.state().running);

    let len = engine.buffer().len();
    for _ in 0..5 {
        assert_eq!(engine.tick(), TickOutcome::Idle);
    }
    assert_eq!(engine.buffer().len(), len);
    assert_eq!(*events.lock().unwrap(), vec![PlaybackEvent::Completed]);
}

#[test]
fn test_reset_replays_identically() {
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"])
        .rows(&["100,2", "101,", ",4", "bad,5", "104,6"])
        .write();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();

    engine.start().unwrap();
    run_to_completion(&mut engine, 100);
    let first = engine.projection().clone();

    engine.reset().unwrap();
    assert_eq!(engine.state().cursor, 0);
    assert!(!engine.state().running);
    assert_eq!(engine.state().total_known, TotalKnown::Bounded(5));

    engine.start().unwrap();
    run_to_completion(&mut engine, 100);
    assert_eq!(engine.projection(), &first);
    assert_eq!(engine.buffer().get(0).map(|r| r.sequence()), Some(0));
}

#[test]
fn test_status_fields_pass_through() {
    let file = CsvBuilder::new(&["PACKET_COUNT", "STATE", "ALTITUDE"])
        .rows(&["1,ASCENT,12.5", "2,DESCENT,700"])
        .write();
    let channels = ChannelsBuilder::new()
        .numeric("PACKET_COUNT")
        .text("STATE")
        .plotted("ALTITUDE", "m")
        .build();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, channels)).unwrap();
    engine.start().unwrap();
    engine.tick();
    engine.tick();

    let fields = engine.latest_fields();
    assert_eq!(fields.sequence, Some(1));
    assert_eq!(
        fields.get("STATE").map(|f| f.value.clone()),
        Some(FieldValue::Text("DESCENT".to_string()))
    );
    assert_eq!(
        fields.get("ALTITUDE").map(|f| f.value.clone()),
        Some(FieldValue::Number(700.0))
    );
    assert!(fields.received_at.is_some());
}

#[test]
fn test_default_channel_set_accepts_partial_header() {
    let file = CsvBuilder::new(&["PRESSURE", "ALTITUDE", "TILT_X", "TILT_Y", "TEMPERATURE", "AIR_SPEED"])
        .rows(&["101325,0,0,0,21,0", "101200,10.5,1,-1,20.9,3.2"])
        .write();
    let config = AppConfig {
        source: SourceConfig::Replay(ReplayConfig {
            path: file.path().to_path_buf(),
            rows_per_tick: 2,
        }),
        ..AppConfig::default()
    };
    let mut engine = PlaybackEngine::from_config(&config).unwrap();
    engine.start().unwrap();
    engine.tick();

    assert_eq!(engine.state().cursor, 2);
    assert_eq!(engine.projection().len(), 6);
    assert_eq!(series_points(&engine, "ALTITUDE"), vec![(0.0, 0.0), (1.0, 10.5)]);
    // Channels missing from the header are absent, not zero
    assert!(engine.buffer().get(0).unwrap().get(engine.channels(), "VOLTAGE").is_absent());
}

#[test]
fn test_mismatched_header_keeps_engine_stopped() {
    let file = CsvBuilder::new(&["Pressure", "TILT_X"]).row("1,2").write();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();

    let err = engine.start().unwrap_err();
    assert!(err.to_string().contains("Pressure"));
    assert!(!engine.state().running);
    assert_eq!(engine.tick(), TickOutcome::Idle);
}

#[test]
fn test_missing_file_is_open_error() {
    let config = AppConfig::replay("/nonexistent/sensor_data.csv").with_channels(pressure_tilt());
    let mut engine = PlaybackEngine::from_config(&config).unwrap();

    let err = engine.start().unwrap_err();
    assert!(matches!(err, TelemetryError::SourceOpen { .. }));
    assert!(!engine.state().running);
}

#[test]
fn test_empty_file_is_open_error() {
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"]).write();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    assert!(matches!(
        engine.start(),
        Err(TelemetryError::SourceOpen { .. })
    ));
}

#[test]
fn test_stop_is_cooperative() {
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"])
        .rows(&["1,1", "2,2", "3,3"])
        .write();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    engine.start().unwrap();
    engine.tick();
    engine.stop();
    engine.tick();
    assert_eq!(engine.state().cursor, 1);

    engine.start().unwrap();
    engine.tick();
    assert_eq!(engine.state().cursor, 2);
}

#[test]
fn test_reopen_after_close_resumes_without_duplicates() {
    let file = CsvBuilder::new(&["PRESSURE", "TILT_X"])
        .rows(&["1,0", "oops", "3,0", "4,0"])
        .write();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    engine.start().unwrap();
    engine.tick();
    engine.tick();

    // Dropping the file handle mid-playback, then starting again
    engine.close();
    engine.start().unwrap();
    run_to_completion(&mut engine, 100);

    assert_eq!(engine.state().cursor, 3);
    assert_eq!(engine.state().total_known, TotalKnown::Bounded(4));
    assert_eq!(
        series_points(&engine, "PRESSURE"),
        vec![(0.0, 1.0), (1.0, 3.0), (2.0, 4.0)]
    );
    assert_eq!(engine.stats().parse_errors, 1);
}

#[test]
fn test_rows_written_after_start_are_not_played() {
    use std::io::Write;

    let mut file = CsvBuilder::new(&["PRESSURE", "TILT_X"])
        .rows(&["1,0", "2,0"])
        .write();
    let mut engine = PlaybackEngine::from_config(&replay_config(&file, pressure_tilt())).unwrap();
    engine.start().unwrap();

    file.write_all(b"3,0\n4,0\n").unwrap();
    file.flush().unwrap();
    run_to_completion(&mut engine, 100);

    assert_eq!(engine.state().cursor, 2);
    assert_eq!(engine.state().total_known, TotalKnown::Bounded(2));
    assert!(engine.is_exhausted());
}

fn arb_rows() -> impl Strategy<Value = Vec<(Option<i32>, Option<i32>)>> {
    prop::collection::vec(
        (prop::option::of(-100_000i32..100_000), prop::option::of(-90i32..90)),
        1..40,
    )
}

fn render_rows(rows: &[(Option<i32>, Option<i32>)]) -> Vec<String> {
    let cell = |v: &Option<i32>| v.map(|v| v.to_string()).unwrap_or_default();
    rows.iter()
        .map(|(p, t)| format!("{},{}", cell(p), cell(t)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_replay_to_completion(rows in arb_rows(), rows_per_tick in 1usize..4) {
        let rendered = render_rows(&rows);
        let refs: Vec<&str> = rendered.iter().map(|s| s.as_str()).collect();
        let file = CsvBuilder::new(&["PRESSURE", "TILT_X"]).rows(&refs).write();

        let mut config = replay_config(&file, pressure_tilt());
        if let SourceConfig::Replay(replay) = &mut config.source {
            replay.rows_per_tick = rows_per_tick;
        }
        let mut engine = PlaybackEngine::from_config(&config).unwrap();
        engine.start().unwrap();

        let mut last_cursor = 0;
        while engine.state().running {
            engine.tick();
            prop_assert!(engine.state().cursor >= last_cursor);
            last_cursor = engine.state().cursor;
        }

        prop_assert_eq!(engine.state().total_known, TotalKnown::Bounded(rows.len()));
        prop_assert_eq!(engine.state().cursor, rows.len());

        let with_pressure = rows.iter().filter(|(p, _)| p.is_some()).count();
        let with_tilt = rows.iter().filter(|(_, t)| t.is_some()).count();
        prop_assert_eq!(engine.projection().get("PRESSURE").unwrap().len(), with_pressure);
        prop_assert_eq!(engine.projection().get("TILT_X").unwrap().len(), with_tilt);

        let sequences: Vec<u64> = engine.buffer().iter().map(|r| r.sequence()).collect();
        prop_assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }
}
