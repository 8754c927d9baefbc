//! Telemetry sources
//!
//! A source produces raw lines or rows; it knows nothing about channels
//! or parsing. Two kinds exist:
//!
//! - [`CsvReplaySource`] - a finite, restartable CSV file
//! - [`LiveLineSource`] - an unbounded newline-framed byte stream (serial)
//!
//! With the `simulator` feature, [`SimulatedSource`] produces synthetic
//! packets for running without hardware.
//!
//! Both share the [`TelemetrySource`] interface: `open`, `read_next`,
//! `close`. A live read that finds nothing before its timeout returns
//! [`ReadOutcome::NoDataYet`]; that is not an error.

pub mod live;
pub mod replay;
#[cfg(feature = "simulator")]
pub mod simulator;

pub use live::{list_ports, LiveLineSource};
pub use replay::CsvReplaySource;
#[cfg(feature = "simulator")]
pub use simulator::{SignalPattern, SimulatedSource};

use crate::config::{AppConfig, SourceConfig};
use crate::error::{Result, TelemetryError};
use crate::types::{RawLine, TotalKnown};

/// Result of one read attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A raw line or row
    Line(RawLine),
    /// Nothing arrived before the read timeout
    NoDataYet,
    /// Bounded source exhausted
    EndOfStream,
}

/// What a source reports when opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Record count, if known up front
    pub total_known: TotalKnown,
    /// Header columns for sources that carry them (CSV)
    pub columns: Option<Vec<String>>,
}

/// Common interface for replay and live sources
pub trait TelemetrySource: Send {
    /// Open (or reopen from the start) the underlying file or port
    fn open(&mut self) -> Result<SourceInfo>;

    /// Read the next raw unit, bounded by the source's read timeout
    fn read_next(&mut self) -> Result<ReadOutcome>;

    /// Release the file or port
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Whether reopening replays from the beginning
    fn is_restartable(&self) -> bool;

    /// Upper bound on units consumed in one tick
    fn units_per_tick(&self) -> usize;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Build the source selected by configuration
pub fn build_source(config: &AppConfig) -> Result<Box<dyn TelemetrySource>> {
    match &config.source {
        SourceConfig::Replay(replay) => Ok(Box::new(CsvReplaySource::from_config(replay))),
        SourceConfig::Live(serial) => Ok(Box::new(LiveLineSource::serial(serial))),
        #[cfg(feature = "simulator")]
        SourceConfig::Simulator(sim) => Ok(Box::new(SimulatedSource::new(
            config.channel_set()?,
            sim,
        ))),
        #[cfg(not(feature = "simulator"))]
        SourceConfig::Simulator(_) => Err(TelemetryError::Config(
            "simulator source requires the `simulator` feature".to_string(),
        )),
    }
}
