//! # cansat-gcs: CanSat Ground Station Telemetry Engine
//!
//! Ingests CanSat telemetry from a CSV recording or a live serial link,
//! buffers it, and replays it at a fixed tick rate as per-channel series
//! and a field-by-field snapshot for a display to render.
//!
//! ## Architecture
//!
//! - **Sources**: CSV replay (finite, restartable) and live serial (unbounded)
//! - **Engine**: record parser, append-only buffer, incremental channel projector,
//!   and the tick-driven playback scheduler
//! - **Backend**: optional host thread driving the engine, talking to the
//!   display over crossbeam channels
//!
//! The display itself is not part of this crate. It subscribes to the engine
//! (same thread) or holds a [`backend::HostHandle`] (separate thread) and
//! renders what it receives.
//!
//! ## Configuration
//!
//! Configuration is stored in the platform-appropriate data directory under
//! `dev.cansat.gcs`:
//!
//! - **Linux**: `~/.local/share/dev.cansat.gcs/`
//! - **macOS**: `~/Library/Application Support/dev.cansat.gcs/`
//! - **Windows**: `%APPDATA%\dev.cansat.gcs\`
//!
//! ## Example
//!
//! ```ignore
//! use cansat_gcs::{backend::EngineHost, config::AppConfig, engine::PlaybackEngine};
//!
//! let config = AppConfig::live("/dev/ttyACM0", 9600);
//! let engine = PlaybackEngine::from_config(&config)?;
//! let (host, handle) = EngineHost::new(engine);
//! let thread = host.spawn()?;
//!
//! handle.start();
//! while let Some(snapshot) = handle.wait_snapshot(std::time::Duration::from_secs(5)) {
//!     for series in snapshot.projection.iter() {
//!         println!("{}: {:?}", series.name, series.last());
//!     }
//! }
//! handle.shutdown();
//! thread.join().ok();
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use backend::{EngineCommand, EngineHost, EngineMessage, HostHandle};
pub use config::{AppConfig, ChannelSet, ChannelSpec};
pub use engine::{ChannelProjection, ChannelSeries, OwnedSnapshot, PlaybackEngine, TickUpdate};
pub use error::{ParseError, Result, TelemetryError};
pub use source::{CsvReplaySource, LiveLineSource, TelemetrySource};
pub use types::{FieldSnapshot, FieldValue, PlaybackState, TelemetryRecord, TotalKnown};
