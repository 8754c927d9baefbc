//! Ingestion and playback engine
//!
//! Components, leaves first:
//!
//! - [`RecordParser`] - raw line or row to [`TelemetryRecord`](crate::types::TelemetryRecord)
//! - [`TelemetryBuffer`] - append-only record store
//! - [`ChannelProjector`] - incremental per-channel series over the buffer prefix
//! - [`PlaybackEngine`] - the tick-driven scheduler tying them to a source

pub mod buffer;
pub mod parser;
pub mod projector;
pub mod scheduler;

pub use buffer::TelemetryBuffer;
pub use parser::RecordParser;
pub use projector::{ChannelProjection, ChannelProjector, ChannelSeries};
pub use scheduler::{
    OwnedSnapshot, PlaybackEngine, PlaybackEvent, PlaybackStats, Subscriber, SubscriptionId,
    TickOutcome, TickUpdate,
};
