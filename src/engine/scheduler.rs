//! Playback scheduler
//!
//! [`PlaybackEngine`] owns the source, the buffer, the projection and the
//! playback state. It is a two-state machine (running or stopped) driven
//! from outside by calling [`PlaybackEngine::tick`] at a fixed interval.
//!
//! # Tick
//!
//! While running, each tick:
//!
//! 1. Reads up to [`TelemetrySource::units_per_tick`] raw units, stopping
//!    early on `NoDataYet`, end of stream, or when the tick budget runs out
//! 2. Parses each one; a parse error is logged, counted and skipped
//! 3. Appends parsed records and advances the cursor
//! 4. Updates the projection and the field snapshot
//! 5. Calls every subscriber with a borrowed [`TickUpdate`]
//!
//! A stopped engine ignores ticks. End of stream stops the engine once and
//! publishes [`PlaybackEvent::Completed`]. Losing a live source closes it,
//! stops the engine and publishes [`PlaybackEvent::SourceLost`]; nothing
//! reconnects until `start` is called again.
//!
//! # Example
//!
//! ```ignore
//! use cansat_gcs::config::AppConfig;
//! use cansat_gcs::engine::PlaybackEngine;
//!
//! let mut engine = PlaybackEngine::from_config(&AppConfig::replay("flight.csv"))?;
//! engine.subscribe(|update| {
//!     println!("{} / {}", update.state.cursor, update.state.total_known);
//! });
//! engine.start()?;
//! while engine.state().running {
//!     engine.tick();
//! }
//! ```

use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::buffer::TelemetryBuffer;
use super::parser::RecordParser;
use super::projector::{ChannelProjection, ChannelProjector};
use crate::config::{AppConfig, ChannelSet, XAxis};
use crate::error::{ParseError, Result, TelemetryError};
use crate::source::{build_source, ReadOutcome, TelemetrySource};
use crate::types::{FieldReading, FieldSnapshot, PlaybackState, RawLine, TelemetryRecord};

/// Handle returned by [`PlaybackEngine::subscribe`]
pub type SubscriptionId = u64;

/// Callback invoked synchronously once per published update
pub type Subscriber = Box<dyn FnMut(&TickUpdate<'_>) + Send>;

/// Lifecycle events attached to an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PlaybackEvent {
    /// Bounded source exhausted; the engine stopped
    Completed,
    /// Source went away mid-stream; the engine stopped
    SourceLost(String),
    /// Buffer and projection were cleared
    Reset,
}

/// Why a tick's read loop ended early
enum StreamEnd {
    Completed,
    Lost(String),
}

/// What one call to [`PlaybackEngine::tick`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Engine was stopped; nothing happened
    Idle,
    /// Records were read (possibly none)
    Advanced { appended: usize, errors: usize },
    /// End of stream reached during this tick
    Completed { appended: usize, errors: usize },
    /// Source lost during this tick
    SourceLost { appended: usize, reason: String },
}

impl TickOutcome {
    /// Records appended by this tick
    pub fn appended(&self) -> usize {
        match self {
            TickOutcome::Idle => 0,
            TickOutcome::Advanced { appended, .. }
            | TickOutcome::Completed { appended, .. }
            | TickOutcome::SourceLost { appended, .. } => *appended,
        }
    }
}

/// Borrowed view handed to subscribers
///
/// Everything here is read-only and only valid for the duration of the
/// callback. Use [`TickUpdate::to_owned_snapshot`] to keep a copy.
#[derive(Debug)]
pub struct TickUpdate<'a> {
    pub state: PlaybackState,
    pub projection: &'a ChannelProjection,
    pub fields: &'a FieldSnapshot,
    /// Buffer prefix `[0, cursor)`
    pub records: &'a [TelemetryRecord],
    /// Positions appended by this tick
    pub appended: Range<usize>,
    /// Parse errors from this tick
    pub errors: &'a [ParseError],
    pub event: Option<PlaybackEvent>,
}

impl TickUpdate<'_> {
    /// Records appended by this tick
    pub fn new_records(&self) -> &[TelemetryRecord] {
        let end = self.appended.end.min(self.records.len());
        &self.records[self.appended.start.min(end)..end]
    }

    /// Immutable copy for handing to another thread
    pub fn to_owned_snapshot(&self) -> OwnedSnapshot {
        OwnedSnapshot {
            state: self.state,
            projection: self.projection.clone(),
            fields: self.fields.clone(),
            appended: self.appended.len(),
            errors: self.errors.to_vec(),
            event: self.event.clone(),
        }
    }
}

/// Owned copy of a [`TickUpdate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnedSnapshot {
    pub state: PlaybackState,
    pub projection: ChannelProjection,
    pub fields: FieldSnapshot,
    /// Number of records appended by the tick that produced this snapshot
    pub appended: usize,
    pub errors: Vec<ParseError>,
    pub event: Option<PlaybackEvent>,
}

/// Counters kept across the engine's lifetime
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackStats {
    /// Running ticks processed
    pub ticks: u64,
    pub records_appended: u64,
    pub parse_errors: u64,
    pub last_parse_error: Option<ParseError>,
    /// Reads that returned `NoDataYet`
    pub empty_reads: u64,
    /// Ticks skipped because the previous one ran long
    pub overruns: u64,
    /// Wall-clock time playback was first started
    pub started_at: Option<DateTime<Utc>>,
}

impl PlaybackStats {
    /// Fraction of parsed units that failed
    pub fn error_rate(&self) -> f64 {
        let total = self.records_appended + self.parse_errors;
        if total == 0 {
            0.0
        } else {
            self.parse_errors as f64 / total as f64
        }
    }
}

/// The ingestion and playback engine
pub struct PlaybackEngine {
    channels: Arc<ChannelSet>,
    source: Box<dyn TelemetrySource>,
    parser: Option<RecordParser>,
    buffer: TelemetryBuffer,
    projector: ChannelProjector,
    state: PlaybackState,
    fields: FieldSnapshot,
    stats: PlaybackStats,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
    next_sequence: u64,
    /// Raw units taken from the source since it was last opened from the start
    units_read: usize,
    tick_interval: Duration,
    /// Set once a bounded source reports end of stream
    exhausted: bool,
    /// Mission clock origin, set on first start
    mission_start: Option<Instant>,
    tick_errors: Vec<ParseError>,
}

impl PlaybackEngine {
    /// Engine over an explicit source
    pub fn new(config: &AppConfig, source: Box<dyn TelemetrySource>) -> Result<Self> {
        config.validate()?;
        let channels = Arc::new(config.channel_set()?);
        Ok(Self::with_channels(
            channels,
            &config.x_axis,
            config.tick_interval(),
            source,
        ))
    }

    /// Engine over the source selected by `config.source`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = build_source(config)?;
        Self::new(config, source)
    }

    /// Engine over an already validated channel table
    pub fn with_channels(
        channels: Arc<ChannelSet>,
        x_axis: &XAxis,
        tick_interval: Duration,
        source: Box<dyn TelemetrySource>,
    ) -> Self {
        let projector = ChannelProjector::new(&channels, x_axis);
        Self {
            channels,
            source,
            parser: None,
            buffer: TelemetryBuffer::new(),
            projector,
            state: PlaybackState::default(),
            fields: FieldSnapshot::default(),
            stats: PlaybackStats::default(),
            subscribers: Vec::new(),
            next_subscription: 0,
            next_sequence: 0,
            units_read: 0,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            exhausted: false,
            mission_start: None,
            tick_errors: Vec::new(),
        }
    }

    // ==================== Control ====================

    /// Start (or resume) playback, opening the source if needed
    ///
    /// An open failure is returned and the engine stays stopped. Starting
    /// an exhausted replay does nothing until [`PlaybackEngine::reset`].
    /// Reopening a replay that was closed mid-stream resumes after the
    /// rows already taken from it.
    pub fn start(&mut self) -> Result<()> {
        if self.state.running {
            return Ok(());
        }
        if self.exhausted {
            tracing::info!("{} is exhausted, reset to replay it", self.source.describe());
            return Ok(());
        }
        if !self.source.is_open() || self.parser.is_none() {
            self.open_source()?;
        }

        self.state.running = true;
        self.mission_start.get_or_insert_with(Instant::now);
        self.stats.started_at.get_or_insert_with(Utc::now);
        tracing::info!(
            "Playback started on {} at cursor {}",
            self.source.describe(),
            self.state.cursor
        );
        Ok(())
    }

    /// Stop playback; takes effect before the next tick
    pub fn stop(&mut self) {
        if self.state.running {
            self.state.running = false;
            tracing::info!("Playback stopped at cursor {}", self.state.cursor);
        }
    }

    /// Clear everything derived from the source and rewind if possible
    ///
    /// A replay source is reopened and the engine is left stopped at
    /// cursor 0. A live source keeps its connection; if the engine was
    /// running it keeps running and waits for new lines.
    pub fn reset(&mut self) -> Result<()> {
        let was_running = self.state.running;
        self.state.running = false;

        self.buffer.clear();
        self.projector.reset();
        self.next_sequence = 0;
        self.units_read = 0;
        self.state.cursor = 0;
        self.fields = FieldSnapshot::default();
        self.tick_errors.clear();
        self.exhausted = false;
        self.mission_start = None;

        let result = if self.source.is_restartable() {
            self.source.close();
            self.parser = None;
            self.open_source()
        } else {
            if was_running && self.source.is_open() {
                self.state.running = true;
                self.mission_start = Some(Instant::now());
            }
            Ok(())
        };

        tracing::info!("Playback reset ({})", self.source.describe());
        self.publish(0..0, Some(PlaybackEvent::Reset));
        result
    }

    /// Stop and release the source
    pub fn close(&mut self) {
        self.stop();
        if self.source.is_open() {
            self.source.close();
        }
        self.parser = None;
    }

    /// Register a callback run synchronously after every published update
    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where
        F: FnMut(&TickUpdate<'_>) + Send + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Remove a subscriber; returns whether it existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn set_tick_interval(&mut self, interval: Duration) {
        self.tick_interval = interval.max(Duration::from_millis(1));
        tracing::debug!("Tick interval set to {:?}", self.tick_interval);
    }

    // ==================== Tick ====================

    /// Run one tick
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.running {
            return TickOutcome::Idle;
        }

        let budget_end = Instant::now() + self.tick_interval;
        let start = self.buffer.len();
        self.stats.ticks += 1;
        self.tick_errors.clear();

        let mut end = None;
        for _ in 0..self.source.units_per_tick() {
            match self.source.read_next() {
                Ok(ReadOutcome::Line(line)) => {
                    self.units_read += 1;
                    self.ingest(line);
                }
                Ok(ReadOutcome::NoDataYet) => {
                    self.stats.empty_reads += 1;
                    break;
                }
                Ok(ReadOutcome::EndOfStream) => {
                    end = Some(StreamEnd::Completed);
                    break;
                }
                Err(e) => {
                    end = Some(StreamEnd::Lost(e.to_string()));
                    break;
                }
            }
            if Instant::now() >= budget_end {
                break;
            }
        }

        self.state.cursor = self.buffer.len();
        self.projector.update(self.buffer.prefix(self.state.cursor));
        self.refresh_fields(self.state.cursor > start);

        let appended = self.state.cursor - start;
        let errors = self.tick_errors.len();
        let (outcome, event) = match end {
            None => (TickOutcome::Advanced { appended, errors }, None),
            Some(StreamEnd::Completed) => {
                self.state.running = false;
                self.exhausted = true;
                tracing::info!(
                    "Playback completed: {} records, {} parse errors",
                    self.state.cursor,
                    self.stats.parse_errors
                );
                (
                    TickOutcome::Completed { appended, errors },
                    Some(PlaybackEvent::Completed),
                )
            }
            Some(StreamEnd::Lost(reason)) => {
                self.state.running = false;
                self.source.close();
                tracing::warn!("Source lost at cursor {}: {}", self.state.cursor, reason);
                (
                    TickOutcome::SourceLost {
                        appended,
                        reason: reason.clone(),
                    },
                    Some(PlaybackEvent::SourceLost(reason)),
                )
            }
        };

        tracing::debug!(
            "tick {}: +{} records, {} errors, cursor {}",
            self.stats.ticks,
            appended,
            errors,
            self.state.cursor
        );
        self.publish(start..self.state.cursor, event);
        outcome
    }

    /// Count ticks the host had to skip because a tick ran long
    pub fn record_overruns(&mut self, skipped: u64) {
        self.stats.overruns += skipped;
    }

    // ==================== Accessors ====================

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn buffer(&self) -> &TelemetryBuffer {
        &self.buffer
    }

    pub fn projection(&self) -> &ChannelProjection {
        self.projector.projection()
    }

    pub fn latest_fields(&self) -> &FieldSnapshot {
        &self.fields
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.stats
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Whether a bounded source has been played to the end
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Owned copy of the current state, outside any tick
    pub fn snapshot(&self) -> OwnedSnapshot {
        OwnedSnapshot {
            state: self.state,
            projection: self.projector.projection().clone(),
            fields: self.fields.clone(),
            appended: 0,
            errors: Vec::new(),
            event: None,
        }
    }

    // ==================== Internals ====================

    fn open_source(&mut self) -> Result<()> {
        let info = self.source.open()?;
        let parser = match RecordParser::from_source_info(self.channels.clone(), &info) {
            Ok(parser) => parser,
            Err(e) => {
                self.source.close();
                return Err(e.with_context(format!("cannot play {}", self.source.describe())));
            }
        };

        if let Some(total) = info.total_known.bound() {
            if total < self.units_read {
                self.source.close();
                return Err(TelemetryError::Config(format!(
                    "{} now has {} rows but {} were already played",
                    self.source.describe(),
                    total,
                    self.units_read
                )));
            }
        }
        if self.units_read > 0 && self.source.is_restartable() {
            self.skip_played()?;
        }

        self.state.total_known = info.total_known;
        self.parser = Some(parser);
        Ok(())
    }

    /// Discard the units a reopened restartable source already delivered
    fn skip_played(&mut self) -> Result<()> {
        for skipped in 0..self.units_read {
            match self.source.read_next() {
                Ok(ReadOutcome::Line(_)) => {}
                Ok(_) => {
                    self.source.close();
                    return Err(TelemetryError::Config(format!(
                        "{} ended after {} rows but {} were already played",
                        self.source.describe(),
                        skipped,
                        self.units_read
                    )));
                }
                Err(e) => {
                    self.source.close();
                    return Err(e);
                }
            }
        }
        tracing::info!(
            "Resuming {} after {} rows",
            self.source.describe(),
            self.units_read
        );
        Ok(())
    }

    fn ingest(&mut self, line: RawLine) {
        let Some(parser) = self.parser.as_ref() else {
            return;
        };
        match parser.parse(&line, self.next_sequence) {
            Ok(record) => {
                self.buffer.append(record);
                self.next_sequence += 1;
                self.stats.records_appended += 1;
            }
            Err(e) => {
                tracing::warn!("Skipping record: {}", e);
                self.stats.parse_errors += 1;
                self.stats.last_parse_error = Some(e.clone());
                self.tick_errors.push(e);
            }
        }
    }

    fn refresh_fields(&mut self, new_record: bool) {
        self.fields.mission_time = self
            .mission_start
            .map(|start| start.elapsed())
            .unwrap_or_default();

        if !new_record {
            return;
        }
        let Some(latest) = self.buffer.last() else {
            return;
        };

        self.fields.sequence = Some(latest.sequence());
        self.fields.received_at = Some(Utc::now());
        self.fields.fields = self
            .channels
            .specs()
            .iter()
            .enumerate()
            .map(|(index, spec)| FieldReading {
                name: spec.name.clone(),
                label: spec.display_label().to_string(),
                unit: spec.unit.clone(),
                value: latest.value(index).clone(),
            })
            .collect();
    }

    fn publish(&mut self, appended: Range<usize>, event: Option<PlaybackEvent>) {
        if self.subscribers.is_empty() {
            return;
        }
        let update = TickUpdate {
            state: self.state,
            projection: self.projector.projection(),
            fields: &self.fields,
            records: self.buffer.prefix(self.state.cursor),
            appended,
            errors: &self.tick_errors,
            event,
        };
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&update);
        }
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("source", &self.source.describe())
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
