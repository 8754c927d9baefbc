//! Core data types for the telemetry engine
//!
//! # Main Types
//!
//! - [`RawLine`] - One unparsed CSV row or serial line with its source offset
//! - [`FieldValue`] - A parsed field: number, text, or explicitly absent
//! - [`TelemetryRecord`] - One parsed packet, values aligned with the channel set
//! - [`PlaybackState`] - Cursor, known total, running flag
//! - [`FieldSnapshot`] - The latest packet laid out for the status panel
//!
//! # Absent Values
//!
//! A field that is empty or fails numeric parsing is stored as
//! [`FieldValue::Absent`], never as zero. Consumers can always tell
//! "no reading" apart from "reading of 0".

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::ChannelSet;

/// Unparsed payload of a [`RawLine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPayload {
    /// A CSV data row, already split into fields
    Row(Vec<Vec<u8>>),
    /// A single protocol line without its terminator
    Line(Vec<u8>),
}

/// An opaque line or row plus where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Line (live) or row (replay) number, 1-based for rows after the header
    pub offset: u64,
    /// The raw bytes
    pub payload: RawPayload,
}

impl RawLine {
    pub fn line(offset: u64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            payload: RawPayload::Line(bytes.into()),
        }
    }

    pub fn row(offset: u64, fields: Vec<Vec<u8>>) -> Self {
        Self {
            offset,
            payload: RawPayload::Row(fields),
        }
    }
}

/// A single parsed field
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    /// Decimal reading
    Number(f64),
    /// Status text (mode, state letters, echoes)
    Text(String),
    /// No usable reading for this field
    #[default]
    Absent,
}

impl FieldValue {
    /// Numeric value, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Absent => f.write_str("-"),
        }
    }
}

/// One parsed telemetry packet
///
/// Values are stored positionally, one per channel in the configured
/// [`ChannelSet`]. Records are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    sequence: u64,
    offset: u64,
    values: Vec<FieldValue>,
}

impl TelemetryRecord {
    pub fn new(sequence: u64, offset: u64, values: Vec<FieldValue>) -> Self {
        Self {
            sequence,
            offset,
            values,
        }
    }

    /// Sequence number, assigned at parse time
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Source offset of the line this record came from
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Value at a channel-set position
    pub fn value(&self, index: usize) -> &FieldValue {
        self.values.get(index).unwrap_or(&FieldValue::Absent)
    }

    /// Value by channel name
    pub fn get(&self, channels: &ChannelSet, name: &str) -> &FieldValue {
        match channels.index_of(name) {
            Some(index) => self.value(index),
            None => &FieldValue::Absent,
        }
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }
}

/// How many records a source will deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TotalKnown {
    /// Replay: exact row count known at open
    Bounded(usize),
    /// Live: open-ended
    Unbounded,
}

impl TotalKnown {
    pub fn bound(&self) -> Option<usize> {
        match self {
            TotalKnown::Bounded(n) => Some(*n),
            TotalKnown::Unbounded => None,
        }
    }
}

impl fmt::Display for TotalKnown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalKnown::Bounded(n) => write!(f, "{}", n),
            TotalKnown::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Playback position, owned and mutated only by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    /// Number of records incorporated into the projection
    pub cursor: usize,
    /// Total the source will deliver
    pub total_known: TotalKnown,
    /// Whether ticks currently advance playback
    pub running: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            cursor: 0,
            total_known: TotalKnown::Unbounded,
            running: false,
        }
    }
}

impl PlaybackState {
    /// Fraction of a bounded source played so far
    pub fn progress(&self) -> Option<f64> {
        match self.total_known {
            TotalKnown::Bounded(0) => Some(1.0),
            TotalKnown::Bounded(n) => Some(self.cursor as f64 / n as f64),
            TotalKnown::Unbounded => None,
        }
    }
}

/// One field of the status panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldReading {
    pub name: String,
    pub label: String,
    pub unit: String,
    pub value: FieldValue,
}

/// The latest packet laid out field by field
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct FieldSnapshot {
    /// Sequence number of the packet shown, if any
    pub sequence: Option<u64>,
    /// Time since playback was first started
    pub mission_time: Duration,
    /// Wall-clock time this snapshot was taken
    pub received_at: Option<DateTime<Utc>>,
    /// Readings in channel-set order
    pub fields: Vec<FieldReading>,
}

impl FieldSnapshot {
    /// Look up a reading by channel name
    pub fn get(&self, name: &str) -> Option<&FieldReading> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Mission time as `HH:MM:SS`
    pub fn mission_time_label(&self) -> String {
        format_mission_time(self.mission_time)
    }
}

/// Format a duration as `HH:MM:SS`, dropping fractional seconds
pub fn format_mission_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
