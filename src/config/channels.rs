//! Channel definitions
//!
//! The channel set is the fixed table of telemetry fields the engine knows
//! about. It is built once from configuration and never extended at
//! runtime: CSV headers and live lines are matched against it, and the
//! projector only ever produces series for channels marked `plot`.
//!
//! Names are matched exactly (after trimming whitespace). A CSV header
//! spelled `Pressure` does not match a channel named `PRESSURE`; that is a
//! configuration error rather than something to guess around.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, TelemetryError};

/// How a field's text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Decimal number; unparsable text becomes absent
    #[default]
    Numeric,
    /// Passed through as a string (mode, state letters, echoes)
    Text,
}

/// One telemetry field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Column / wire name, e.g. `PRESSURE`
    pub name: String,

    /// Status panel label; defaults to the name
    #[serde(default)]
    pub label: String,

    /// Display unit, e.g. `Pa`
    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub kind: ChannelKind,

    /// Whether this channel is projected into a plotted series
    #[serde(default)]
    pub plot: bool,

    /// Reject the whole record when this field is missing or malformed
    #[serde(default)]
    pub required: bool,
}

impl ChannelSpec {
    /// Numeric channel
    pub fn numeric(name: impl Into<String>, label: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            unit: unit.into(),
            kind: ChannelKind::Numeric,
            plot: false,
            required: false,
        }
    }

    /// Text status channel
    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            unit: String::new(),
            kind: ChannelKind::Text,
            plot: false,
            required: false,
        }
    }

    /// Mark as plotted
    pub fn plotted(mut self) -> Self {
        self.plot = true;
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Label to show, falling back to the name
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// Validated, ordered channel table
#[derive(Debug, Clone)]
pub struct ChannelSet {
    specs: Vec<ChannelSpec>,
    index: HashMap<String, usize>,
}

impl ChannelSet {
    /// Build and validate a channel set
    pub fn new(specs: Vec<ChannelSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(TelemetryError::Config("channel set is empty".to_string()));
        }

        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            let name = spec.name.trim();
            if name.is_empty() {
                return Err(TelemetryError::Config(format!(
                    "channel {} has an empty name",
                    i
                )));
            }
            if spec.plot && spec.kind == ChannelKind::Text {
                return Err(TelemetryError::Config(format!(
                    "text channel {} cannot be plotted",
                    name
                )));
            }
            if index.insert(name.to_string(), i).is_some() {
                return Err(TelemetryError::Config(format!(
                    "duplicate channel name {}",
                    name
                )));
            }
        }

        Ok(Self { specs, index })
    }

    /// Position of a channel by exact (trimmed) name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name.trim()).copied()
    }

    pub fn get(&self, index: usize) -> Option<&ChannelSpec> {
        self.specs.get(index)
    }

    pub fn specs(&self) -> &[ChannelSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Channels projected into series, with their positions
    pub fn plotted(&self) -> impl Iterator<Item = (usize, &ChannelSpec)> {
        self.specs.iter().enumerate().filter(|(_, s)| s.plot)
    }

    /// Channel names in wire order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }
}

/// The CanSat 2024 telemetry packet, in wire order
pub fn cansat_channels() -> Vec<ChannelSpec> {
    vec![
        ChannelSpec::text("TEAM_ID", "Team ID"),
        ChannelSpec::text("MISSION_TIME", "Mission Time"),
        ChannelSpec::numeric("PACKET_COUNT", "Packet Count", ""),
        ChannelSpec::text("MODE", "Mode"),
        ChannelSpec::text("STATE", "State"),
        ChannelSpec::numeric("ALTITUDE", "Altitude", "m").plotted(),
        ChannelSpec::numeric("AIR_SPEED", "Air Speed", "m/s").plotted(),
        ChannelSpec::text("HS_DEPLOYED", "Heatshield deployed"),
        ChannelSpec::text("PC_DEPLOYED", "Parachute deployed"),
        ChannelSpec::numeric("TEMPERATURE", "Temperature", "°C").plotted(),
        ChannelSpec::numeric("VOLTAGE", "Voltage", "V"),
        ChannelSpec::numeric("PRESSURE", "Pressure", "Pa").plotted(),
        ChannelSpec::text("GPS_TIME", "GPS Time"),
        ChannelSpec::numeric("GPS_ALTITUDE", "GPS Altitude", "m"),
        ChannelSpec::numeric("GPS_LATITUDE", "GPS Latitude", "deg"),
        ChannelSpec::numeric("GPS_LONGITUDE", "GPS Longitude", "deg"),
        ChannelSpec::numeric("GPS_SATS", "GPS Sats", ""),
        ChannelSpec::numeric("TILT_X", "Tilt X", "deg").plotted(),
        ChannelSpec::numeric("TILT_Y", "Tilt Y", "deg").plotted(),
        ChannelSpec::numeric("ROT_Z", "Rotation Z", "deg/s"),
        ChannelSpec::text("CMD_ECHO", "CMD Echo"),
    ]
}
