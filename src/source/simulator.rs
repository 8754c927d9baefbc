//! Simulated telemetry source
//!
//! Produces live-protocol lines for the configured channel set without
//! any hardware attached. Each packet advances simulated mission time by
//! one second; numeric channels follow a waveform chosen by name and text
//! channels get plausible status values.
//!
//! After `packets_per_tick` packets the source reports
//! [`ReadOutcome::NoDataYet`], so the scheduler sees the same batching it
//! would from a real radio.
//!
//! Only available with the `simulator` feature:
//!
//! ```bash
//! cargo run --features simulator -- --simulate
//! ```

use super::{ReadOutcome, SourceInfo, TelemetrySource};
use crate::config::{ChannelKind, ChannelSet, SimulatorConfig};
use crate::error::{Result, TelemetryError};
use crate::types::{format_mission_time, RawLine, TotalKnown};

/// Waveform for a simulated numeric channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalPattern {
    /// Constant value
    Constant(f64),
    /// Sine wave with frequency (Hz) and amplitude around an offset
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Counter that increments by `step` per packet
    Counter { step: f64 },
    /// Linear ramp that resets every period
    Sawtooth { period: f64, amplitude: f64 },
    /// Alternates between +amplitude and -amplitude
    Square { period: f64, amplitude: f64 },
    /// Rises from 0 to amplitude and back over one period
    Triangle { period: f64, amplitude: f64 },
}

impl SignalPattern {
    /// Value at a given mission time in seconds
    pub fn value_at(&self, t: f64) -> f64 {
        match *self {
            SignalPattern::Constant(v) => v,
            SignalPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin(),
            SignalPattern::Counter { step } => step * t,
            SignalPattern::Sawtooth { period, amplitude } => amplitude * ((t % period) / period),
            SignalPattern::Square { period, amplitude } => {
                if t % period < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            SignalPattern::Triangle { period, amplitude } => {
                let phase = (t % period) / period;
                amplitude * (1.0 - (2.0 * phase - 1.0).abs())
            }
        }
    }

    /// Pattern used for a channel name
    pub fn for_channel(name: &str) -> Self {
        match name {
            "PACKET_COUNT" => SignalPattern::Counter { step: 1.0 },
            "ALTITUDE" | "GPS_ALTITUDE" => SignalPattern::Triangle {
                period: FLIGHT_PERIOD_S,
                amplitude: 725.0,
            },
            "PRESSURE" => SignalPattern::Sine {
                frequency: 1.0 / (2.0 * FLIGHT_PERIOD_S),
                amplitude: -8_000.0,
                offset: 101_325.0,
            },
            "TEMPERATURE" => SignalPattern::Sine {
                frequency: 1.0 / FLIGHT_PERIOD_S,
                amplitude: 4.0,
                offset: 21.0,
            },
            "AIR_SPEED" => SignalPattern::Sawtooth {
                period: 30.0,
                amplitude: 18.0,
            },
            "VOLTAGE" => SignalPattern::Constant(5.0),
            "GPS_SATS" => SignalPattern::Constant(9.0),
            "GPS_LATITUDE" => SignalPattern::Constant(37.1962),
            "GPS_LONGITUDE" => SignalPattern::Constant(-80.5786),
            "TILT_X" | "TILT_Y" => SignalPattern::Sine {
                frequency: 0.2,
                amplitude: 12.0,
                offset: 0.0,
            },
            "ROT_Z" => SignalPattern::Square {
                period: 10.0,
                amplitude: 90.0,
            },
            _ => SignalPattern::Sine {
                frequency: 0.1,
                amplitude: 1.0,
                offset: 0.0,
            },
        }
    }
}

/// Length of one simulated ascent/descent cycle in seconds
const FLIGHT_PERIOD_S: f64 = 240.0;

/// Unbounded source generating packets for a channel set
pub struct SimulatedSource {
    channels: ChannelSet,
    patterns: Vec<SignalPattern>,
    team_id: String,
    packets_per_tick: usize,
    emitted_in_batch: usize,
    packet: u64,
    open: bool,
}

impl SimulatedSource {
    pub fn new(channels: ChannelSet, config: &SimulatorConfig) -> Self {
        let patterns = channels
            .specs()
            .iter()
            .map(|spec| SignalPattern::for_channel(&spec.name))
            .collect();
        Self {
            channels,
            patterns,
            team_id: config.team_id.clone(),
            packets_per_tick: config.packets_per_tick.max(1),
            emitted_in_batch: 0,
            packet: 0,
            open: false,
        }
    }

    /// Override the waveform of a channel
    pub fn with_pattern(mut self, name: &str, pattern: SignalPattern) -> Self {
        if let Some(index) = self.channels.index_of(name) {
            self.patterns[index] = pattern;
        }
        self
    }

    fn text_value(&self, name: &str, t: f64) -> String {
        let descending = t % FLIGHT_PERIOD_S >= FLIGHT_PERIOD_S / 2.0;
        match name {
            "TEAM_ID" => self.team_id.clone(),
            "MISSION_TIME" | "GPS_TIME" => {
                format_mission_time(std::time::Duration::from_secs(t as u64))
            }
            "MODE" => "F".to_string(),
            "STATE" => (if descending { "DESCENT" } else { "ASCENT" }).to_string(),
            "HS_DEPLOYED" | "PC_DEPLOYED" => (if descending { "P" } else { "N" }).to_string(),
            "CMD_ECHO" => "CXON".to_string(),
            _ => String::new(),
        }
    }

    fn next_line(&mut self) -> RawLine {
        let t = self.packet as f64;
        let fields: Vec<String> = self
            .channels
            .specs()
            .iter()
            .zip(&self.patterns)
            .map(|(spec, pattern)| match spec.kind {
                ChannelKind::Numeric => format!("{:.2}", pattern.value_at(t)),
                ChannelKind::Text => self.text_value(&spec.name, t),
            })
            .collect();
        self.packet += 1;
        RawLine::line(self.packet, fields.join(","))
    }
}

impl TelemetrySource for SimulatedSource {
    fn open(&mut self) -> Result<SourceInfo> {
        self.open = true;
        self.emitted_in_batch = 0;
        tracing::info!("Simulator started at packet {}", self.packet);
        Ok(SourceInfo {
            total_known: TotalKnown::Unbounded,
            columns: None,
        })
    }

    fn read_next(&mut self) -> Result<ReadOutcome> {
        if !self.open {
            return Err(TelemetryError::SourceUnavailable(
                "simulator is not running".to_string(),
            ));
        }
        if self.emitted_in_batch >= self.packets_per_tick {
            self.emitted_in_batch = 0;
            return Ok(ReadOutcome::NoDataYet);
        }
        self.emitted_in_batch += 1;
        Ok(ReadOutcome::Line(self.next_line()))
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_restartable(&self) -> bool {
        false
    }

    fn units_per_tick(&self) -> usize {
        self.packets_per_tick + 1
    }

    fn describe(&self) -> String {
        "simulator".to_string()
    }
}
