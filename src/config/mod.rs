//! Configuration module
//!
//! This module handles engine configuration:
//! - The channel set (ordered names, labels, units, kinds)
//! - Tick interval
//! - Source selection and its connection parameters
//! - X axis used for projected series
//!
//! # Files
//!
//! Configuration is read from TOML (`.toml`) or JSON (`.json`). Without an
//! explicit path the binary looks for `config.toml` in the platform data
//! directory under `dev.cansat.gcs`:
//!
//! - **Linux**: `~/.local/share/dev.cansat.gcs/`
//! - **macOS**: `~/Library/Application Support/dev.cansat.gcs/`
//! - **Windows**: `%APPDATA%\dev.cansat.gcs\`
//!
//! # Example
//!
//! ```toml
//! tick_interval_ms = 1000
//! x_axis = "index"
//!
//! [source]
//! kind = "live"
//! port = "/dev/ttyACM0"
//! baud_rate = 9600
//! read_timeout_ms = 100
//!
//! [[channels]]
//! name = "PRESSURE"
//! label = "Pressure"
//! unit = "Pa"
//! plot = true
//! ```

pub mod channels;

pub use channels::{cansat_channels, ChannelKind, ChannelSet, ChannelSpec};

use crate::error::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.cansat.gcs";

/// Default config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default tick interval in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default bound on a single live read in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Default cap on lines drained from a live source in one tick
pub const DEFAULT_MAX_LINES_PER_TICK: usize = 256;

/// Default replay file name
pub const DEFAULT_REPLAY_FILE: &str = "sensor_data.csv";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Source Config ====================

/// CSV replay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Path to the CSV file
    pub path: PathBuf,

    /// Rows consumed per tick
    #[serde(default = "default_rows_per_tick")]
    pub rows_per_tick: usize,
}

fn default_rows_per_tick() -> usize {
    1
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_REPLAY_FILE),
            rows_per_tick: 1,
        }
    }
}

/// Live serial settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name, e.g. `/dev/ttyACM0` or `COM3`
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on one blocking read
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Maximum lines drained per tick
    #[serde(default = "default_max_lines_per_tick")]
    pub max_lines_per_tick: usize,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_max_lines_per_tick() -> usize {
    DEFAULT_MAX_LINES_PER_TICK
}

impl SerialConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_lines_per_tick: DEFAULT_MAX_LINES_PER_TICK,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Synthetic source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Packets produced per tick
    #[serde(default = "default_rows_per_tick")]
    pub packets_per_tick: usize,

    /// Team identifier written into each packet
    #[serde(default = "default_team_id")]
    pub team_id: String,
}

fn default_team_id() -> String {
    "2044".to_string()
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            packets_per_tick: 1,
            team_id: default_team_id(),
        }
    }
}

/// Which source feeds the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Bounded, restartable CSV file
    Replay(ReplayConfig),
    /// Unbounded serial line stream
    Live(SerialConfig),
    /// Generated packets (requires the `simulator` feature)
    Simulator(SimulatorConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Replay(ReplayConfig::default())
    }
}

impl std::fmt::Display for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceConfig::Replay(c) => write!(f, "replay {}", c.path.display()),
            SourceConfig::Live(c) => write!(f, "live {} @ {} baud", c.port, c.baud_rate),
            SourceConfig::Simulator(_) => write!(f, "simulator"),
        }
    }
}

// ==================== X Axis ====================

/// What the x coordinate of projected points is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum XAxis {
    /// Buffer position (packet index)
    #[default]
    Index,
    /// Value of a numeric field, e.g. a time column
    Field(String),
}

// ==================== App Config ====================

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interval between ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default)]
    pub x_axis: XAxis,

    #[serde(default)]
    pub source: SourceConfig,

    /// Ordered channel set
    #[serde(default = "cansat_channels")]
    pub channels: Vec<ChannelSpec>,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            x_axis: XAxis::Index,
            source: SourceConfig::default(),
            channels: cansat_channels(),
        }
    }
}

impl AppConfig {
    /// Default configuration reading a CSV file
    pub fn replay(path: impl Into<PathBuf>) -> Self {
        Self {
            source: SourceConfig::Replay(ReplayConfig {
                path: path.into(),
                rows_per_tick: 1,
            }),
            ..Default::default()
        }
    }

    /// Default configuration following a serial port
    pub fn live(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            source: SourceConfig::Live(SerialConfig::new(port, baud_rate)),
            ..Default::default()
        }
    }

    /// Replace the channel set
    pub fn with_channels(mut self, channels: Vec<ChannelSpec>) -> Self {
        self.channels = channels;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Build the validated channel table, checking the x axis against it
    pub fn channel_set(&self) -> Result<ChannelSet> {
        let set = ChannelSet::new(self.channels.clone())?;
        if let XAxis::Field(name) = &self.x_axis {
            match set.index_of(name).and_then(|i| set.get(i)) {
                Some(spec) if spec.kind == ChannelKind::Numeric => {}
                Some(_) => {
                    return Err(TelemetryError::Config(format!(
                        "x axis field {} is not numeric",
                        name
                    )))
                }
                None => {
                    return Err(TelemetryError::Config(format!(
                        "x axis field {} is not in the channel set",
                        name
                    )))
                }
            }
        }
        Ok(set)
    }

    /// Check everything that can be checked without opening the source
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(TelemetryError::Config(
                "tick interval must be at least 1 ms".to_string(),
            ));
        }
        match &self.source {
            SourceConfig::Replay(c) if c.rows_per_tick == 0 => {
                return Err(TelemetryError::Config(
                    "rows_per_tick must be at least 1".to_string(),
                ))
            }
            SourceConfig::Live(c) if c.max_lines_per_tick == 0 => {
                return Err(TelemetryError::Config(
                    "max_lines_per_tick must be at least 1".to_string(),
                ))
            }
            SourceConfig::Simulator(c) if c.packets_per_tick == 0 => {
                return Err(TelemetryError::Config(
                    "packets_per_tick must be at least 1".to_string(),
                ))
            }
            SourceConfig::Live(c) if c.port.trim().is_empty() => {
                return Err(TelemetryError::Config("serial port name is empty".to_string()))
            }
            _ => {}
        }
        self.channel_set().map(|_| ())
    }

    /// Load a config file (TOML or JSON by extension)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TelemetryError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                TelemetryError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                TelemetryError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to disk (TOML or JSON by extension)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TelemetryError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| TelemetryError::Serialization(e.to_string()))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| TelemetryError::Serialization(e.to_string()))?
        };

        std::fs::write(path, content).map_err(|e| {
            TelemetryError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_millis(1000));
        assert!(matches!(config.source, SourceConfig::Replay(_)));
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gcs.toml");

        let mut config = AppConfig::live("/dev/ttyACM0", 115_200);
        config.tick_interval_ms = 250;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [source]
            kind = "live"
            port = "COM3"
            "#,
        )
        .unwrap();

        assert_eq!(config.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert_eq!(config.channels.len(), 21);
        match config.source {
            SourceConfig::Live(serial) => {
                assert_eq!(serial.baud_rate, DEFAULT_BAUD_RATE);
                assert_eq!(serial.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_x_axis_field_parses() {
        let config: AppConfig = toml::from_str(
            r#"
            x_axis = { field = "TIME" }

            [[channels]]
            name = "TIME"
            unit = "s"

            [[channels]]
            name = "PRESSURE"
            plot = true
            "#,
        )
        .unwrap();

        assert_eq!(config.x_axis, XAxis::Field("TIME".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_x_axis_must_be_numeric_channel() {
        let mut config = AppConfig::default();
        config.x_axis = XAxis::Field("MODE".to_string());
        assert!(config.validate().is_err());

        config.x_axis = XAxis::Field("NOPE".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut config = AppConfig::default();
        config.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gcs.json");
        let config = AppConfig::replay("flight.csv");
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"kind\": \"replay\""));
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("missing.toml"));
        assert_eq!(config, AppConfig::default());
    }
}
