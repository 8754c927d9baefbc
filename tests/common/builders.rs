//! Test data builders for channel sets, configurations and CSV files

use cansat_gcs::config::{AppConfig, ChannelSpec, ReplayConfig, SourceConfig};
use std::io::Write;
use tempfile::NamedTempFile;

/// Builder for small channel sets
#[derive(Default)]
pub struct ChannelsBuilder {
    specs: Vec<ChannelSpec>,
}

impl ChannelsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plotted numeric channel
    pub fn plotted(mut self, name: &str, unit: &str) -> Self {
        self.specs.push(ChannelSpec::numeric(name, name, unit).plotted());
        self
    }

    /// Add an unplotted numeric channel
    pub fn numeric(mut self, name: &str) -> Self {
        self.specs.push(ChannelSpec::numeric(name, name, ""));
        self
    }

    /// Add a text status channel
    pub fn text(mut self, name: &str) -> Self {
        self.specs.push(ChannelSpec::text(name, name));
        self
    }

    pub fn build(self) -> Vec<ChannelSpec> {
        self.specs
    }
}

/// The two-channel set used by the playback scenarios
pub fn pressure_tilt() -> Vec<ChannelSpec> {
    ChannelsBuilder::new()
        .plotted("PRESSURE", "Pa")
        .plotted("TILT_X", "deg")
        .build()
}

/// Builder for CSV recordings on disk
pub struct CsvBuilder {
    header: Vec<String>,
    rows: Vec<String>,
}

impl CsvBuilder {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a raw row, written verbatim
    pub fn row(mut self, row: &str) -> Self {
        self.rows.push(row.to_string());
        self
    }

    pub fn rows(mut self, rows: &[&str]) -> Self {
        self.rows.extend(rows.iter().map(|r| r.to_string()));
        self
    }

    pub fn contents(&self) -> String {
        let mut out = self.header.join(",");
        out.push('\n');
        for row in &self.rows {
            out.push_str(row);
            out.push('\n');
        }
        out
    }

    /// Write to a temp file that lives as long as the returned handle
    pub fn write(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(self.contents().as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }
}

/// Replay configuration over `file` with the given channels
pub fn replay_config(file: &NamedTempFile, channels: Vec<ChannelSpec>) -> AppConfig {
    let mut config = AppConfig::default().with_channels(channels);
    config.source = SourceConfig::Replay(ReplayConfig {
        path: file.path().to_path_buf(),
        rows_per_tick: 1,
    });
    config.tick_interval_ms = 10;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_builder() {
        let csv = CsvBuilder::new(&["PRESSURE", "TILT_X"])
            .row("100,2")
            .row("101,");
        assert_eq!(csv.contents(), "PRESSURE,TILT_X\n100,2\n101,\n");
    }
}
