//! Live line source
//!
//! Follows an unbounded byte stream, one record per line. The stream is
//! obtained from a connector so the same framing serves a serial port, a
//! socket, or a scripted reader in tests.
//!
//! Every read on the underlying stream is bounded by its timeout. A
//! timeout surfaces as [`ReadOutcome::NoDataYet`] and any partial line is
//! kept for the next read. End of stream or any other I/O error means the
//! link is gone: the source drops it and reports `SourceUnavailable`.
//! Reconnecting is up to the caller.

use std::io::{ErrorKind, Read};

use super::{ReadOutcome, SourceInfo, TelemetrySource};
use crate::config::{SerialConfig, DEFAULT_MAX_LINES_PER_TICK};
use crate::error::{Result, TelemetryError};
use crate::types::{RawLine, TotalKnown};

/// Longest line accepted before the buffer is flushed as one (bad) line
pub const MAX_LINE_LEN: usize = 4096;

/// Size of a single read from the link
const READ_CHUNK: usize = 512;

/// An open byte stream
pub type Link = Box<dyn Read + Send>;

/// Opens a fresh [`Link`]
pub type Connector = Box<dyn FnMut() -> std::io::Result<Link> + Send>;

/// Unbounded, non-restartable newline-framed source
pub struct LiveLineSource {
    name: String,
    connector: Connector,
    link: Option<Link>,
    pending: Vec<u8>,
    line_no: u64,
    max_lines_per_tick: usize,
}

impl LiveLineSource {
    /// Source backed by an arbitrary connector
    pub fn from_connector(name: impl Into<String>, connector: Connector) -> Self {
        Self {
            name: name.into(),
            connector,
            link: None,
            pending: Vec::new(),
            line_no: 0,
            max_lines_per_tick: DEFAULT_MAX_LINES_PER_TICK,
        }
    }

    /// Source reading a serial port
    pub fn serial(config: &SerialConfig) -> Self {
        let port = config.port.clone();
        let baud_rate = config.baud_rate;
        let timeout = config.read_timeout();

        let connector: Connector = Box::new(move || {
            let link = serialport::new(port.as_str(), baud_rate)
                .timeout(timeout)
                .open()?;
            Ok(Box::new(link) as Link)
        });

        Self::from_connector(format!("{} @ {} baud", config.port, config.baud_rate), connector)
            .with_max_lines_per_tick(config.max_lines_per_tick)
    }

    pub fn with_max_lines_per_tick(mut self, max: usize) -> Self {
        self.max_lines_per_tick = max.max(1);
        self
    }

    /// Bytes received but not yet terminated by a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pop the next complete line from the buffer, without its terminator
    fn take_line(&mut self) -> Option<Vec<u8>> {
        if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Some(line);
        }

        if self.pending.len() > MAX_LINE_LEN {
            tracing::warn!(
                "{}: no line terminator in {} bytes, flushing",
                self.name,
                self.pending.len()
            );
            return Some(std::mem::take(&mut self.pending));
        }

        None
    }

    fn lost(&mut self, reason: String) -> TelemetryError {
        self.link = None;
        self.pending.clear();
        tracing::warn!("{}: link lost: {}", self.name, reason);
        TelemetryError::SourceUnavailable(format!("{}: {}", self.name, reason))
    }
}

impl TelemetrySource for LiveLineSource {
    fn open(&mut self) -> Result<SourceInfo> {
        if self.link.is_none() {
            let link = (self.connector)()
                .map_err(|e| TelemetryError::source_open(self.name.clone(), e))?;
            self.link = Some(link);
            self.pending.clear();
            tracing::info!("Connected to {}", self.name);
        }

        Ok(SourceInfo {
            total_known: TotalKnown::Unbounded,
            columns: None,
        })
    }

    fn read_next(&mut self) -> Result<ReadOutcome> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.take_line() {
                self.line_no += 1;
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return Ok(ReadOutcome::Line(RawLine::line(self.line_no, line)));
            }

            let Some(link) = self.link.as_mut() else {
                return Err(TelemetryError::SourceUnavailable(format!(
                    "{} is not connected",
                    self.name
                )));
            };

            match link.read(&mut chunk) {
                Ok(0) => return Err(self.lost("stream closed".to_string())),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(ReadOutcome::NoDataYet)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.lost(e.to_string())),
            }
        }
    }

    fn close(&mut self) {
        if self.link.take().is_some() {
            tracing::info!("Disconnected from {}", self.name);
        }
        self.pending.clear();
    }

    fn is_open(&self) -> bool {
        self.link.is_some()
    }

    fn is_restartable(&self) -> bool {
        false
    }

    fn units_per_tick(&self) -> usize {
        self.max_lines_per_tick
    }

    fn describe(&self) -> String {
        format!("live {}", self.name)
    }
}

/// Names of the serial ports present on this machine
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(std::io::Error::from)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
