//! Scripted sources and links

use cansat_gcs::error::{Result, TelemetryError};
use cansat_gcs::source::live::{Connector, Link};
use cansat_gcs::source::{ReadOutcome, SourceInfo, TelemetrySource};
use cansat_gcs::types::{RawLine, TotalKnown};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::sync::{Arc, Mutex};

/// One scripted read result
#[derive(Debug, Clone)]
pub enum Step {
    Line(&'static str),
    NoData,
    End,
    Lost(&'static str),
}

/// Live-like source replaying a fixed script, one step per read
///
/// Reads past the end of the script return `NoDataYet`. Opens are counted
/// so tests can check reconnect behavior.
#[derive(Clone)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Step>>>,
    opens: Arc<Mutex<usize>>,
    open: bool,
    line_no: u64,
    per_tick: usize,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into())),
            opens: Arc::new(Mutex::new(0)),
            open: false,
            line_no: 0,
            per_tick: 64,
        }
    }

    pub fn with_per_tick(mut self, per_tick: usize) -> Self {
        self.per_tick = per_tick;
        self
    }

    /// Queue more steps, visible through every clone
    pub fn push(&self, steps: Vec<Step>) {
        self.script.lock().unwrap().extend(steps);
    }

    pub fn open_count(&self) -> usize {
        *self.opens.lock().unwrap()
    }
}

impl TelemetrySource for ScriptedSource {
    fn open(&mut self) -> Result<SourceInfo> {
        *self.opens.lock().unwrap() += 1;
        self.open = true;
        Ok(SourceInfo {
            total_known: TotalKnown::Unbounded,
            columns: None,
        })
    }

    fn read_next(&mut self) -> Result<ReadOutcome> {
        if !self.open {
            return Err(TelemetryError::SourceUnavailable("not connected".to_string()));
        }
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Line(text)) => {
                self.line_no += 1;
                Ok(ReadOutcome::Line(RawLine::line(self.line_no, text)))
            }
            Some(Step::NoData) | None => Ok(ReadOutcome::NoDataYet),
            Some(Step::End) => Ok(ReadOutcome::EndOfStream),
            Some(Step::Lost(reason)) => {
                self.open = false;
                Err(TelemetryError::SourceUnavailable(reason.to_string()))
            }
        }
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
        self.per_tick
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Byte stream fed from a channel; an empty channel reads as a timeout
pub struct ChannelLink {
    rx: Receiver<io::Result<Vec<u8>>>,
}

impl Read for ChannelLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.rx.try_recv() {
            Ok(Ok(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Ok(Err(e)) => Err(e),
            Err(crossbeam_channel::TryRecvError::Empty) => {
                Err(io::Error::new(ErrorKind::TimedOut, "no data"))
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => Ok(0),
        }
    }
}

/// Connector handing out one [`ChannelLink`]; the sender feeds it bytes
pub fn channel_connector() -> (Connector, Sender<io::Result<Vec<u8>>>) {
    let (tx, rx) = bounded(1024);
    let mut rx = Some(rx);
    let connector: Connector = Box::new(move || match rx.take() {
        Some(rx) => Ok(Box::new(ChannelLink { rx }) as Link),
        None => Err(io::Error::new(ErrorKind::NotFound, "port gone")),
    });
    (connector, tx)
}
