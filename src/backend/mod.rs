//! Threaded host for the playback engine
//!
//! Runs a [`PlaybackEngine`] on its own thread so a display can stay
//! responsive. All mutation of the buffer and playback state happens on
//! that thread; the display only ever sees immutable snapshots.
//!
//! # Architecture
//!
//! - [`EngineCommand`] - Messages sent from the display to the host (start, stop, reset, ...)
//! - [`EngineMessage`] - Messages sent from the host to the display (completion, errors, stats)
//! - [`HostHandle`] - Display-side handle for sending commands and receiving updates
//! - [`EngineHost`] - Host entry point that owns the engine until it runs
//!
//! Snapshots do not go through the message queue. They use a one-slot
//! channel where a newer snapshot replaces an unread one, so a slow display
//! never builds a backlog. Lifecycle messages use a separate bounded queue
//! and are never replaced.
//!
//! # Example
//!
//! ```ignore
//! use cansat_gcs::backend::{EngineHost, EngineMessage};
//! use cansat_gcs::config::AppConfig;
//! use cansat_gcs::engine::PlaybackEngine;
//!
//! let engine = PlaybackEngine::from_config(&AppConfig::replay("flight.csv"))?;
//! let (host, handle) = EngineHost::new(engine);
//! let thread = host.spawn()?;
//!
//! handle.start();
//! loop {
//!     if let Some(snapshot) = handle.latest_snapshot() {
//!         // redraw plots and the field panel
//!     }
//!     for msg in handle.drain() {
//!         if let EngineMessage::Completed = msg {
//!             handle.shutdown();
//!         }
//!     }
//! }
//! ```

pub mod worker;

pub use worker::HostWorker;

use crate::engine::{OwnedSnapshot, PlaybackEngine, PlaybackStats};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Message sent from the display to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Start or resume playback, opening the source if needed
    Start,
    /// Stop playback at the next tick boundary
    Stop,
    /// Clear the buffer and rewind (replay) or keep following (live)
    Reset,
    /// Stop and release the source
    Disconnect,
    /// Change the tick interval
    SetTickInterval(Duration),
    /// Request current statistics
    RequestStats,
    /// Shutdown the host
    Shutdown,
}

/// Message sent from the host to the display
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Bounded source played to the end
    Completed,
    /// Source lost mid-stream; playback stopped
    SourceError(String),
    /// Source could not be opened (start or reset)
    StartFailed(String),
    /// Statistics update
    Stats(PlaybackStats),
    /// Host is shutting down
    Shutdown,
}

/// One-slot snapshot channel where the newest snapshot wins
#[derive(Clone)]
pub(crate) struct SnapshotSlot {
    sender: Sender<Arc<OwnedSnapshot>>,
    /// Producer-side receiver used to evict an unread snapshot
    evict: Receiver<Arc<OwnedSnapshot>>,
}

impl SnapshotSlot {
    fn new() -> (Self, Receiver<Arc<OwnedSnapshot>>) {
        let (sender, receiver) = bounded(1);
        let slot = Self {
            sender,
            evict: receiver.clone(),
        };
        (slot, receiver)
    }

    /// Publish a snapshot, replacing any unread one; returns whether one was replaced
    pub(crate) fn publish(&self, snapshot: Arc<OwnedSnapshot>) -> bool {
        match self.sender.try_send(snapshot) {
            Ok(()) => false,
            Err(TrySendError::Full(snapshot)) => {
                let replaced = self.evict.try_recv().is_ok();
                let _ = self.sender.try_send(snapshot);
                replaced
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Display-side handle for the host
pub struct HostHandle {
    /// Receiver for lifecycle messages
    pub receiver: Receiver<EngineMessage>,
    /// Receiver for the latest snapshot
    pub snapshots: Receiver<Arc<OwnedSnapshot>>,
    /// Sender for commands to the host
    pub command_sender: Sender<EngineCommand>,
}

impl HostHandle {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<EngineMessage> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for a message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineMessage> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<EngineMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Take the pending snapshot, if one arrived since the last call
    pub fn latest_snapshot(&self) -> Option<Arc<OwnedSnapshot>> {
        self.snapshots.try_recv().ok()
    }

    /// Wait up to `timeout` for a snapshot
    pub fn wait_snapshot(&self, timeout: Duration) -> Option<Arc<OwnedSnapshot>> {
        self.snapshots.recv_timeout(timeout).ok()
    }

    /// Send a command to the host
    pub fn send_command(&self, cmd: EngineCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    pub fn start(&self) {
        let _ = self.command_sender.send(EngineCommand::Start);
    }

    pub fn stop(&self) {
        let _ = self.command_sender.send(EngineCommand::Stop);
    }

    pub fn reset(&self) {
        let _ = self.command_sender.send(EngineCommand::Reset);
    }

    pub fn disconnect(&self) {
        let _ = self.command_sender.send(EngineCommand::Disconnect);
    }

    pub fn set_tick_interval(&self, interval: Duration) {
        let _ = self
            .command_sender
            .send(EngineCommand::SetTickInterval(interval));
    }

    pub fn request_stats(&self) {
        let _ = self.command_sender.send(EngineCommand::RequestStats);
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(EngineCommand::Shutdown);
    }
}

/// Owns the engine and the host side of the channels until it runs
pub struct EngineHost {
    engine: PlaybackEngine,
    /// Receiver for commands from the display
    command_receiver: Receiver<EngineCommand>,
    /// Sender for messages to the display
    message_sender: Sender<EngineMessage>,
    snapshots: SnapshotSlot,
    /// Running flag
    running: Arc<AtomicBool>,
}

impl EngineHost {
    /// Wrap an engine with communication channels
    pub fn new(engine: PlaybackEngine) -> (Self, HostHandle) {
        let (cmd_tx, cmd_rx) = bounded(256);
        let (msg_tx, msg_rx) = bounded(256);
        let (snapshots, snapshot_rx) = SnapshotSlot::new();

        let host = Self {
            engine,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            snapshots,
            running: Arc::new(AtomicBool::new(true)),
        };

        let handle = HostHandle {
            receiver: msg_rx,
            snapshots: snapshot_rx,
            command_sender: cmd_tx,
        };

        (host, handle)
    }

    /// Run the host loop on the current thread
    pub fn run(self) {
        let mut worker = HostWorker::new(
            self.engine,
            self.command_receiver,
            self.message_sender,
            self.snapshots,
            self.running,
        );
        worker.run();
    }

    /// Run the host loop on a named thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("telemetry-engine".to_string())
            .spawn(move || self.run())
    }

    /// Get a handle to stop the host
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
