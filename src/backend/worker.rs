//! Host worker loop
//!
//! Runs on the engine thread. It waits on two channels at once: commands
//! from the display and a fixed-interval ticker. Exactly one tick is in
//! flight at a time.
//!
//! # Rate Limiting
//!
//! Ticks come from [`crossbeam_channel::tick`], which holds at most one
//! pending tick. If a tick runs longer than the interval, the deadlines it
//! ran over are dropped rather than queued, and counted as overruns in the
//! engine stats.

use crate::backend::{EngineCommand, EngineMessage, SnapshotSlot};
use crate::engine::{PlaybackEngine, TickOutcome};
use crossbeam_channel::{select, tick, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The worker that drives the engine
pub struct HostWorker {
    engine: PlaybackEngine,
    /// Command receiver from the display
    command_rx: Receiver<EngineCommand>,
    /// Message sender to the display
    message_tx: Sender<EngineMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Fires once per tick interval
    ticker: Receiver<Instant>,
    /// Messages the display did not drain in time
    dropped_messages: u64,
}

impl HostWorker {
    /// Create a worker and route engine updates into the snapshot slot
    pub(crate) fn new(
        mut engine: PlaybackEngine,
        command_rx: Receiver<EngineCommand>,
        message_tx: Sender<EngineMessage>,
        snapshots: SnapshotSlot,
        running: Arc<AtomicBool>,
    ) -> Self {
        engine.subscribe(move |update| {
            if snapshots.publish(Arc::new(update.to_owned_snapshot())) {
                tracing::trace!("display behind, replaced unread snapshot");
            }
        });
        let ticker = tick(engine.tick_interval());

        Self {
            engine,
            command_rx,
            message_tx,
            running,
            ticker,
            dropped_messages: 0,
        }
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!(
            "Engine host started on {} (tick {:?})",
            self.engine.source_description(),
            self.engine.tick_interval()
        );

        while self.running.load(Ordering::SeqCst) {
            let commands = self.command_rx.clone();
            let ticker = self.ticker.clone();

            select! {
                recv(commands) -> cmd => match cmd {
                    Ok(cmd) => {
                        self.handle_command(cmd);
                        self.process_commands();
                    }
                    Err(_) => self.running.store(false, Ordering::SeqCst),
                },
                recv(ticker) -> _ => self.on_tick(),
            }
        }

        // Cleanup
        self.engine.close();

        let _ = self.message_tx.send(EngineMessage::Shutdown);
        if self.dropped_messages > 0 {
            tracing::warn!("{} host messages were dropped", self.dropped_messages);
        }
        tracing::info!("Engine host stopped");
    }

    /// Process pending commands from the display
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Start => {
                if let Err(e) = self.engine.start() {
                    tracing::error!("Failed to start playback: {}", e);
                    self.try_send_message(EngineMessage::StartFailed(e.to_string()));
                }
            }
            EngineCommand::Stop => {
                self.engine.stop();
            }
            EngineCommand::Reset => {
                if let Err(e) = self.engine.reset() {
                    tracing::error!("Failed to reopen source after reset: {}", e);
                    self.try_send_message(EngineMessage::StartFailed(e.to_string()));
                }
            }
            EngineCommand::Disconnect => {
                self.engine.close();
                tracing::info!("Disconnected from {}", self.engine.source_description());
            }
            EngineCommand::SetTickInterval(interval) => {
                self.engine.set_tick_interval(interval);
                self.ticker = tick(self.engine.tick_interval());
            }
            EngineCommand::RequestStats => {
                self.send_stats();
            }
            EngineCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Run one engine tick and forward lifecycle events
    fn on_tick(&mut self) {
        let started = Instant::now();
        let outcome = self.engine.tick();
        self.note_overrun(started.elapsed());

        match outcome {
            TickOutcome::Completed { .. } => self.try_send_message(EngineMessage::Completed),
            TickOutcome::SourceLost { reason, .. } => {
                self.try_send_message(EngineMessage::SourceError(reason))
            }
            TickOutcome::Idle | TickOutcome::Advanced { .. } => {}
        }
    }

    /// Count the tick deadlines a long tick ran over
    fn note_overrun(&mut self, elapsed: Duration) {
        let interval = self.engine.tick_interval();
        if elapsed <= interval {
            return;
        }
        let skipped = (elapsed.as_nanos() / interval.as_nanos().max(1)) as u64;
        tracing::debug!("tick took {:?}, skipping {} tick(s)", elapsed, skipped);
        self.engine.record_overruns(skipped);
    }

    /// Send statistics to the display
    fn send_stats(&mut self) {
        let stats = self.engine.stats().clone();
        self.try_send_message(EngineMessage::Stats(stats));
    }

    /// Try to send a message, counting it as dropped if the queue is full
    fn try_send_message(&mut self, msg: EngineMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.dropped_messages += 1;
        }
    }
}
