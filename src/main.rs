//! CanSat Ground Station - Main Entry Point
//!
//! Headless host for the telemetry engine. Plays a CSV recording or
//! follows a serial port and prints what a display would show: one line
//! per tick with the cursor and the latest plotted values, or one JSON
//! object per tick with `--json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use cansat_gcs::{
    backend::{EngineHost, EngineMessage, HostHandle},
    config::{self, AppConfig, ReplayConfig, SerialConfig, SourceConfig},
    engine::{OwnedSnapshot, PlaybackEngine},
    source::list_ports,
    types::TotalKnown,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// CanSat telemetry replay and live follow
#[derive(Parser, Debug)]
#[command(name = "cansat-gcs", version, about)]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay a CSV recording
    #[arg(long, conflicts_with = "port")]
    csv: Option<PathBuf>,

    /// Follow a serial port
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// CSV rows consumed per tick
    #[arg(long)]
    rows_per_tick: Option<usize>,

    /// Run the built-in simulator instead of a real source
    #[cfg(feature = "simulator")]
    #[arg(long, conflicts_with_all = ["csv", "port"])]
    simulate: bool,

    /// Print snapshots as JSON lines
    #[arg(long)]
    json: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = init_logging(cli.log_dir.as_ref());

    if cli.list_ports {
        let ports = list_ports().context("Failed to enumerate serial ports")?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(());
    }

    let config = build_config(&cli)?;
    if let Some(path) = &cli.save_config {
        config.save(path).context("Failed to save configuration")?;
        tracing::info!("Configuration written to {}", path.display());
        return Ok(());
    }

    tracing::info!("Starting CanSat ground station ({})", config.source);

    let engine = PlaybackEngine::from_config(&config).context("Invalid configuration")?;
    let (host, handle) = EngineHost::new(engine);
    let host_thread = host.spawn().context("Failed to spawn engine thread")?;

    handle.start();
    let result = display_loop(&handle, cli.json, config.tick_interval());

    tracing::info!("Shutting down...");
    handle.shutdown();
    if host_thread.join().is_err() {
        tracing::error!("Engine thread panicked");
    }

    result
}

/// Console logging plus an optional daily log file
fn init_logging(log_dir: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cansat_gcs=debug"));
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "cansat-gcs.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            None
        }
    }
}

/// Load the configuration file, then apply command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => match config::default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Using configuration from {}", path.display());
                AppConfig::load_or_default(&path)
            }
            _ => AppConfig::default(),
        },
    };

    if let Some(path) = &cli.csv {
        config.source = SourceConfig::Replay(ReplayConfig {
            path: path.clone(),
            ..Default::default()
        });
    }
    if let Some(port) = &cli.port {
        let baud = match &config.source {
            SourceConfig::Live(serial) => serial.baud_rate,
            _ => config::DEFAULT_BAUD_RATE,
        };
        config.source = SourceConfig::Live(SerialConfig::new(port.clone(), baud));
    }
    #[cfg(feature = "simulator")]
    if cli.simulate {
        config.source = SourceConfig::Simulator(Default::default());
    }

    if let Some(baud) = cli.baud {
        match &mut config.source {
            SourceConfig::Live(serial) => serial.baud_rate = baud,
            _ => bail!("--baud only applies to a serial source"),
        }
    }
    if let Some(rows) = cli.rows_per_tick {
        match &mut config.source {
            SourceConfig::Replay(replay) => replay.rows_per_tick = rows,
            _ => bail!("--rows-per-tick only applies to a CSV source"),
        }
    }
    if let Some(ms) = cli.tick_ms {
        config.tick_interval_ms = ms;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Print snapshots until playback ends or the source fails
fn display_loop(handle: &HostHandle, json: bool, tick: Duration) -> anyhow::Result<()> {
    // Generous wait so a slow source does not look like a hang
    let wait = tick.max(Duration::from_millis(100)) * 4;

    loop {
        if let Some(snapshot) = handle.wait_snapshot(wait) {
            render(&snapshot, json)?;
        }

        for msg in handle.drain() {
            match msg {
                EngineMessage::Completed => {
                    // Show the final frame before leaving
                    if let Some(snapshot) = handle.latest_snapshot() {
                        render(&snapshot, json)?;
                    }
                    handle.request_stats();
                    if let Some(EngineMessage::Stats(stats)) = handle.recv_timeout(wait) {
                        tracing::info!(
                            "Playback complete: {} records, {} parse errors ({:.1}%)",
                            stats.records_appended,
                            stats.parse_errors,
                            stats.error_rate() * 100.0
                        );
                    }
                    return Ok(());
                }
                EngineMessage::SourceError(reason) => {
                    tracing::error!("Telemetry source lost: {}", reason);
                    return Ok(());
                }
                EngineMessage::StartFailed(reason) => {
                    bail!("Cannot start playback: {}", reason);
                }
                EngineMessage::Stats(_) => {}
                EngineMessage::Shutdown => return Ok(()),
            }
        }
    }
}

/// The console stand-in for plots and the field panel
fn render(snapshot: &OwnedSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    let progress = match snapshot.state.total_known {
        TotalKnown::Bounded(total) => format!("{}/{}", snapshot.state.cursor, total),
        TotalKnown::Unbounded => snapshot.state.cursor.to_string(),
    };
    println!(
        "[{}] {} {}",
        snapshot.fields.mission_time_label(),
        progress,
        plotted_values(snapshot).join("  ")
    );
    for error in &snapshot.errors {
        println!("  ! {}", error);
    }
    Ok(())
}

/// Latest packet's value for each plotted channel; `-` where it was absent
fn plotted_values(snapshot: &OwnedSnapshot) -> Vec<String> {
    snapshot
        .projection
        .iter()
        .map(|series| {
            match snapshot
                .fields
                .get(&series.name)
                .and_then(|reading| reading.value.as_number())
            {
                Some(y) => format!("{}={} {}", series.name, y, series.unit),
                None => format!("{}=-", series.name),
            }
        })
        .collect()
}
