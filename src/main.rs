//! headband-eeg command line.
//!
//! ```bash
//! # List headbands in range
//! headband-eeg scan
//!
//! # Record 60 s from the first Muse found
//! headband-eeg record --device muse
//!
//! # Record from a Neurosity bridge into ./sessions, labelled "baseline"
//! headband-eeg record --device neurosity --bridge 127.0.0.1:9000 --out sessions --phase baseline
//!
//! # No hardware
//! headband-eeg record --device synthetic --duration 5
//! ```

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use headband_eeg::config::Config;
use headband_eeg::connection::{ConnectionCommand, ConnectionManager, DeviceChoice, SessionUpdate};
use headband_eeg::device_scanner::scan_devices;
use headband_eeg::export::write_export;
use headband_eeg::recorder::{RecordingData, SessionConfig};
use headband_eeg::types::DeviceInfo;

#[derive(Parser, Debug)]
#[command(name = "headband-eeg")]
#[command(author, version, about = "Stream and record EEG headbands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List nearby EEG headbands
    Scan,

    /// Record a session and export it as JSON
    Record {
        /// Headband family
        #[arg(short, long, value_enum, default_value = "muse")]
        device: DeviceArg,

        /// Recording length in seconds
        #[arg(short = 't', long, default_value = "60")]
        duration: u64,

        /// Export directory (defaults to the configured one)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Neurosity bridge address (defaults to the configured one)
        #[arg(long)]
        bridge: Option<String>,

        /// Phase label stamped on every frame
        #[arg(long)]
        phase: Option<String>,

        /// Channels to keep, comma separated; all when omitted
        #[arg(long, value_delimiter = ',')]
        channels: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DeviceArg {
    Muse,
    Neurosity,
    Synthetic,
}

const UPDATE_TIMEOUT: Duration = Duration::from_secs(60);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("{e}; using defaults");
        Config::default()
    });

    match cli.command {
        Commands::Scan => scan(&config),
        Commands::Record {
            device,
            duration,
            out,
            bridge,
            phase,
            channels,
        } => {
            let choice = match device {
                DeviceArg::Muse => DeviceChoice::Muse,
                DeviceArg::Neurosity => DeviceChoice::Neurosity {
                    bridge: bridge.unwrap_or_else(|| config.neurosity_bridge.clone()),
                },
                DeviceArg::Synthetic => DeviceChoice::Synthetic,
            };
            let out = out.unwrap_or_else(|| config.export_dir());
            let data = record(config, choice, Duration::from_secs(duration), phase, channels)?;
            let path = write_export(&out, &data)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn scan(config: &Config) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    let devices = rt.block_on(scan_devices(config))?;
    if devices.is_empty() {
        println!("No headbands found");
    }
    for device in devices {
        println!("{:<24} {:<10} {}", device.name, device.device_type, device.id);
    }
    Ok(())
}

/// Wait for the first update `pick` accepts. Errors reported by the
/// connection thread abort the wait.
fn expect_update<T>(
    updates: &mpsc::Receiver<SessionUpdate>,
    mut pick: impl FnMut(SessionUpdate) -> Option<T>,
) -> anyhow::Result<T> {
    loop {
        let update = updates
            .recv_timeout(UPDATE_TIMEOUT)
            .map_err(|_| anyhow!("Connection thread stopped responding"))?;
        match update {
            SessionUpdate::Error(msg) => bail!(msg),
            SessionUpdate::Status(status) => log::debug!("Status: {status}"),
            other => {
                if let Some(value) = pick(other) {
                    return Ok(value);
                }
            }
        }
    }
}

fn record(
    config: Config,
    choice: DeviceChoice,
    duration: Duration,
    phase: Option<String>,
    channels: Vec<String>,
) -> anyhow::Result<RecordingData> {
    let (update_sender, updates) = mpsc::channel::<SessionUpdate>();
    let (manager, commands) = ConnectionManager::new(update_sender, config);
    let worker = std::thread::spawn(move || manager.run());

    let outcome = run_session(&commands, &updates, choice, duration, phase, channels);
    teardown(commands, worker, outcome)
}

/// Release the device and wait for the connection thread, whatever the
/// session's outcome.
fn teardown<T>(
    commands: mpsc::Sender<ConnectionCommand>,
    worker: JoinHandle<()>,
    outcome: anyhow::Result<T>,
) -> anyhow::Result<T> {
    if commands.send(ConnectionCommand::Disconnect).is_err() {
        log::debug!("Connection thread already gone");
    }
    drop(commands);
    if worker.join().is_err() {
        log::warn!("Connection thread panicked during shutdown");
    }
    outcome
}

fn run_session(
    commands: &mpsc::Sender<ConnectionCommand>,
    updates: &mpsc::Receiver<SessionUpdate>,
    choice: DeviceChoice,
    duration: Duration,
    phase: Option<String>,
    channels: Vec<String>,
) -> anyhow::Result<RecordingData> {
    commands.send(ConnectionCommand::Connect(choice))?;
    let info: DeviceInfo = expect_update(updates, |u| match u {
        SessionUpdate::Connected(info) => Some(info),
        _ => None,
    })?;
    log::info!(
        "{} {} ({} channels @ {} Hz)",
        info.manufacturer,
        info.name,
        info.channel_count,
        info.sampling_rate
    );

    commands.send(ConnectionCommand::StartRecording(SessionConfig {
        device: info.device_type.to_string(),
        channels,
        sampling_rate: info.sampling_rate,
        phase,
    }))?;
    expect_update(updates, |u| matches!(u, SessionUpdate::RecordingStarted).then_some(()))?;
    log::info!("Recording for {} s", duration.as_secs());
    std::thread::sleep(duration);

    commands.send(ConnectionCommand::StopRecording)?;
    expect_update(updates, |u| match u {
        SessionUpdate::Recorded(data) => Some(data),
        _ => None,
    })
}
