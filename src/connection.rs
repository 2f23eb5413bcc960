//! # Connection Management Module
//!
//! Runs the device lifecycle on a background thread so the caller (the CLI
//! today) never blocks on Bluetooth I/O.
//!
//! ## Key Components
//! - `ConnectionManager`: Owns the `DeviceManager` and the active recorder
//! - `ConnectionCommand`: Requests sent to the connection thread
//! - `SessionUpdate`: Status changes, recorded data and errors sent back
//!
//! The thread has its own Tokio runtime. Commands are handled strictly in
//! the order they arrive.

use std::sync::mpsc;
use tokio::runtime::Runtime;

use crate::adapter::{EegAdapter, MuseAdapter, NeurosityAdapter, SyntheticAdapter, TcpBridge};
use crate::config::Config;
use crate::manager::DeviceManager;
use crate::recorder::{EegRecorder, RecordingData, SessionConfig};
use crate::types::{ConnectionStatus, DeviceInfo};

/// Which headband family to connect to.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceChoice {
    Muse,
    /// Address of the raw-brainwave bridge
    Neurosity { bridge: String },
    Synthetic,
}

#[derive(Debug, Clone)]
pub enum ConnectionCommand {
    Connect(DeviceChoice),
    StartRecording(SessionConfig),
    SetPhase(Option<String>),
    StopRecording,
    Disconnect,
}

#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Status(ConnectionStatus),
    Connected(DeviceInfo),
    RecordingStarted,
    Recorded(RecordingData),
    Error(String),
}

/// Construct the adapter for `choice` using the scan and timeout settings in `config`.
pub fn build_adapter(choice: &DeviceChoice, config: &Config) -> Box<dyn EegAdapter> {
    match choice {
        DeviceChoice::Muse => Box::new(MuseAdapter::new(config.muse_adapter_config())),
        DeviceChoice::Neurosity { bridge } => Box::new(NeurosityAdapter::new(Box::new(
            TcpBridge::new(bridge.clone(), config.connect_timeout()),
        ))),
        DeviceChoice::Synthetic => Box::new(SyntheticAdapter::with_ticker(config.synthetic_tick())),
    }
}

/// Manages the connection lifecycle of one headband.
///
/// Runs in a dedicated thread with its own Tokio runtime.
pub struct ConnectionManager {
    command_receiver: mpsc::Receiver<ConnectionCommand>,
    update_sender: mpsc::Sender<SessionUpdate>,
    config: Config,
}

impl ConnectionManager {
    /// Creates a new ConnectionManager.
    ///
    /// Returns the manager and a sender for issuing commands to it.
    pub fn new(
        update_sender: mpsc::Sender<SessionUpdate>,
        config: Config,
    ) -> (Self, mpsc::Sender<ConnectionCommand>) {
        let (command_sender, command_receiver) = mpsc::channel();

        let manager = ConnectionManager {
            command_receiver,
            update_sender,
            config,
        };

        (manager, command_sender)
    }

    fn send(&self, update: SessionUpdate) {
        if self.update_sender.send(update).is_err() {
            log::debug!("Connection manager: update receiver dropped");
        }
    }

    /// Runs the command loop until the command channel is closed.
    ///
    /// Call this from a spawned thread.
    pub fn run(self) {
        let rt = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("Failed to create async runtime: {e}");
                self.send(SessionUpdate::Error(format!(
                    "Failed to create async runtime: {e}"
                )));
                return;
            }
        };

        let mut devices = DeviceManager::new();
        let status_sender = self.update_sender.clone();
        let status_subscription = devices.on_status(Box::new(move |status| {
            let _ = status_sender.send(SessionUpdate::Status(*status));
        }));
        let mut recorder: Option<EegRecorder> = None;

        while let Ok(command) = self.command_receiver.recv() {
            rt.block_on(self.handle(command, &mut devices, &mut recorder));
        }

        log::info!("Connection manager: Command channel closed, shutting down");
        rt.block_on(async {
            self.finish_recording(&mut devices, &mut recorder).await;
            devices.disconnect().await;
        });
        status_subscription.unsubscribe();
    }

    async fn handle(
        &self,
        command: ConnectionCommand,
        devices: &mut DeviceManager,
        recorder: &mut Option<EegRecorder>,
    ) {
        match command {
            ConnectionCommand::Connect(choice) => {
                log::info!("Connection manager: Connecting to {:?}", choice);
                let adapter = build_adapter(&choice, &self.config);
                match devices.connect(adapter).await {
                    Ok(info) => self.send(SessionUpdate::Connected(info)),
                    Err(e) => self.send(SessionUpdate::Error(e.to_string())),
                }
            }
            ConnectionCommand::StartRecording(session) => {
                if recorder.as_ref().is_some_and(|r| r.is_recording()) {
                    self.send(SessionUpdate::Error("A recording is already running".to_string()));
                    return;
                }
                let mut fresh = EegRecorder::new();
                match fresh.start(devices, session).await {
                    Ok(()) => {
                        *recorder = Some(fresh);
                        self.send(SessionUpdate::RecordingStarted);
                    }
                    Err(e) => self.send(SessionUpdate::Error(e.to_string())),
                }
            }
            ConnectionCommand::SetPhase(label) => match recorder {
                Some(active) if active.is_recording() => {
                    log::info!("Phase: {}", label.as_deref().unwrap_or("(none)"));
                    active.set_phase(label);
                }
                _ => log::warn!("Connection manager: Phase change ignored, not recording"),
            },
            ConnectionCommand::StopRecording => {
                if !self.finish_recording(devices, recorder).await {
                    log::warn!("Connection manager: Stop requested but nothing is recording");
                }
            }
            ConnectionCommand::Disconnect => {
                log::info!("Connection manager: Disconnect requested");
                self.finish_recording(devices, recorder).await;
                devices.disconnect().await;
            }
        }
    }

    /// Stop the active recording, if any, and report its data.
    async fn finish_recording(
        &self,
        devices: &mut DeviceManager,
        recorder: &mut Option<EegRecorder>,
    ) -> bool {
        match recorder.take() {
            Some(mut active) if active.is_recording() => {
                active.stop(devices).await;
                self.send(SessionUpdate::Recorded(active.get_data()));
                true
            }
            _ => false,
        }
    }
}
