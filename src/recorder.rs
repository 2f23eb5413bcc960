//! # Recording Module
//!
//! Buffers decoded frames for one recording session and hands back an
//! immutable snapshot when asked.
//!
//! ## Architecture
//! - **EegRecorder**: Owns the session lifecycle (idle → recording → stopped)
//! - **Frame listener**: Registered on the `DeviceManager`; filters by channel,
//!   stamps the current phase label and pushes into a channel
//! - **Buffer**: Drained from the channel on `stop()` and on every snapshot
//!
//! The listener runs on whichever task decodes notifications, so it never
//! touches the buffer directly; a crossbeam channel decouples the two.
//!
//! The recorder performs no disk or network I/O. Writing a snapshot to disk
//! is the caller's job (see `export`).

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::broadcast::Subscription;
use crate::error::RecorderError;
use crate::manager::DeviceManager;
use crate::types::{now_ms, EegFrame};

/// Parameters for one recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Device label written into the snapshot and export filename
    pub device: String,
    /// Channels to keep. Empty keeps everything.
    pub channels: Vec<String>,
    /// Nominal sampling rate in Hz
    pub sampling_rate: f64,
    /// Initial phase label, if any
    pub phase: Option<String>,
}

/// Snapshot of a recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingData {
    pub device: String,
    pub sampling_rate: f64,
    /// Epoch milliseconds
    pub start_time: f64,
    /// Epoch milliseconds; `None` while still recording
    pub end_time: Option<f64>,
    pub samples: Vec<EegFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecorderState {
    Idle,
    Recording,
    Stopped,
}

pub struct EegRecorder {
    state: RecorderState,
    config: Option<SessionConfig>,
    start_time: f64,
    end_time: Option<f64>,
    samples: Vec<EegFrame>,
    sender: Sender<EegFrame>,
    receiver: Receiver<EegFrame>,
    phase: Arc<Mutex<Option<String>>>,
    subscription: Option<Subscription>,
}

impl EegRecorder {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            state: RecorderState::Idle,
            config: None,
            start_time: 0.0,
            end_time: None,
            samples: Vec::new(),
            sender,
            receiver,
            phase: Arc::new(Mutex::new(None)),
            subscription: None,
        }
    }

    /// Subscribe to `manager` and start streaming. A recorder starts once.
    ///
    /// If streaming cannot start, the listener is removed again and the
    /// recorder stays idle.
    pub async fn start(
        &mut self,
        manager: &mut DeviceManager,
        config: SessionConfig,
    ) -> Result<(), RecorderError> {
        if self.state != RecorderState::Idle {
            return Err(RecorderError::AlreadyStarted);
        }

        self.set_phase(config.phase.clone());
        let sender = self.sender.clone();
        let phase = Arc::clone(&self.phase);
        let channels = config.channels.clone();
        let subscription = manager.on_data(Box::new(move |frame: &EegFrame| {
            if !channels.is_empty() && !channels.iter().any(|c| c == &frame.channel) {
                return;
            }
            let mut frame = frame.clone();
            frame.phase = phase.lock().ok().and_then(|p| p.clone());
            // Receiver lives as long as the recorder
            let _ = sender.send(frame);
        }));

        let start_time = now_ms();
        if let Err(e) = manager.start_streaming().await {
            subscription.unsubscribe();
            log::error!("Recording could not start: {e}");
            return Err(e.into());
        }

        log::info!(
            "Recording {} at {} Hz{}",
            config.device,
            config.sampling_rate,
            if config.channels.is_empty() {
                String::new()
            } else {
                format!(" (channels: {})", config.channels.join(", "))
            }
        );
        self.start_time = start_time;
        self.subscription = Some(subscription);
        self.config = Some(config);
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Label frames received from now on. `None` clears the label.
    pub fn set_phase(&self, label: Option<String>) {
        match self.phase.lock() {
            Ok(mut phase) => *phase = label,
            Err(poisoned) => *poisoned.into_inner() = label,
        }
    }

    /// Stop buffering and freeze the session. Calling it again does nothing.
    pub async fn stop(&mut self, manager: &mut DeviceManager) {
        if self.state != RecorderState::Recording {
            return;
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Err(e) = manager.stop_streaming().await {
            log::warn!("Stopping stream after recording: {e}");
        }
        self.drain();
        self.end_time = Some(now_ms());
        self.state = RecorderState::Stopped;
        log::info!("Recording stopped with {} frames", self.samples.len());
    }

    fn drain(&mut self) {
        self.samples.extend(self.receiver.try_iter());
    }

    /// Snapshot of everything recorded so far.
    pub fn get_data(&mut self) -> RecordingData {
        if self.state == RecorderState::Recording {
            self.drain();
        }
        let (device, sampling_rate) = self
            .config
            .as_ref()
            .map(|c| (c.device.clone(), c.sampling_rate))
            .unwrap_or_default();
        RecordingData {
            device,
            sampling_rate,
            start_time: self.start_time,
            end_time: self.end_time,
            samples: self.samples.clone(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Frames buffered so far, including ones not yet drained.
    pub fn frame_count(&self) -> usize {
        self.samples.len() + self.receiver.len()
    }
}

impl Default for EegRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::synthetic::{synthetic_payload, SAMPLES_PER_PACKET};
    use crate::adapter::{PayloadInjector, SyntheticAdapter};
    use crate::error::ManagerError;
    use crate::types::ConnectionStatus;
    use std::time::Duration;

    fn session(channels: &[&str]) -> SessionConfig {
        SessionConfig {
            device: "synthetic".to_string(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
            sampling_rate: 256.0,
            phase: None,
        }
    }

    async fn connected() -> (DeviceManager, PayloadInjector) {
        let mut manager = DeviceManager::new();
        let adapter = SyntheticAdapter::new();
        let injector = adapter.injector();
        manager.connect(Box::new(adapter)).await.unwrap();
        (manager, injector)
    }

    fn inject(injector: &PayloadInjector, packets: u64) {
        for i in 0..packets {
            let offset = i * SAMPLES_PER_PACKET as u64;
            assert!(injector.inject(&synthetic_payload(offset, SAMPLES_PER_PACKET, 256.0)));
        }
    }

    #[tokio::test]
    async fn test_record_ten_payloads() {
        let (mut manager, injector) = connected().await;
        let mut recorder = EegRecorder::new();

        recorder.start(&mut manager, session(&[])).await.unwrap();
        assert_eq!(manager.status(), ConnectionStatus::Streaming);
        inject(&injector, 10);
        tokio::time::sleep(Duration::from_millis(5)).await;
        recorder.stop(&mut manager).await;

        let data = recorder.get_data();
        assert_eq!(data.samples.len(), 10);
        assert_eq!(data.device, "synthetic");
        assert_eq!(data.sampling_rate, 256.0);
        assert!(data.end_time.unwrap() > data.start_time);
        assert_eq!(manager.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_frames_after_stop_ignored() {
        let (mut manager, injector) = connected().await;
        let mut recorder = EegRecorder::new();
        recorder.start(&mut manager, session(&[])).await.unwrap();
        inject(&injector, 3);
        recorder.stop(&mut manager).await;

        // Streaming again does not reach a stopped recorder
        manager.start_streaming().await.unwrap();
        inject(&injector, 2);
        recorder.stop(&mut manager).await;

        assert_eq!(recorder.get_data().samples.len(), 3);
        assert!(!recorder.is_recording());
    }

    #[tokio::test]
    async fn test_start_only_once() {
        let (mut manager, _injector) = connected().await;
        let mut recorder = EegRecorder::new();
        recorder.start(&mut manager, session(&[])).await.unwrap();
        assert!(matches!(
            recorder.start(&mut manager, session(&[])).await,
            Err(RecorderError::AlreadyStarted)
        ));

        recorder.stop(&mut manager).await;
        assert!(matches!(
            recorder.start(&mut manager, session(&[])).await,
            Err(RecorderError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_start_without_device_stays_idle() {
        let mut manager = DeviceManager::new();
        let mut recorder = EegRecorder::new();

        let err = recorder.start(&mut manager, session(&[])).await.unwrap_err();
        assert!(matches!(
            err,
            RecorderError::Manager(ManagerError::NotConnected(ConnectionStatus::Disconnected))
        ));
        assert!(!recorder.is_recording());

        // A failed start does not use up the session
        let (mut manager, injector) = connected().await;
        recorder.start(&mut manager, session(&[])).await.unwrap();
        inject(&injector, 1);
        assert_eq!(recorder.frame_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_filter_and_phase_labels() {
        let (mut manager, injector) = connected().await;
        let mut recorder = EegRecorder::new();
        let mut config = session(&["SIM"]);
        config.phase = Some("baseline".to_string());
        recorder.start(&mut manager, config).await.unwrap();

        inject(&injector, 2);
        recorder.set_phase(Some("task".to_string()));
        inject(&injector, 1);
        recorder.stop(&mut manager).await;

        let phases: Vec<_> = recorder
            .get_data()
            .samples
            .iter()
            .map(|f| f.phase.clone().unwrap_or_default())
            .collect();
        assert_eq!(phases, vec!["baseline", "baseline", "task"]);

        let (mut manager, injector) = connected().await;
        let mut filtered = EegRecorder::new();
        filtered.start(&mut manager, session(&["TP9"])).await.unwrap();
        inject(&injector, 4);
        filtered.stop(&mut manager).await;
        assert!(filtered.get_data().samples.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_while_recording() {
        let (mut manager, injector) = connected().await;
        let mut recorder = EegRecorder::new();
        recorder.start(&mut manager, session(&[])).await.unwrap();
        inject(&injector, 2);

        let snapshot = recorder.get_data();
        assert_eq!(snapshot.samples.len(), 2);
        assert!(snapshot.end_time.is_none());

        inject(&injector, 1);
        assert_eq!(snapshot.samples.len(), 2);
        recorder.stop(&mut manager).await;
        assert_eq!(recorder.get_data().samples.len(), 3);
    }
}
