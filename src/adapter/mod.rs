//! # Device Adapter Module
//!
//! One capability interface, [`EegAdapter`], with a variant per headband
//! family. Adapters own their link to the hardware (or data source) and push
//! decoded [`EegFrame`]s to any number of listeners.
//!
//! ## Variants
//! - `muse`: Muse family over BLE GATT, discovered through the ordered probe list
//! - `neurosity`: raw brainwave epochs from an external SDK bridge
//! - `synthetic`: deterministic 24-bit payloads for demos and tests
//!
//! ## Lifecycle
//! `connect` → `start` ⇄ `pause` → `stop`. `stop` tears everything down, is
//! idempotent and never fails on a second call.

pub mod muse;
pub mod neurosity;
pub mod synthetic;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::broadcast::{Broadcaster, Listener, Subscription};
use crate::error::AdapterError;
use crate::parse::decode_payload;
use crate::protocol::SampleFormat;
use crate::types::{now_ms, AdapterKind, DeviceInfo, DeviceType, EegFrame};

pub use muse::{MuseAdapter, MuseAdapterConfig};
pub use neurosity::{BrainwaveSource, NeurosityAdapter, TcpBridge};
pub use synthetic::{PayloadInjector, SyntheticAdapter};

/// Common contract for every headband variant.
#[async_trait]
pub trait EegAdapter: Send {
    fn kind(&self) -> AdapterKind;

    /// Set after a successful `connect()`, cleared by `stop()`.
    fn device_info(&self) -> Option<&DeviceInfo>;

    /// Select a device and bind its EEG data source.
    async fn connect(&mut self) -> Result<DeviceInfo, AdapterError>;

    /// Begin emitting frames. Fails with `NotConnected` before `connect()`.
    async fn start(&mut self) -> Result<(), AdapterError>;

    /// Stop emitting frames but keep the link up so `start()` can resume.
    async fn pause(&mut self) -> Result<(), AdapterError>;

    /// Stop emitting frames and release the link. Safe to call repeatedly.
    async fn stop(&mut self) -> Result<(), AdapterError>;

    /// Register a frame listener.
    fn on_data(&self, listener: Listener<EegFrame>) -> Subscription;
}

/// Where a payload came from and how to decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSource {
    pub device_type: DeviceType,
    pub channel: String,
    pub format: SampleFormat,
}

/// Decode-and-broadcast stage shared by adapters and their background tasks.
///
/// Cloning is cheap; clones share the running flag and listener set.
#[derive(Clone)]
pub struct NotificationPipeline {
    kind: AdapterKind,
    running: Arc<AtomicBool>,
    skipped: Arc<AtomicU64>,
    frames: Broadcaster<EegFrame>,
}

impl NotificationPipeline {
    pub fn new(kind: AdapterKind) -> Self {
        Self {
            kind,
            running: Arc::new(AtomicBool::new(false)),
            skipped: Arc::new(AtomicU64::new(0)),
            frames: Broadcaster::new(),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of payloads dropped because they were too short to decode.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self, listener: Listener<EegFrame>) -> Subscription {
        self.frames.subscribe(listener)
    }

    /// Decode one raw notification and broadcast it.
    ///
    /// Returns `true` if a frame was emitted. Nothing is emitted while
    /// stopped or when the payload holds no complete sample.
    pub fn process(&self, source: &FrameSource, payload: &[u8]) -> bool {
        if !self.is_running() {
            return false;
        }
        let samples = decode_payload(payload, source.format);
        if samples.is_empty() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "Skipping malformed {} payload on {} ({} bytes)",
                source.device_type,
                source.channel,
                payload.len()
            );
            return false;
        }
        self.emit_samples(source.device_type, &source.channel, samples, now_ms(), None)
    }

    /// Broadcast already-decoded samples.
    pub fn emit_samples(
        &self,
        device_type: DeviceType,
        channel: &str,
        samples: Vec<f64>,
        timestamp: f64,
        quality: Option<Vec<u8>>,
    ) -> bool {
        if !self.is_running() || samples.is_empty() {
            return false;
        }
        let frame = EegFrame {
            device_type,
            adapter: self.kind,
            channel: channel.to_string(),
            samples,
            timestamp,
            quality,
            phase: None,
        };
        self.frames.emit(&frame);
        true
    }
}
