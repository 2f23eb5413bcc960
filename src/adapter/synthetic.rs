//! Synthetic headband for demos and tests.
//!
//! Payloads are real signed 24-bit little-endian notifications, so they travel
//! through exactly the same decode path as hardware data.

use async_trait::async_trait;
use std::f64::consts::PI;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::{EegAdapter, FrameSource, NotificationPipeline};
use crate::broadcast::{Listener, Subscription};
use crate::error::AdapterError;
use crate::parse::encode_signed_24bit_le;
use crate::protocol::{SampleFormat, SCALE_24BIT_UV};
use crate::types::{AdapterKind, DeviceInfo, DeviceType, EegFrame};

/// Samples packed into one generated notification.
pub const SAMPLES_PER_PACKET: usize = 12;

const ALPHA_HZ: f64 = 10.0;
const ALPHA_AMPLITUDE_UV: f64 = 20.0;

/// Build a payload carrying a 10 Hz, 20 µV sine starting at sample `offset`.
pub fn synthetic_payload(offset: u64, samples: usize, sampling_rate: f64) -> Vec<u8> {
    let mut payload = Vec::with_capacity(samples * 3);
    for i in 0..samples {
        let t = (offset + i as u64) as f64 / sampling_rate;
        let uv = ALPHA_AMPLITUDE_UV * (2.0 * PI * ALPHA_HZ * t).sin();
        let raw = (uv / SCALE_24BIT_UV).round() as i32;
        payload.extend_from_slice(&encode_signed_24bit_le(raw));
    }
    payload
}

/// Feeds raw payloads into a synthetic adapter from outside, even after the
/// adapter has been handed to a `DeviceManager`.
#[derive(Clone)]
pub struct PayloadInjector {
    pipeline: NotificationPipeline,
    source: FrameSource,
}

impl PayloadInjector {
    /// Push one notification payload. Returns `true` if a frame was emitted.
    pub fn inject(&self, payload: &[u8]) -> bool {
        self.pipeline.process(&self.source, payload)
    }
}

pub struct SyntheticAdapter {
    pipeline: NotificationPipeline,
    source: FrameSource,
    info: Option<DeviceInfo>,
    tick: Option<Duration>,
    ticker: Option<JoinHandle<()>>,
}

impl SyntheticAdapter {
    /// Adapter that only emits what is injected.
    pub fn new() -> Self {
        Self {
            pipeline: NotificationPipeline::new(AdapterKind::Synthetic),
            source: FrameSource {
                device_type: DeviceType::Unknown,
                channel: "SIM".to_string(),
                format: SampleFormat::Signed24Le,
            },
            info: None,
            tick: None,
            ticker: None,
        }
    }

    /// Adapter that also generates a packet every `interval` while streaming.
    pub fn with_ticker(interval: Duration) -> Self {
        Self {
            tick: Some(interval),
            ..Self::new()
        }
    }

    pub fn injector(&self) -> PayloadInjector {
        PayloadInjector {
            pipeline: self.pipeline.clone(),
            source: self.source.clone(),
        }
    }

    fn halt_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Default for SyntheticAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EegAdapter for SyntheticAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Synthetic
    }

    fn device_info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    async fn connect(&mut self) -> Result<DeviceInfo, AdapterError> {
        let info = DeviceInfo::new("synthetic-0", "Synthetic Headband", DeviceType::Unknown);
        log::info!("Synthetic adapter connected");
        self.info = Some(info.clone());
        Ok(info)
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        let rate = self
            .info
            .as_ref()
            .map(|info| info.sampling_rate)
            .ok_or(AdapterError::NotConnected)?;
        self.pipeline.set_running(true);

        let interval = match self.tick {
            Some(interval) if self.ticker.is_none() => Some(interval),
            _ => None,
        };
        if let Some(interval) = interval {
            let injector = self.injector();
            self.ticker = Some(tokio::spawn(async move {
                let mut ticks = tokio::time::interval(interval);
                let mut offset = 0u64;
                loop {
                    ticks.tick().await;
                    injector.inject(&synthetic_payload(offset, SAMPLES_PER_PACKET, rate));
                    offset += SAMPLES_PER_PACKET as u64;
                }
            }));
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), AdapterError> {
        if self.info.is_none() {
            return Err(AdapterError::NotConnected);
        }
        self.pipeline.set_running(false);
        self.halt_ticker();
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AdapterError> {
        self.pipeline.set_running(false);
        self.halt_ticker();
        if self.info.take().is_some() {
            log::info!("Synthetic adapter stopped");
        }
        Ok(())
    }

    fn on_data(&self, listener: Listener<EegFrame>) -> Subscription {
        self.pipeline.subscribe(listener)
    }
}
