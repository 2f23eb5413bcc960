//! Device, frame and status types shared by adapters, the manager and the recorder.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock time in milliseconds since the Unix epoch, with sub-millisecond precision.
pub fn now_ms() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1000.0
}

/// Headband family, inferred from the advertised name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "muse")]
    Muse,
    #[serde(rename = "muse-s")]
    MuseS,
    #[serde(rename = "muse-2")]
    Muse2,
    #[serde(rename = "neurosity")]
    Neurosity,
    #[serde(rename = "unknown")]
    Unknown,
}

impl DeviceType {
    /// Guess the device family from a BLE local name such as `"Muse-S-1A2B"`.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.starts_with("muse-s") || lower.starts_with("muses") {
            DeviceType::MuseS
        } else if lower.starts_with("muse-2") || lower.starts_with("muse2") {
            DeviceType::Muse2
        } else if lower.starts_with("muse") {
            DeviceType::Muse
        } else if lower.starts_with("crown") || lower.starts_with("notion") {
            DeviceType::Neurosity
        } else {
            DeviceType::Unknown
        }
    }

    pub fn manufacturer(&self) -> &'static str {
        match self {
            DeviceType::Muse | DeviceType::MuseS | DeviceType::Muse2 => "Interaxon",
            DeviceType::Neurosity => "Neurosity",
            DeviceType::Unknown => "Unknown",
        }
    }

    /// Number of EEG electrodes the family exposes.
    pub fn channel_count(&self) -> usize {
        match self {
            DeviceType::Neurosity => 8,
            _ => 4,
        }
    }

    /// Nominal sampling rate in Hz.
    pub fn sampling_rate(&self) -> f64 {
        256.0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Muse => "muse",
            DeviceType::MuseS => "muse-s",
            DeviceType::Muse2 => "muse-2",
            DeviceType::Neurosity => "neurosity",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which adapter implementation produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Muse,
    Neurosity,
    Synthetic,
}

/// A physical headband, fixed once the adapter has connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Platform Bluetooth id (UUID on macOS/Windows, MAC on Linux) or bridge address
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub manufacturer: String,
    pub channel_count: usize,
    pub sampling_rate: f64,
}

impl DeviceInfo {
    /// Build device info with the family defaults for manufacturer, channels and rate.
    pub fn new(id: impl Into<String>, name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type,
            manufacturer: device_type.manufacturer().to_string(),
            channel_count: device_type.channel_count(),
            sampling_rate: device_type.sampling_rate(),
        }
    }
}

/// One decoded notification worth of samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EegFrame {
    pub device_type: DeviceType,
    pub adapter: AdapterKind,
    /// Electrode label, e.g. `"TP9"` or `"CP3"`
    pub channel: String,
    /// Voltage samples in µV, oldest first
    pub samples: Vec<f64>,
    /// Capture time in ms since the Unix epoch
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Connection lifecycle of the device manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Streaming,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Streaming => "streaming",
            ConnectionStatus::Error => "error",
        };
        f.write_str(s)
    }
}
