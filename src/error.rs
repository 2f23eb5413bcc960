//! # Error Types Module
//!
//! Centralized error handling for the headband-eeg crate.
//! Each concern gets its own error enum so callers can match on the failure
//! and show the user something actionable.
//!
//! ## Error Types
//! - `AdapterError`: Bluetooth, device selection, GATT discovery and source failures
//! - `ManagerError`: Invalid connection lifecycle transitions
//! - `RecorderError`: Recording session misuse
//! - `ExportError`: Writing recordings to disk
//! - `ConfigError`: Configuration file I/O and parsing errors
//! - `ScanError`: Bluetooth device scanning errors
//!
//! ## Usage Examples
//! ```rust,ignore
//! // Adapters report hardware problems
//! async fn connect(&mut self) -> Result<DeviceInfo, AdapterError> { ... }
//!
//! // The manager rejects invalid transitions without touching its status
//! pub async fn start_streaming(&mut self) -> Result<(), ManagerError> { ... }
//! ```

use thiserror::Error;

use crate::types::ConnectionStatus;

/// Errors raised by a device adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The platform has no usable Bluetooth stack
    #[error("Bluetooth is not supported on this system: {0}")]
    BluetoothUnavailable(String),

    /// Bluetooth stack is present but no adapter is plugged in or powered
    #[error("No Bluetooth adapter found. Please ensure Bluetooth is enabled.")]
    NoAdapter,

    /// Nothing matching the configured name prefixes showed up
    #[error(
        "No EEG headband found after {timeout_secs} s. Make sure the headband is \
         powered on and nearby, then try again."
    )]
    NoDeviceFound { timeout_secs: u64 },

    /// GATT connection did not complete in time
    #[error("Connecting to {device} timed out after {timeout_secs} s")]
    ConnectTimeout { device: String, timeout_secs: u64 },

    /// Every known service/characteristic pair was probed without a match
    #[error(
        "No recognizable EEG service found on {device}. Power-cycle the headband \
         and make sure no other app is connected to it."
    )]
    ServiceNotFound { device: String },

    /// Control command too long for its one-byte length prefix
    #[error("Control command of {len} bytes exceeds the 254-byte limit")]
    CommandTooLong { len: usize },

    /// `start()` or `pause()` before a successful `connect()`
    #[error("Device is not connected")]
    NotConnected,

    /// Low-level BLE failure
    #[error("Bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),

    /// Failure reading from an external data source
    #[error("Data source error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the device manager when a transition is not allowed.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// `connect()` while a device is already attached
    #[error("A device is already attached (status: {0})")]
    AlreadyConnected(ConnectionStatus),

    /// Streaming requested without a connected device
    #[error("Device not connected (status: {0})")]
    NotConnected(ConnectionStatus),

    /// `stop_streaming()` while nothing is streaming
    #[error("Device is not streaming (status: {0})")]
    NotStreaming(ConnectionStatus),

    /// Propagated verbatim from the adapter
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Errors raised by a recording session.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// A session object records exactly once
    #[error("Recording session was already started")]
    AlreadyStarted,

    /// Streaming could not be started
    #[error(transparent)]
    Manager(#[from] ManagerError),
}

/// Errors raised while writing a recording to disk.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Export directory or file could not be written
    #[error("Failed to write export {}: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Recording could not be serialized
    #[error("Failed to serialize recording: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadFailed(#[source] std::io::Error),
    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteFailed(#[source] std::io::Error),
    /// Failed to parse config file
    #[error("Failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
}

/// Errors that can occur during device scanning
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// Bluetooth manager initialization failed
    #[error("Failed to initialize Bluetooth manager: {0}")]
    ManagerInit(String),
    /// No Bluetooth adapters available
    #[error("No Bluetooth adapters found")]
    NoAdapters,
    /// Scan operation failed
    #[error("Scan operation failed: {0}")]
    ScanFailed(String),
}
