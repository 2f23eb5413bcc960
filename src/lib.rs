//! # headband-eeg
//!
//! Connect to a consumer EEG headband, stream decoded microvolt frames and
//! record sessions to JSON.
//!
//! ## Supported hardware
//!
//! | Family | Link | Channels | Sample format |
//! |---|---|---|---|
//! | Muse (2016, 2, S) | BLE GATT | 4 | 12-bit packed, 16-bit or 24-bit LE |
//! | Neurosity Crown / Notion | raw-brainwave bridge | 8 | already in µV |
//! | Synthetic | in-process | 1 | 24-bit LE |
//!
//! ## Quick start
//!
//! ```no_run
//! use headband_eeg::prelude::*;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut manager = DeviceManager::new();
//! manager.connect(Box::new(SyntheticAdapter::new())).await?;
//!
//! let mut recorder = EegRecorder::new();
//! recorder
//!     .start(
//!         &mut manager,
//!         SessionConfig {
//!             device: "synthetic".to_string(),
//!             channels: Vec::new(),
//!             sampling_rate: 256.0,
//!             phase: None,
//!         },
//!     )
//!     .await?;
//! // ...
//! recorder.stop(&mut manager).await;
//! write_export(std::path::Path::new("."), &recorder.get_data())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`protocol`] | GATT UUIDs, probe order, scale constants, vendor commands |
//! | [`parse`] | Byte-to-sample decoders |
//! | [`adapter`] | The `EegAdapter` interface and its Muse, Neurosity and synthetic variants |
//! | [`manager`] | Connection lifecycle state machine |
//! | [`recorder`] | Session buffering and snapshots |
//! | [`export`] | JSON export |
//! | [`connection`] | Background thread driving a manager and recorder |

pub mod adapter;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod device_scanner;
pub mod error;
pub mod export;
pub mod manager;
pub mod parse;
pub mod protocol;
pub mod recorder;
pub mod types;

/// Convenience re-exports for downstream crates.
pub mod prelude {
    pub use crate::adapter::{
        EegAdapter, MuseAdapter, MuseAdapterConfig, NeurosityAdapter, SyntheticAdapter, TcpBridge,
    };
    pub use crate::broadcast::Subscription;
    pub use crate::config::Config;
    pub use crate::error::{AdapterError, ExportError, ManagerError, RecorderError};
    pub use crate::export::{export_file_name, write_export};
    pub use crate::manager::DeviceManager;
    pub use crate::recorder::{EegRecorder, RecordingData, SessionConfig};
    pub use crate::types::{AdapterKind, ConnectionStatus, DeviceInfo, DeviceType, EegFrame};
}
