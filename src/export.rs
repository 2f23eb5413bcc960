//! # Export Module
//!
//! Writes a [`RecordingData`] snapshot to disk as one JSON document:
//!
//! ```text
//! {"device": "...", "samplingRate": 256, "startTime": ..., "endTime": ...,
//!  "samples": [{"deviceType": "muse", "channel": "TP9", "samples": [...], ...}]}
//! ```
//!
//! Files are named `EEG_<device>_<epochMillis>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::recorder::RecordingData;

impl RecordingData {
    /// Pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// `EEG_<device>_<epochMillis>.json`, with path-unsafe characters in the
/// device label replaced by `_`.
pub fn export_file_name(device: &str, epoch_ms: i64) -> String {
    let device: String = device
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("EEG_{}_{}.json", device, epoch_ms)
}

/// Write `data` into `dir`, creating the directory if needed.
///
/// The filename timestamp is the recording's start time.
pub fn write_export(dir: &Path, data: &RecordingData) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(export_file_name(&data.device, data.start_time as i64));
    let json = data.to_json()?;
    fs::write(&path, json).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;

    log::info!("Exported {} frames to {}", data.samples.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdapterKind, DeviceType, EegFrame};

    fn recording() -> RecordingData {
        RecordingData {
            device: "Muse-S".to_string(),
            sampling_rate: 256.0,
            start_time: 1_700_000_000_123.4,
            end_time: Some(1_700_000_010_000.0),
            samples: vec![EegFrame {
                device_type: DeviceType::MuseS,
                adapter: AdapterKind::Muse,
                channel: "AF7".to_string(),
                samples: vec![1.5, -2.25],
                timestamp: 1_700_000_000_200.0,
                quality: None,
                phase: Some("baseline".to_string()),
            }],
        }
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("muse", 1700000000123), "EEG_muse_1700000000123.json");
        assert_eq!(
            export_file_name("Muse S/2 (AB)", 42),
            "EEG_Muse_S_2__AB__42.json"
        );
    }

    #[test]
    fn test_json_field_names() {
        let json = recording().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["device"], "Muse-S");
        assert_eq!(value["samplingRate"], 256.0);
        assert!(value["startTime"].is_number());
        assert!(value["endTime"].is_number());
        assert_eq!(value["samples"][0]["channel"], "AF7");
        assert_eq!(value["samples"][0]["deviceType"], "muse-s");
        assert_eq!(value["samples"][0]["phase"], "baseline");
        assert!(value["samples"][0].get("quality").is_none());
    }

    #[test]
    fn test_write_export_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("exports");
        let data = recording();

        let path = write_export(&target, &data).unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("EEG_Muse-S_1700000000123.json")
        );

        let written: RecordingData =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn test_write_export_into_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let err = write_export(&blocker, &recording()).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }
}
