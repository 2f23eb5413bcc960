//! Lists nearby EEG headbands so the user can see what is in range before
//! recording.

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::Manager;
use std::fmt;
use std::time::Duration;

use crate::config::Config;
use crate::error::ScanError;
use crate::types::DeviceType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothDevice {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
}

impl BluetoothDevice {
    /// `id` is rendered with `Display`, giving the bare platform identifier.
    pub fn new(id: impl fmt::Display, name: String) -> Self {
        let device_type = DeviceType::from_name(&name);
        Self {
            id: id.to_string(),
            name,
            device_type,
        }
    }
}

/// Case-insensitive prefix match against the configured names.
pub fn matches_prefix(name: &str, prefixes: &[String]) -> bool {
    let name = name.to_lowercase();
    prefixes
        .iter()
        .any(|prefix| name.starts_with(&prefix.to_lowercase()))
}

/// Scans for nearby headbands whose advertised name matches the config.
pub async fn scan_devices(config: &Config) -> Result<Vec<BluetoothDevice>, ScanError> {
    let manager = Manager::new()
        .await
        .map_err(|e| ScanError::ManagerInit(e.to_string()))?;

    let adapters = manager
        .adapters()
        .await
        .map_err(|e| ScanError::ManagerInit(e.to_string()))?;

    let central = adapters.into_iter().next().ok_or(ScanError::NoAdapters)?;

    central
        .start_scan(ScanFilter::default())
        .await
        .map_err(|e| ScanError::ScanFailed(e.to_string()))?;

    log::info!("Scanning for {} s", config.scan_timeout_secs);
    tokio::time::sleep(Duration::from_secs(config.scan_timeout_secs)).await;

    central
        .stop_scan()
        .await
        .map_err(|e| ScanError::ScanFailed(e.to_string()))?;

    let peripherals = central
        .peripherals()
        .await
        .map_err(|e| ScanError::ScanFailed(e.to_string()))?;

    let mut devices = Vec::new();
    for peripheral in peripherals {
        if let Ok(Some(props)) = peripheral.properties().await {
            if let Some(local_name) = props.local_name {
                if matches_prefix(&local_name, &config.device_name_prefixes) {
                    let device = BluetoothDevice::new(peripheral.id(), local_name);
                    log::debug!("Found {} ({})", device.name, device.id);
                    devices.push(device);
                }
            }
        }
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_prefix() {
        let prefixes = Config::default().device_name_prefixes;
        assert!(matches_prefix("Muse-1A2B", &prefixes));
        assert!(matches_prefix("muses-77", &prefixes));
        assert!(matches_prefix("Crown-3", &prefixes));
        assert!(!matches_prefix("Polar H10 1234", &prefixes));
        assert!(!matches_prefix("MyMuse", &prefixes));
    }

    #[test]
    fn test_device_type_inferred_from_name() {
        let device = BluetoothDevice::new("id", "Crown-A1".to_string());
        assert_eq!(device.device_type, DeviceType::Neurosity);
    }

    #[test]
    fn test_device_id_is_bare_address() {
        use btleplug::api::BDAddr;
        let addr = BDAddr::from([0x00, 0x55, 0xDA, 0xB0, 0x1A, 0x2B]);
        let device = BluetoothDevice::new(addr, "Muse-1A2B".to_string());
        assert_eq!(device.id, "00:55:DA:B0:1A:2B");
        assert_eq!(device.device_type, DeviceType::Muse);
    }
}
