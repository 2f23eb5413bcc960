//! # Muse Adapter Module
//!
//! Muse-family headbands over BLE GATT via `btleplug`.
//!
//! ## Connect sequence
//! 1. Open the first Bluetooth adapter (fails if the platform has none)
//! 2. Scan until a peripheral name matches one of the configured prefixes
//! 3. GATT connect and service discovery, each under a fixed timeout
//! 4. Walk the probe list and bind the first EEG characteristic found
//!
//! When the classic per-electrode characteristic wins the probe, the
//! remaining classic electrodes (AF7, AF8, TP10) are bound as well so that
//! every channel streams.

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{EegAdapter, FrameSource, NotificationPipeline};
use crate::broadcast::{Listener, Subscription};
use crate::error::AdapterError;
use crate::protocol::{
    encode_command, expand_probe, select_probe, Probe, MUSE_CONTROL_CHARACTERISTIC, MUSE_PROBES,
    MUSE_START_SEQUENCE, MUSE_STOP_COMMAND,
};
use crate::types::{AdapterKind, DeviceInfo, DeviceType, EegFrame};

// Pause between vendor commands; the headset drops writes that arrive back to back
const COMMAND_GAP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct MuseAdapterConfig {
    /// Advertised name prefixes accepted during the scan
    pub name_prefixes: Vec<String>,
    pub scan_timeout: Duration,
    /// Bound on GATT connect and on service discovery
    pub connect_timeout: Duration,
    /// Discovery order; first match wins
    pub probes: Vec<Probe>,
}

impl Default for MuseAdapterConfig {
    fn default() -> Self {
        Self {
            name_prefixes: vec!["Muse".to_string()],
            scan_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(15),
            probes: MUSE_PROBES.to_vec(),
        }
    }
}

/// A characteristic to subscribe and how to decode what it sends.
struct BoundStream {
    characteristic: Characteristic,
    source: FrameSource,
}

/// Decode target for a notification from `characteristic`.
fn route(routes: &[(Uuid, FrameSource)], characteristic: Uuid) -> Option<&FrameSource> {
    routes
        .iter()
        .find(|(uuid, _)| *uuid == characteristic)
        .map(|(_, source)| source)
}

/// Run `setup`; if it fails, run `release` before handing back the error.
///
/// Every step after the GATT link comes up goes through here.
async fn or_release<T>(
    setup: impl Future<Output = Result<T, AdapterError>>,
    release: impl Future<Output = ()>,
) -> Result<T, AdapterError> {
    match setup.await {
        Ok(value) => Ok(value),
        Err(e) => {
            release.await;
            Err(e)
        }
    }
}

/// Everything that exists only while connected.
struct MuseLink {
    peripheral: Peripheral,
    streams: Vec<BoundStream>,
    control: Option<Characteristic>,
    notify_task: Option<JoinHandle<()>>,
    watcher: JoinHandle<()>,
}

pub struct MuseAdapter {
    config: MuseAdapterConfig,
    pipeline: NotificationPipeline,
    link: Option<MuseLink>,
    info: Option<DeviceInfo>,
}

impl MuseAdapter {
    pub fn new(config: MuseAdapterConfig) -> Self {
        Self {
            config,
            pipeline: NotificationPipeline::new(AdapterKind::Muse),
            link: None,
            info: None,
        }
    }

    async fn open_adapter() -> Result<Adapter, AdapterError> {
        let manager = Manager::new()
            .await
            .map_err(|e| AdapterError::BluetoothUnavailable(e.to_string()))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| AdapterError::BluetoothUnavailable(e.to_string()))?;
        adapters.into_iter().next().ok_or(AdapterError::NoAdapter)
    }

    /// Poll the adapter until a peripheral with a matching name shows up.
    async fn find_first(&self, adapter: &Adapter) -> Result<(Peripheral, String), AdapterError> {
        let prefixes = &self.config.name_prefixes;
        let search = async {
            loop {
                let peripherals = adapter.peripherals().await.unwrap_or_default();
                for p in peripherals {
                    if let Ok(Some(props)) = p.properties().await {
                        if let Some(name) = props.local_name {
                            if prefixes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
                                return (p, name);
                            }
                        }
                    }
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        };

        tokio::time::timeout(self.config.scan_timeout, search)
            .await
            .map_err(|_| AdapterError::NoDeviceFound {
                timeout_secs: self.config.scan_timeout.as_secs(),
            })
    }

    /// Resolve the probe list against the discovered GATT table.
    fn bind_streams(
        &self,
        peripheral: &Peripheral,
        device_name: &str,
        device_type: DeviceType,
    ) -> Result<Vec<BoundStream>, AdapterError> {
        let services = peripheral.services();
        let available: Vec<(Uuid, Uuid)> = services
            .iter()
            .flat_map(|s| s.characteristics.iter().map(move |c| (s.uuid, c.uuid)))
            .collect();
        log::debug!("{device_name}: {} characteristics discovered", available.len());

        let probe = select_probe(&self.config.probes, &available).ok_or_else(|| {
            AdapterError::ServiceNotFound {
                device: device_name.to_string(),
            }
        })?;
        log::info!("{device_name}: bound EEG source '{}'", probe.label);

        let characteristics = peripheral.characteristics();
        let streams: Vec<BoundStream> = expand_probe(probe, &available)
            .into_iter()
            .filter_map(|plan| {
                let characteristic = characteristics
                    .iter()
                    .find(|c| c.service_uuid == plan.service && c.uuid == plan.characteristic)
                    .cloned()?;
                Some(BoundStream {
                    characteristic,
                    source: FrameSource {
                        device_type,
                        channel: plan.channel.to_string(),
                        format: plan.format,
                    },
                })
            })
            .collect();
        log::debug!("{device_name}: binding {} EEG stream(s)", streams.len());

        if streams.is_empty() {
            return Err(AdapterError::ServiceNotFound {
                device: device_name.to_string(),
            });
        }
        Ok(streams)
    }

    /// Log hardware dropouts. No reconnection is attempted.
    fn spawn_disconnect_watcher(adapter: Adapter, peripheral: &Peripheral, name: String) -> JoinHandle<()> {
        let peripheral_id = peripheral.id();
        tokio::spawn(async move {
            match adapter.events().await {
                Ok(mut events) => {
                    while let Some(event) = events.next().await {
                        if let CentralEvent::DeviceDisconnected(id) = event {
                            if id == peripheral_id {
                                log::warn!("{name}: link lost, no further frames will arrive");
                                break;
                            }
                        }
                    }
                }
                Err(e) => log::warn!("Disconnect watcher unavailable: {e}"),
            }
        })
    }

    async fn send_command(peripheral: &Peripheral, control: &Characteristic, cmd: &str) -> Result<(), AdapterError> {
        let bytes = encode_command(cmd).ok_or(AdapterError::CommandTooLong { len: cmd.len() })?;
        peripheral
            .write(control, &bytes, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    /// Drop a half-open link so the headset advertises again.
    async fn release(peripheral: &Peripheral, name: &str) {
        if let Err(e) = peripheral.disconnect().await {
            log::warn!("{name}: disconnect after failed setup: {e}");
        }
    }

    /// Unsubscribe and halt the headset. Failures are logged, never returned.
    async fn quiesce(link: &mut MuseLink) {
        if let Some(task) = link.notify_task.take() {
            task.abort();
        }
        for stream in &link.streams {
            if let Err(e) = link.peripheral.unsubscribe(&stream.characteristic).await {
                log::debug!("Unsubscribe from {} failed: {e}", stream.characteristic.uuid);
            }
        }
        if let Some(control) = &link.control {
            if let Err(e) = Self::send_command(&link.peripheral, control, MUSE_STOP_COMMAND).await {
                log::debug!("Stop command not delivered: {e}");
            }
        }
    }
}

#[async_trait]
impl EegAdapter for MuseAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Muse
    }

    fn device_info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    async fn connect(&mut self) -> Result<DeviceInfo, AdapterError> {
        if let Some(info) = &self.info {
            return Ok(info.clone());
        }

        let adapter = Self::open_adapter().await?;
        log::info!(
            "Scanning for {:?} (timeout: {} s)",
            self.config.name_prefixes,
            self.config.scan_timeout.as_secs()
        );
        adapter.start_scan(ScanFilter::default()).await?;
        let found = self.find_first(&adapter).await;
        let _ = adapter.stop_scan().await;
        let (peripheral, name) = found?;
        log::info!("Found device: {name}");

        let mut device_type = DeviceType::from_name(&name);
        if device_type == DeviceType::Unknown {
            device_type = DeviceType::Muse;
        }

        let connect_timeout = self.config.connect_timeout;
        let timed_out = || AdapterError::ConnectTimeout {
            device: name.clone(),
            timeout_secs: connect_timeout.as_secs(),
        };
        let setup = async {
            tokio::time::timeout(connect_timeout, peripheral.connect())
                .await
                .map_err(|_| timed_out())??;

            // BlueZ reports the link before its GATT cache is populated
            #[cfg(target_os = "linux")]
            tokio::time::sleep(Duration::from_millis(600)).await;

            tokio::time::timeout(connect_timeout, peripheral.discover_services())
                .await
                .map_err(|_| timed_out())??;

            let streams = self.bind_streams(&peripheral, &name, device_type)?;
            let control = peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.uuid == MUSE_CONTROL_CHARACTERISTIC);
            Ok::<_, AdapterError>((streams, control))
        };
        let (streams, control) = or_release(setup, Self::release(&peripheral, &name)).await?;

        let info = DeviceInfo::new(peripheral.id().to_string(), name.clone(), device_type);
        let watcher = Self::spawn_disconnect_watcher(adapter, &peripheral, name);

        self.link = Some(MuseLink {
            peripheral,
            streams,
            control,
            notify_task: None,
            watcher,
        });
        self.info = Some(info.clone());
        Ok(info)
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        let link = self.link.as_mut().ok_or(AdapterError::NotConnected)?;
        if link.notify_task.is_some() {
            self.pipeline.set_running(true);
            return Ok(());
        }

        for stream in &link.streams {
            link.peripheral.subscribe(&stream.characteristic).await?;
        }
        let mut notifications = link.peripheral.notifications().await?;

        self.pipeline.set_running(true);
        let pipeline = self.pipeline.clone();
        let routes: Vec<(Uuid, FrameSource)> = link
            .streams
            .iter()
            .map(|s| (s.characteristic.uuid, s.source.clone()))
            .collect();
        link.notify_task = Some(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                match route(&routes, notification.uuid) {
                    Some(source) => {
                        pipeline.process(source, &notification.value);
                    }
                    None => log::trace!("Ignoring notification from {}", notification.uuid),
                }
            }
            log::info!("Notification stream ended");
        }));

        if let Some(control) = &link.control {
            for cmd in MUSE_START_SEQUENCE {
                if let Err(e) = Self::send_command(&link.peripheral, control, cmd).await {
                    log::warn!("Start command '{cmd}' failed: {e}");
                }
                tokio::time::sleep(COMMAND_GAP).await;
            }
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), AdapterError> {
        let link = self.link.as_mut().ok_or(AdapterError::NotConnected)?;
        self.pipeline.set_running(false);
        Self::quiesce(link).await;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AdapterError> {
        self.pipeline.set_running(false);
        let Some(mut link) = self.link.take() else {
            return Ok(());
        };

        Self::quiesce(&mut link).await;
        if let Err(e) = link.peripheral.disconnect().await {
            log::debug!("Disconnect failed: {e}");
        }
        link.watcher.abort();
        if let Some(info) = self.info.take() {
            log::info!("Disconnected from {}", info.name);
        }
        Ok(())
    }

    fn on_data(&self, listener: Listener<EegFrame>) -> Subscription {
        self.pipeline.subscribe(listener)
    }
}
