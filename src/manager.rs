//! # Device Manager Module
//!
//! Single point of truth for the connection lifecycle. One `DeviceManager`
//! owns at most one adapter; whoever constructs the manager holds the only
//! handle to the hardware, so no global state is involved.
//!
//! ## State machine
//! ```text
//! disconnected/error --connect--> connecting --ok--> connected --start--> streaming
//!                                            --err-> error      <--stop---
//! any --disconnect--> disconnected
//! ```
//!
//! Every transition updates the status field and calls each status listener
//! synchronously before the operation returns.

use crate::adapter::EegAdapter;
use crate::broadcast::{Broadcaster, Listener, Subscription};
use crate::error::ManagerError;
use crate::types::{ConnectionStatus, DeviceInfo, EegFrame};

pub struct DeviceManager {
    status: ConnectionStatus,
    adapter: Option<Box<dyn EegAdapter>>,
    device: Option<DeviceInfo>,
    /// Forwards the adapter's frames to `frames`
    relay: Option<Subscription>,
    status_listeners: Broadcaster<ConnectionStatus>,
    frames: Broadcaster<EegFrame>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            adapter: None,
            device: None,
            relay: None,
            status_listeners: Broadcaster::new(),
            frames: Broadcaster::new(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// The connected device, if any.
    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        log::debug!("Device status: {} -> {}", self.status, status);
        self.status = status;
        self.status_listeners.emit(&status);
    }

    /// Attach and connect `adapter`.
    ///
    /// Rejected without side effects unless the manager is disconnected or
    /// in the error state.
    pub async fn connect(
        &mut self,
        mut adapter: Box<dyn EegAdapter>,
    ) -> Result<DeviceInfo, ManagerError> {
        match self.status {
            ConnectionStatus::Disconnected | ConnectionStatus::Error => {}
            other => return Err(ManagerError::AlreadyConnected(other)),
        }

        self.set_status(ConnectionStatus::Connecting);
        match adapter.connect().await {
            Ok(info) => {
                log::info!("Connected to {} ({})", info.name, info.device_type);
                let frames = self.frames.clone();
                self.relay = Some(adapter.on_data(Box::new(move |frame| frames.emit(frame))));
                self.adapter = Some(adapter);
                self.device = Some(info.clone());
                self.set_status(ConnectionStatus::Connected);
                Ok(info)
            }
            Err(e) => {
                log::error!("Connection failed: {e}");
                if let Err(stop_err) = adapter.stop().await {
                    log::debug!("Cleanup after failed connect: {stop_err}");
                }
                self.set_status(ConnectionStatus::Error);
                Err(e.into())
            }
        }
    }

    /// Start the adapter's data flow. Requires `connected`.
    pub async fn start_streaming(&mut self) -> Result<(), ManagerError> {
        let adapter = match (self.status, self.adapter.as_mut()) {
            (ConnectionStatus::Connected, Some(adapter)) => adapter,
            (status, _) => return Err(ManagerError::NotConnected(status)),
        };
        adapter.start().await?;
        self.set_status(ConnectionStatus::Streaming);
        Ok(())
    }

    /// Pause the data flow and return to `connected`.
    pub async fn stop_streaming(&mut self) -> Result<(), ManagerError> {
        let adapter = match (self.status, self.adapter.as_mut()) {
            (ConnectionStatus::Streaming, Some(adapter)) => adapter,
            (status, _) => return Err(ManagerError::NotStreaming(status)),
        };
        if let Err(e) = adapter.pause().await {
            log::warn!("Pausing adapter failed: {e}");
        }
        self.set_status(ConnectionStatus::Connected);
        Ok(())
    }

    /// Release the adapter. Always succeeds.
    pub async fn disconnect(&mut self) {
        if let Some(relay) = self.relay.take() {
            relay.unsubscribe();
        }
        if let Some(mut adapter) = self.adapter.take() {
            if let Err(e) = adapter.stop().await {
                log::warn!("Adapter stop failed during disconnect: {e}");
            }
        }
        if let Some(device) = self.device.take() {
            log::info!("Released {}", device.name);
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Listen for status transitions.
    pub fn on_status(&self, listener: Listener<ConnectionStatus>) -> Subscription {
        self.status_listeners.subscribe(listener)
    }

    /// Listen for frames from whichever adapter is attached now or later.
    pub fn on_data(&self, listener: Listener<EegFrame>) -> Subscription {
        self.frames.subscribe(listener)
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}
