//! Application wiring: session core, BLE transport and app-event plumbing

use tokio::task::JoinHandle;
use tracing::debug;

use gattling_core::{
    AppEvent, AppEventReceiver, CoreResult, DeviceAddress, DeviceSnapshot, ErrorKind,
    SessionConfig, SessionHandle, SessionState,
};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// A running session: the sequencer task, the transport task and the
/// caller-facing ends of their channels
pub struct GattlingApp {
    pub handle: SessionHandle,
    app_events: AppEventReceiver,
    core_task: JoinHandle<CoreResult<()>>,
    transport_task: JoinHandle<gattling_ble::BleResult<()>>,
}

impl GattlingApp {
    /// Spawn the session core and bind the BLE transport to it
    pub async fn new(config: SessionConfig) -> Result<Self> {
        let (handle, app_events, link, core_task) = gattling_core::spawn(config);
        let transport_task = gattling_ble::spawn(link).await?;

        Ok(Self {
            handle,
            app_events,
            core_task,
            transport_task,
        })
    }

    /// Next app event from the sequencer
    pub async fn next_app_event(&mut self) -> Result<AppEvent> {
        self.app_events.recv().await.ok_or(CliError::SessionEnded)
    }

    /// Scan until the target device is sighted, then stop scanning
    ///
    /// Errors with `DeviceNotFound` when the scan window closes without a
    /// sighting.
    pub async fn find_device(&mut self, address: &DeviceAddress) -> Result<DeviceSnapshot> {
        self.handle.start_scan().await?;
        loop {
            match self.next_app_event().await? {
                AppEvent::DeviceAdded { device } | AppEvent::DeviceUpdated { device }
                    if &device.address == address =>
                {
                    self.handle.stop_scan().await?;
                    return Ok(device);
                }
                AppEvent::ScanFailed { kind } => return Err(CliError::ScanFailed(kind)),
                AppEvent::ScanStateChanged { scanning: false } => {
                    return Err(CliError::DeviceNotFound {
                        address: address.to_string(),
                    });
                }
                other => debug!(?other, "ignored while searching"),
            }
        }
    }

    /// Select the device and wait for the session to become ready
    ///
    /// Returns the number of discovered services.
    pub async fn connect(&mut self, address: &DeviceAddress) -> Result<usize> {
        self.handle.select_device(address.clone()).await?;
        loop {
            match self.next_app_event().await? {
                AppEvent::CatalogReady { service_count, .. } => return Ok(service_count),
                AppEvent::SessionError { kind, .. } => return Err(CliError::Session(kind)),
                other => debug!(?other, "ignored while connecting"),
            }
        }
    }

    /// Tear the session down and wait for the link to close
    pub async fn disconnect(&mut self) -> Result<()> {
        self.handle.disconnect().await?;
        loop {
            match self.next_app_event().await? {
                AppEvent::ConnectionStateChanged {
                    state: SessionState::Idle,
                    ..
                } => return Ok(()),
                AppEvent::SessionError { kind: ErrorKind::ConnectionLost, .. } => return Ok(()),
                other => debug!(?other, "ignored while disconnecting"),
            }
        }
    }

    /// Stop both tasks
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await?;
        let _ = self.core_task.await;
        self.transport_task.abort();
        Ok(())
    }
}
