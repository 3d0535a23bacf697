//! btleplug-backed central transport task
//!
//! Executes the effects the session sequencer emits against a real adapter
//! and feeds radio callbacks back as events. The task is deliberately dumb:
//! it never decides whether a connect or an operation is allowed, it only
//! performs what the sequencer already serialized. Every operation effect is
//! answered with exactly one `Event::OperationCompleted` for its id.

use std::collections::HashMap;

use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gattling_core::{
    CharacteristicDescriptor, DeviceAddress, Effect, ErrorKind, Event, EventSender, OperationId,
    Rssi, ServiceDescriptor, TransportLink,
};

use crate::error::{BleResult, BleTransportError};
use crate::protocol::{char_props, operation_error, CCCD_UUID, SCAN_FAILED_INTERNAL_ERROR};

// ----------------------------------------------------------------------------
// Transport Task
// ----------------------------------------------------------------------------

/// The transport side of a session: one adapter, at most one connected
/// peripheral
pub struct BleCentralTask {
    adapter: Adapter,
    link: TransportLink,
    /// Addresses learned from advertisements, mapped to platform ids
    known: HashMap<DeviceAddress, PeripheralId>,
    /// The peripheral we currently hold a link to, if any
    connected: Option<(DeviceAddress, Peripheral)>,
}

/// Spawn a transport task on the first available adapter
pub async fn spawn(link: TransportLink) -> BleResult<JoinHandle<BleResult<()>>> {
    let task = BleCentralTask::new(link).await?;
    Ok(tokio::spawn(task.run()))
}

impl BleCentralTask {
    /// Bind to the first available BLE adapter
    pub async fn new(link: TransportLink) -> BleResult<Self> {
        let manager = Manager::new().await.map_err(BleTransportError::ManagerInit)?;
        let adapters = manager
            .adapters()
            .await
            .map_err(BleTransportError::ManagerInit)?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(BleTransportError::AdapterUnavailable)?;
        info!("BLE adapter initialized");

        Ok(Self {
            adapter,
            link,
            known: HashMap::new(),
            connected: None,
        })
    }

    /// Run until the sequencer drops its end of the effect channel
    pub async fn run(mut self) -> BleResult<()> {
        let mut central_events = self
            .adapter
            .events()
            .await
            .map_err(BleTransportError::EventStream)?;

        self.send_event(Event::AdapterStateChanged { available: true })
            .await?;

        loop {
            tokio::select! {
                effect = self.link.effect_receiver.recv() => {
                    match effect {
                        Some(effect) => self.process_effect(effect).await?,
                        None => {
                            info!("effect channel closed, transport stopping");
                            break;
                        }
                    }
                }

                central_event = central_events.next() => {
                    match central_event {
                        Some(event) => self.process_central_event(event).await?,
                        None => {
                            warn!("adapter event stream ended");
                            self.send_event(Event::AdapterStateChanged { available: false })
                                .await?;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Effect Execution
    // ------------------------------------------------------------------------

    async fn process_effect(&mut self, effect: Effect) -> BleResult<()> {
        debug!(?effect, "executing effect");
        match effect {
            Effect::StartScan => self.execute_start_scan().await,
            Effect::StopScan => self.execute_stop_scan().await,
            Effect::Connect { address } => self.execute_connect(address).await,
            Effect::Disconnect { address } => self.execute_disconnect(address).await,
            Effect::DiscoverServices { address } => self.execute_discover(address).await,
            Effect::ReadCharacteristic {
                id,
                service,
                characteristic,
            } => self.execute_read(id, service, characteristic).await,
            Effect::WriteCharacteristic {
                id,
                service,
                characteristic,
                payload,
            } => {
                self.execute_write(id, service, characteristic, payload)
                    .await
            }
            Effect::SetNotify {
                id,
                service,
                characteristic,
                enable,
            } => {
                self.execute_set_notify(id, service, characteristic, enable)
                    .await
            }
        }
    }

    async fn execute_start_scan(&mut self) -> BleResult<()> {
        if let Err(e) = self.adapter.start_scan(ScanFilter::default()).await {
            warn!("failed to start scan: {}", e);
            return self
                .send_event(Event::ScanFailed {
                    code: SCAN_FAILED_INTERNAL_ERROR,
                })
                .await;
        }
        Ok(())
    }

    async fn execute_stop_scan(&mut self) -> BleResult<()> {
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("failed to stop scan: {}", e);
        }
        Ok(())
    }

    async fn execute_connect(&mut self, address: DeviceAddress) -> BleResult<()> {
        let peripheral = match self.lookup(&address).await {
            Some(peripheral) => peripheral,
            None => {
                return self
                    .send_event(Event::ConnectFailed {
                        address,
                        reason: "device not known to adapter".into(),
                    })
                    .await;
            }
        };

        // Success is driven by the connect result, not by the adapter's
        // DeviceConnected event, so exactly one callback fires per attempt.
        match peripheral.connect().await {
            Ok(()) => {
                info!(%address, "connected");
                self.connected = Some((address.clone(), peripheral));
                self.send_event(Event::Connected { address }).await
            }
            Err(e) => {
                warn!(%address, "connect failed: {}", e);
                self.send_event(Event::ConnectFailed {
                    address,
                    reason: e.to_string(),
                })
                .await
            }
        }
    }

    async fn execute_disconnect(&mut self, address: DeviceAddress) -> BleResult<()> {
        let peripheral = match &self.connected {
            Some((connected, peripheral)) if connected == &address => peripheral.clone(),
            _ => match self.lookup(&address).await {
                Some(peripheral) => peripheral,
                None => return Ok(()),
            },
        };

        // The Disconnected event flows back through the adapter's
        // DeviceDisconnected callback, covering unsolicited drops too.
        if let Err(e) = peripheral.disconnect().await {
            warn!(%address, "disconnect failed: {}", e);
            self.connected = None;
            return self.send_event(Event::Disconnected { address }).await;
        }
        Ok(())
    }

    async fn execute_discover(&mut self, address: DeviceAddress) -> BleResult<()> {
        let peripheral = match &self.connected {
            Some((connected, peripheral)) if connected == &address => peripheral.clone(),
            _ => {
                return self
                    .send_event(Event::DiscoveryFailed {
                        address,
                        reason: "not connected".into(),
                    })
                    .await;
            }
        };

        if let Err(e) = peripheral.discover_services().await {
            warn!(%address, "service discovery failed: {}", e);
            return self
                .send_event(Event::DiscoveryFailed {
                    address,
                    reason: e.to_string(),
                })
                .await;
        }

        let services: Vec<ServiceDescriptor> = peripheral
            .services()
            .into_iter()
            .map(|service| ServiceDescriptor {
                uuid: service.uuid,
                characteristics: service
                    .characteristics
                    .into_iter()
                    .map(|c| CharacteristicDescriptor {
                        uuid: c.uuid,
                        properties: char_props(c.properties),
                    })
                    .collect(),
            })
            .collect();

        self.spawn_notification_forwarder(&peripheral).await;
        self.send_event(Event::ServicesDiscovered { address, services })
            .await
    }

    async fn execute_read(
        &mut self,
        id: OperationId,
        service: uuid::Uuid,
        characteristic: uuid::Uuid,
    ) -> BleResult<()> {
        let result = match self.find_characteristic(service, characteristic) {
            Ok((peripheral, target)) => peripheral
                .read(&target)
                .await
                .map(Some)
                .map_err(|e| operation_error(&e)),
            Err(kind) => Err(kind),
        };
        self.send_event(Event::OperationCompleted { id, result })
            .await
    }

    async fn execute_write(
        &mut self,
        id: OperationId,
        service: uuid::Uuid,
        characteristic: uuid::Uuid,
        payload: Vec<u8>,
    ) -> BleResult<()> {
        let result = match self.find_characteristic(service, characteristic) {
            Ok((peripheral, target)) => peripheral
                .write(&target, &payload, WriteType::WithResponse)
                .await
                .map(|_| None)
                .map_err(|e| operation_error(&e)),
            Err(kind) => Err(kind),
        };
        self.send_event(Event::OperationCompleted { id, result })
            .await
    }

    async fn execute_set_notify(
        &mut self,
        id: OperationId,
        service: uuid::Uuid,
        characteristic: uuid::Uuid,
        enable: bool,
    ) -> BleResult<()> {
        let result = match self.find_characteristic(service, characteristic) {
            Ok((peripheral, target)) => {
                // Without the CCCD the peripheral cannot be configured to
                // push values, whatever the property bits claim.
                if !target.descriptors.iter().any(|d| d.uuid == CCCD_UUID) {
                    Err(ErrorKind::NotFound)
                } else if enable {
                    peripheral
                        .subscribe(&target)
                        .await
                        .map(|_| None)
                        .map_err(|e| operation_error(&e))
                } else {
                    peripheral
                        .unsubscribe(&target)
                        .await
                        .map(|_| None)
                        .map_err(|e| operation_error(&e))
                }
            }
            Err(kind) => Err(kind),
        };
        self.send_event(Event::OperationCompleted { id, result })
            .await
    }

    // ------------------------------------------------------------------------
    // Adapter Callbacks
    // ------------------------------------------------------------------------

    async fn process_central_event(&mut self, event: CentralEvent) -> BleResult<()> {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                self.handle_advertisement(id).await
            }
            CentralEvent::DeviceDisconnected(id) => {
                let address = match self.address_of(&id) {
                    Some(address) => address,
                    None => return Ok(()),
                };
                if matches!(&self.connected, Some((connected, _)) if connected == &address) {
                    self.connected = None;
                }
                self.send_event(Event::Disconnected { address }).await
            }
            _ => Ok(()),
        }
    }

    async fn handle_advertisement(&mut self, id: PeripheralId) -> BleResult<()> {
        let peripheral = match self.adapter.peripheral(&id).await {
            Ok(peripheral) => peripheral,
            Err(e) => {
                debug!("failed to resolve discovered peripheral: {}", e);
                return Ok(());
            }
        };
        let properties = match peripheral.properties().await {
            Ok(Some(properties)) => properties,
            _ => return Ok(()),
        };

        let address = DeviceAddress::new(properties.address.to_string());
        self.known.insert(address.clone(), id);

        self.send_event(Event::AdvertisementReceived {
            address,
            name: properties.local_name,
            rssi: Rssi::new(properties.rssi.unwrap_or(0)),
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn lookup(&self, address: &DeviceAddress) -> Option<Peripheral> {
        let id = self.known.get(address)?;
        self.adapter.peripheral(id).await.ok()
    }

    fn address_of(&self, id: &PeripheralId) -> Option<DeviceAddress> {
        self.known
            .iter()
            .find(|(_, known_id)| *known_id == id)
            .map(|(address, _)| address.clone())
    }

    /// Resolve an operation target against the connected peripheral's
    /// attribute table
    fn find_characteristic(
        &self,
        service: uuid::Uuid,
        characteristic: uuid::Uuid,
    ) -> Result<(Peripheral, Characteristic), ErrorKind> {
        let (_, peripheral) = self.connected.as_ref().ok_or(ErrorKind::NotConnected)?;
        let target = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == characteristic)
            .ok_or(ErrorKind::NotFound)?;
        Ok((peripheral.clone(), target))
    }

    /// Forward value notifications for the lifetime of this connection epoch
    ///
    /// The stream ends when the peripheral disconnects, which also ends the
    /// forwarder task. A re-discovery after reconnect spawns a fresh one.
    async fn spawn_notification_forwarder(&self, peripheral: &Peripheral) {
        let notifications = match peripheral.notifications().await {
            Ok(notifications) => notifications,
            Err(e) => {
                warn!("failed to open notification stream: {}", e);
                return;
            }
        };

        // ValueNotification only carries the characteristic uuid; resolve the
        // owning service from the attribute table up front.
        let service_of: HashMap<uuid::Uuid, uuid::Uuid> = peripheral
            .characteristics()
            .into_iter()
            .map(|c| (c.uuid, c.service_uuid))
            .collect();

        let sender = self.link.event_sender.clone();
        tokio::spawn(forward_notifications(notifications, service_of, sender));
    }

    async fn send_event(&self, event: Event) -> BleResult<()> {
        self.link
            .event_sender
            .send(event)
            .await
            .map_err(|_| BleTransportError::ChannelClosed)
    }
}

async fn forward_notifications(
    mut notifications: std::pin::Pin<
        Box<dyn futures::Stream<Item = btleplug::api::ValueNotification> + Send>,
    >,
    service_of: HashMap<uuid::Uuid, uuid::Uuid>,
    sender: EventSender,
) {
    while let Some(notification) = notifications.next().await {
        let event = Event::NotificationReceived {
            service: service_of.get(&notification.uuid).copied(),
            characteristic: notification.uuid,
            value: notification.value,
        };
        if sender.send(event).await.is_err() {
            break;
        }
    }
    debug!("notification forwarder ended");
}
