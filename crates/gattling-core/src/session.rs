//! Session Sequencer
//!
//! The single logical actor that owns all mutable session state: the device
//! registry, the bound-session token, the scan coordinator and the operation
//! queue. Caller commands and transport events are interleaved through one
//! `select!` loop, so state-machine transitions and queue dispatch decisions
//! are totally ordered; no transport callback can be processed in the middle
//! of a toggle decision.
//!
//! Presentation code talks to the sequencer through a cloneable
//! [`SessionHandle`]; the transport implementation holds the
//! [`TransportLink`](crate::channels::TransportLink) returned by [`spawn`].

use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::catalog::ServiceCatalog;
use crate::channels::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_event_channel, AppEventReceiver, AppEventSender, CommandReceiver, CommandSender,
    EffectSender, EventReceiver, TransportLink,
};
use crate::config::SessionConfig;
use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::messages::{
    AppEvent, Command, Effect, Event, OperationRequest, OperationResponder, OperationResult,
};
use crate::queue::OperationQueue;
use crate::registry::{DeviceRegistry, DeviceSnapshot, Sighting};
use crate::scan::ScanCoordinator;
use crate::state::{BoundSession, SessionInput, SessionState};
use crate::types::{DeviceAddress, Rssi};

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

/// The sequencer task processing all commands and transport events
pub struct SessionTask {
    registry: DeviceRegistry,
    scan: ScanCoordinator,
    queue: OperationQueue,
    bound: Option<BoundSession>,
    transport_available: bool,
    command_receiver: CommandReceiver,
    event_receiver: EventReceiver,
    effect_sender: EffectSender,
    app_event_sender: AppEventSender,
    running: bool,
}

/// Spawn a session: sequencer task plus all channel endpoints
///
/// Returns the caller-facing handle, the app-event stream for presentation
/// observers, the transport's channel ends, and the sequencer's join handle.
pub fn spawn(
    config: SessionConfig,
) -> (
    SessionHandle,
    AppEventReceiver,
    TransportLink,
    JoinHandle<CoreResult<()>>,
) {
    let (command_sender, command_receiver) = create_command_channel(&config.channels);
    let (event_sender, event_receiver) = create_event_channel(&config.channels);
    let (effect_sender, effect_receiver) = create_effect_channel(&config.channels);
    let (app_event_sender, app_event_receiver) = create_app_event_channel(&config.channels);

    let mut task = SessionTask::new(
        config,
        command_receiver,
        event_receiver,
        effect_sender,
        app_event_sender,
    );
    let join = tokio::spawn(async move { task.run().await });

    (
        SessionHandle::new(command_sender),
        app_event_receiver,
        TransportLink::new(event_sender, effect_receiver),
        join,
    )
}

impl SessionTask {
    pub fn new(
        config: SessionConfig,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
    ) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            scan: ScanCoordinator::new(config.scan_window),
            queue: OperationQueue::new(),
            bound: None,
            transport_available: true,
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            running: true,
        }
    }

    /// Run the sequencer loop until shutdown or channel closure
    pub async fn run(&mut self) -> CoreResult<()> {
        info!("session task starting");

        while self.running {
            let scan_deadline = self.scan.deadline();
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => {
                            if let Err(e) = self.process_command(command).await {
                                error!("channel failure processing command, shutting down: {}", e);
                                self.running = false;
                            }
                        }
                        None => {
                            info!("command channel closed, shutting down");
                            break;
                        }
                    }
                }

                event = self.event_receiver.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(e) = self.process_event(event).await {
                                error!("channel failure processing event, shutting down: {}", e);
                                self.running = false;
                            }
                        }
                        None => {
                            info!("transport event channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = sleep_until(scan_deadline.unwrap_or_else(Instant::now)),
                    if scan_deadline.is_some() =>
                {
                    if let Err(e) = self.handle_scan_window_elapsed().await {
                        error!("channel failure on scan timeout, shutting down: {}", e);
                        self.running = false;
                    }
                }
            }
        }

        info!("session task stopped");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Command Processing
    // ------------------------------------------------------------------------

    async fn process_command(&mut self, command: Command) -> CoreResult<()> {
        match command {
            Command::StartScan => self.handle_start_scan().await,
            Command::StopScan => self.handle_stop_scan().await,
            Command::SelectDevice { address } => self.handle_select_device(address).await,
            Command::Disconnect => self.handle_disconnect_request().await,
            Command::SubmitOperation {
                request,
                respond_to,
            } => self.handle_submit(request, respond_to).await,
            Command::GetDevices { respond_to } => {
                let _ = respond_to.send(self.registry.snapshots());
                Ok(())
            }
            Command::GetCatalog {
                address,
                respond_to,
            } => {
                let catalog = self
                    .registry
                    .get(&address)
                    .and_then(|record| record.services().cloned());
                let _ = respond_to.send(catalog);
                Ok(())
            }
            Command::Shutdown => {
                self.running = false;
                Ok(())
            }
        }
    }

    async fn handle_start_scan(&mut self) -> CoreResult<()> {
        if !self.transport_available {
            warn!("scan requested with transport unavailable");
            return self
                .send_app_event(AppEvent::ScanFailed {
                    kind: ErrorKind::TransportUnavailable,
                })
                .await;
        }
        if let Some(effect) = self.scan.start(Instant::now()) {
            self.send_effect(effect).await?;
            self.send_app_event(AppEvent::ScanStateChanged { scanning: true })
                .await?;
        }
        Ok(())
    }

    async fn handle_stop_scan(&mut self) -> CoreResult<()> {
        if let Some(effect) = self.scan.stop() {
            self.send_effect(effect).await?;
            self.send_app_event(AppEvent::ScanStateChanged { scanning: false })
                .await?;
        }
        Ok(())
    }

    async fn handle_scan_window_elapsed(&mut self) -> CoreResult<()> {
        debug!("scan window elapsed, stopping scan");
        self.handle_stop_scan().await
    }

    /// Toggle semantics for a click on a device row
    ///
    /// This is the only place device identity and connection intent are
    /// reconciled. The whole decision runs inside the sequencer, so no
    /// transport callback can interleave with the state reads below.
    async fn handle_select_device(&mut self, address: DeviceAddress) -> CoreResult<()> {
        if !self.registry.contains(&address) {
            warn!(%address, "select for unknown device");
            return self
                .send_app_event(AppEvent::SessionError {
                    address,
                    kind: ErrorKind::NotFound,
                })
                .await;
        }

        // Selecting a device closes any open discovery window first.
        self.handle_stop_scan().await?;

        match self.bound.take() {
            None => {
                let session = BoundSession::bind(address);
                self.apply(session, SessionInput::ConnectRequested).await
            }
            Some(session) if session.address() == &address => {
                match session.state() {
                    // No live link yet: connect, or retry the attempt.
                    SessionState::Idle | SessionState::Connecting => {
                        self.apply(session, SessionInput::ConnectRequested).await
                    }
                    // A session exists: the same click means disconnect.
                    SessionState::Connected
                    | SessionState::Discovering
                    | SessionState::Ready => {
                        self.queue_teardown(ErrorKind::ConnectionLost).await?;
                        self.apply(session, SessionInput::DisconnectRequested).await
                    }
                    SessionState::Disconnecting => {
                        debug!(%address, "select ignored while disconnecting");
                        self.bound = Some(session);
                        Ok(())
                    }
                }
            }
            Some(session) => {
                if session.state().is_idle() {
                    // Stale binding from a failed attempt; rebind freely.
                    let fresh = BoundSession::bind(address);
                    self.apply(fresh, SessionInput::ConnectRequested).await
                } else {
                    let busy = session.address().clone();
                    self.bound = Some(session);
                    debug!(%address, bound = %busy, "connect refused, session busy");
                    self.send_app_event(AppEvent::SessionError {
                        address,
                        kind: ErrorKind::SessionBusy,
                    })
                    .await
                }
            }
        }
    }

    async fn handle_disconnect_request(&mut self) -> CoreResult<()> {
        match self.bound.take() {
            None => Ok(()),
            Some(session) if session.state().is_idle() => {
                // Nothing live; just drop the binding.
                Ok(())
            }
            Some(session) if session.state() == SessionState::Disconnecting => {
                self.bound = Some(session);
                Ok(())
            }
            Some(session) => {
                self.queue_teardown(ErrorKind::ConnectionLost).await?;
                self.apply(session, SessionInput::DisconnectRequested).await
            }
        }
    }

    async fn handle_submit(
        &mut self,
        request: OperationRequest,
        respond_to: OperationResponder,
    ) -> CoreResult<()> {
        let ready_address = match &self.bound {
            Some(session) if session.state() == SessionState::Ready => {
                session.address().clone()
            }
            _ => {
                let _ = respond_to.send(Err(ErrorKind::NotConnected));
                return Ok(());
            }
        };

        let catalog = self
            .registry
            .get(&ready_address)
            .and_then(|record| record.services());
        match catalog {
            Some(catalog) => {
                if let Err(kind) = catalog.find(request.service(), request.characteristic()) {
                    let _ = respond_to.send(Err(kind));
                    return Ok(());
                }
            }
            None => {
                let _ = respond_to.send(Err(ErrorKind::NotConnected));
                return Ok(());
            }
        }

        let id = self.queue.enqueue(request, respond_to);
        debug!(%id, pending = self.queue.pending_len(), "operation accepted");
        self.dispatch_queue().await
    }

    // ------------------------------------------------------------------------
    // Event Processing
    // ------------------------------------------------------------------------

    async fn process_event(&mut self, event: Event) -> CoreResult<()> {
        match event {
            Event::AdapterStateChanged { available } => {
                self.handle_adapter_state(available).await
            }
            Event::AdvertisementReceived {
                address,
                name,
                rssi,
            } => self.handle_advertisement(address, name, rssi).await,
            Event::ScanFailed { code } => self.handle_scan_failed(code).await,
            Event::Connected { address } => self.handle_connected(address).await,
            Event::ConnectFailed { address, reason } => {
                self.handle_connect_failed(address, reason).await
            }
            Event::Disconnected { address } => self.handle_disconnected(address).await,
            Event::ServicesDiscovered { address, services } => {
                self.handle_services_discovered(address, services).await
            }
            Event::DiscoveryFailed { address, reason } => {
                self.handle_discovery_failed(address, reason).await
            }
            Event::OperationCompleted { id, result } => {
                self.handle_operation_completed(id, result).await
            }
            Event::NotificationReceived {
                service,
                characteristic,
                value,
            } => {
                // Out-of-band: notifications never occupy a queue slot.
                self.send_app_event(AppEvent::NotificationReceived {
                    service,
                    characteristic,
                    value,
                })
                .await
            }
        }
    }

    async fn handle_adapter_state(&mut self, available: bool) -> CoreResult<()> {
        self.transport_available = available;
        if !available && self.scan.is_scanning() {
            self.scan.mark_failed();
            self.send_app_event(AppEvent::ScanFailed {
                kind: ErrorKind::TransportUnavailable,
            })
            .await?;
            self.send_app_event(AppEvent::ScanStateChanged { scanning: false })
                .await?;
        }
        Ok(())
    }

    async fn handle_advertisement(
        &mut self,
        address: DeviceAddress,
        name: Option<String>,
        rssi: Rssi,
    ) -> CoreResult<()> {
        let sighting = self.registry.observe(address.clone(), name, rssi);
        let snapshot = match self.registry.get(&address) {
            Some(record) => record.snapshot(),
            None => return Ok(()),
        };
        let app_event = match sighting {
            Sighting::Added => AppEvent::DeviceAdded { device: snapshot },
            Sighting::Updated => AppEvent::DeviceUpdated { device: snapshot },
        };
        self.send_app_event(app_event).await
    }

    async fn handle_scan_failed(&mut self, code: i32) -> CoreResult<()> {
        warn!(code, "transport reported scan failure");
        self.scan.mark_failed();
        self.send_app_event(AppEvent::ScanFailed {
            kind: ErrorKind::ScanFailed(code),
        })
        .await?;
        self.send_app_event(AppEvent::ScanStateChanged { scanning: false })
            .await
    }

    async fn handle_connected(&mut self, address: DeviceAddress) -> CoreResult<()> {
        match self.bound.take() {
            Some(session)
                if session.address() == &address
                    && session.state() == SessionState::Connecting =>
            {
                info!(%address, "connected, requesting service discovery");
                self.apply(session, SessionInput::TransportConnected).await?;
                if let Some(session) = self.bound.take() {
                    self.apply(session, SessionInput::DiscoveryStarted).await?;
                }
                Ok(())
            }
            other => {
                // Stale: a disconnect was requested or the binding moved on
                // before the transport's success callback arrived.
                debug!(%address, "ignoring connect callback for non-connecting session");
                self.bound = other;
                Ok(())
            }
        }
    }

    async fn handle_connect_failed(
        &mut self,
        address: DeviceAddress,
        reason: String,
    ) -> CoreResult<()> {
        match self.bound.take() {
            Some(session)
                if session.address() == &address
                    && session.state() == SessionState::Connecting =>
            {
                warn!(%address, %reason, "connection attempt failed");
                self.apply(session, SessionInput::TransportConnectFailed)
                    .await?;
                self.send_app_event(AppEvent::SessionError {
                    address,
                    kind: ErrorKind::ConnectFailed,
                })
                .await
            }
            other => {
                self.bound = other;
                Ok(())
            }
        }
    }

    async fn handle_disconnected(&mut self, address: DeviceAddress) -> CoreResult<()> {
        match self.bound.take() {
            Some(session) if session.address() == &address && !session.state().is_idle() => {
                info!(%address, from = %session.state(), "link closed");
                self.queue_teardown(ErrorKind::ConnectionLost).await?;
                self.registry.clear_services(&address);
                self.apply(session, SessionInput::TransportDisconnected).await
            }
            other => {
                debug!(%address, "ignoring disconnect for unbound address");
                self.bound = other;
                Ok(())
            }
        }
    }

    async fn handle_services_discovered(
        &mut self,
        address: DeviceAddress,
        services: Vec<crate::catalog::ServiceDescriptor>,
    ) -> CoreResult<()> {
        match self.bound.take() {
            Some(session)
                if session.address() == &address
                    && session.state() == SessionState::Discovering =>
            {
                let catalog = ServiceCatalog::new(services);
                let service_count = catalog.service_count();
                info!(%address, service_count, "service discovery complete");
                self.registry.attach_services(&address, catalog);
                self.apply(session, SessionInput::DiscoveryComplete).await?;
                self.send_app_event(AppEvent::CatalogReady {
                    address,
                    service_count,
                })
                .await
            }
            other => {
                debug!(%address, "ignoring discovery result for non-discovering session");
                self.bound = other;
                Ok(())
            }
        }
    }

    async fn handle_discovery_failed(
        &mut self,
        address: DeviceAddress,
        reason: String,
    ) -> CoreResult<()> {
        match self.bound.take() {
            Some(session)
                if session.address() == &address
                    && session.state() == SessionState::Discovering =>
            {
                warn!(%address, %reason, "service discovery failed, tearing down");
                self.send_app_event(AppEvent::SessionError {
                    address: address.clone(),
                    kind: ErrorKind::DiscoveryFailed,
                })
                .await?;
                self.queue_teardown(ErrorKind::ConnectionLost).await?;
                self.registry.clear_services(&address);
                self.apply(session, SessionInput::DiscoveryFailed).await
            }
            other => {
                self.bound = other;
                Ok(())
            }
        }
    }

    async fn handle_operation_completed(
        &mut self,
        id: crate::types::OperationId,
        result: OperationResult,
    ) -> CoreResult<()> {
        if let Some((id, request, result)) = self.queue.complete(id, result) {
            self.send_app_event(AppEvent::OperationResult {
                id,
                request,
                result,
            })
            .await?;
        }
        self.dispatch_queue().await
    }

    // ------------------------------------------------------------------------
    // Shared Helpers
    // ------------------------------------------------------------------------

    /// Apply a state-machine input, publish the resulting effects and the
    /// state change. Call sites gate on the current state, so an invalid
    /// transition here is a sequencer bug; the binding is dropped to keep
    /// the machine in a stable state.
    async fn apply(&mut self, session: BoundSession, input: SessionInput) -> CoreResult<()> {
        let address = session.address().clone();
        let previous = session.state();

        match session.transition(input) {
            Ok(transition) => {
                let state = transition
                    .session
                    .as_ref()
                    .map(|s| s.state())
                    .unwrap_or(SessionState::Idle);
                self.bound = transition.session;
                for effect in transition.effects {
                    self.send_effect(effect).await?;
                }
                if state != previous {
                    self.registry.set_state(&address, state);
                    self.send_app_event(AppEvent::ConnectionStateChanged { address, state })
                        .await?;
                }
                Ok(())
            }
            Err(invalid) => {
                error!(%address, %invalid, "rejected state transition");
                self.bound = None;
                self.registry.set_state(&address, SessionState::Idle);
                Ok(())
            }
        }
    }

    /// Fail every pending and in-flight operation, mirroring each
    /// resolution to presentation observers
    async fn queue_teardown(&mut self, kind: ErrorKind) -> CoreResult<()> {
        for (id, request, result) in self.queue.fail_all(kind) {
            self.send_app_event(AppEvent::OperationResult {
                id,
                request,
                result,
            })
            .await?;
        }
        Ok(())
    }

    /// Hand the next queued operation to the transport, if the slot is free
    async fn dispatch_queue(&mut self) -> CoreResult<()> {
        if let Some(effect) = self.queue.dispatch_next() {
            self.send_effect(effect).await?;
        }
        Ok(())
    }

    async fn send_effect(&mut self, effect: Effect) -> CoreResult<()> {
        self.effect_sender
            .send(effect)
            .await
            .map_err(|_| CoreError::EffectChannelClosed)
    }

    async fn send_app_event(&mut self, app_event: AppEvent) -> CoreResult<()> {
        self.app_event_sender
            .send(app_event)
            .await
            .map_err(|_| CoreError::AppEventChannelClosed)
    }
}

// ----------------------------------------------------------------------------
// Session Handle
// ----------------------------------------------------------------------------

/// Cloneable caller-facing API for a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: CommandSender,
}

impl SessionHandle {
    pub fn new(commands: CommandSender) -> Self {
        Self { commands }
    }

    /// Open a discovery window; failures arrive as `AppEvent::ScanFailed`
    pub async fn start_scan(&self) -> CoreResult<()> {
        self.send(Command::StartScan).await
    }

    /// Close the discovery window early
    pub async fn stop_scan(&self) -> CoreResult<()> {
        self.send(Command::StopScan).await
    }

    /// Toggle-select a device: connect, retry, or disconnect
    pub async fn select_device(&self, address: DeviceAddress) -> CoreResult<()> {
        self.send(Command::SelectDevice { address }).await
    }

    /// Tear down the active session
    pub async fn disconnect(&self) -> CoreResult<()> {
        self.send(Command::Disconnect).await
    }

    /// Submit a GATT operation; the returned handle resolves when the
    /// transport completes it (or when the session fails it)
    pub async fn submit(&self, request: OperationRequest) -> CoreResult<PendingOperation> {
        let (respond_to, receiver) = tokio::sync::oneshot::channel();
        self.send(Command::SubmitOperation {
            request,
            respond_to,
        })
        .await?;
        Ok(PendingOperation { receiver })
    }

    /// Snapshot of every device sighted this session
    pub async fn devices(&self) -> CoreResult<Vec<DeviceSnapshot>> {
        let (respond_to, receiver) = tokio::sync::oneshot::channel();
        self.send(Command::GetDevices { respond_to }).await?;
        receiver.await.map_err(|_| CoreError::SessionGone)
    }

    /// Service catalog for an address, if discovery has completed
    pub async fn catalog(&self, address: DeviceAddress) -> CoreResult<Option<ServiceCatalog>> {
        let (respond_to, receiver) = tokio::sync::oneshot::channel();
        self.send(Command::GetCatalog {
            address,
            respond_to,
        })
        .await?;
        receiver.await.map_err(|_| CoreError::SessionGone)
    }

    /// Stop the sequencer task
    pub async fn shutdown(&self) -> CoreResult<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> CoreResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::SessionGone)
    }
}

/// Future half of a submitted operation
#[derive(Debug)]
pub struct PendingOperation {
    receiver: tokio::sync::oneshot::Receiver<OperationResult>,
}

impl PendingOperation {
    /// Wait for the operation to resolve
    pub async fn resolve(self) -> CoreResult<Option<Vec<u8>>> {
        match self.receiver.await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(kind)) => Err(CoreError::Operation(kind)),
            Err(_) => Err(CoreError::SessionGone),
        }
    }
}
