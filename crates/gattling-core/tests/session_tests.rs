//! Integration tests for the session sequencer
//!
//! These drive a spawned sequencer task end to end through its public handle
//! while scripting the transport side by hand: the test holds the
//! `TransportLink`, asserts on the effects the sequencer emits and injects
//! the events a real radio would produce.

use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use gattling_core::{
    spawn, AppEvent, CharProps, CharacteristicDescriptor, CoreError, DeviceAddress, Effect,
    ErrorKind, Event, OperationRequest, Rssi, ServiceDescriptor, SessionConfig, SessionState,
    TransportLink,
};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const SVC: Uuid = Uuid::from_u128(0x1800);
const CHR: Uuid = Uuid::from_u128(0x2a00);

fn addr(s: &str) -> DeviceAddress {
    DeviceAddress::new(s)
}

fn test_services() -> Vec<ServiceDescriptor> {
    vec![ServiceDescriptor {
        uuid: SVC,
        characteristics: vec![CharacteristicDescriptor {
            uuid: CHR,
            properties: CharProps::READ.union(CharProps::WRITE),
        }],
    }]
}

async fn next_effect(link: &mut TransportLink) -> Effect {
    timeout(Duration::from_millis(500), link.effect_receiver.recv())
        .await
        .expect("effect should arrive within timeout")
        .expect("effect channel should stay open")
}

async fn no_effect(link: &mut TransportLink) {
    let outcome = timeout(Duration::from_millis(100), link.effect_receiver.recv()).await;
    assert!(outcome.is_err(), "expected no effect, got {:?}", outcome);
}

async fn next_app_event(
    app_events: &mut gattling_core::AppEventReceiver,
) -> AppEvent {
    timeout(Duration::from_millis(500), app_events.recv())
        .await
        .expect("app event should arrive within timeout")
        .expect("app event channel should stay open")
}

async fn inject(link: &TransportLink, event: Event) {
    link.event_sender
        .send(event)
        .await
        .expect("event channel should stay open");
}

async fn advertise(link: &TransportLink, address: &DeviceAddress, rssi: i16) {
    inject(
        link,
        Event::AdvertisementReceived {
            address: address.clone(),
            name: Some("Thermometer".into()),
            rssi: Rssi::new(rssi),
        },
    )
    .await;
}

/// Walk a freshly spawned session through advertisement, connect and
/// discovery, consuming every effect and app event along the way
async fn bring_to_ready(
    handle: &gattling_core::SessionHandle,
    app_events: &mut gattling_core::AppEventReceiver,
    link: &mut TransportLink,
    address: &DeviceAddress,
) {
    advertise(link, address, -60).await;
    assert!(matches!(
        next_app_event(app_events).await,
        AppEvent::DeviceAdded { .. }
    ));

    handle.select_device(address.clone()).await.unwrap();
    assert_eq!(
        next_effect(link).await,
        Effect::Connect {
            address: address.clone()
        }
    );
    assert!(matches!(
        next_app_event(app_events).await,
        AppEvent::ConnectionStateChanged {
            state: SessionState::Connecting,
            ..
        }
    ));

    inject(
        link,
        Event::Connected {
            address: address.clone(),
        },
    )
    .await;
    assert_eq!(
        next_effect(link).await,
        Effect::DiscoverServices {
            address: address.clone()
        }
    );
    assert!(matches!(
        next_app_event(app_events).await,
        AppEvent::ConnectionStateChanged {
            state: SessionState::Connected,
            ..
        }
    ));
    assert!(matches!(
        next_app_event(app_events).await,
        AppEvent::ConnectionStateChanged {
            state: SessionState::Discovering,
            ..
        }
    ));

    inject(
        link,
        Event::ServicesDiscovered {
            address: address.clone(),
            services: test_services(),
        },
    )
    .await;
    assert!(matches!(
        next_app_event(app_events).await,
        AppEvent::ConnectionStateChanged {
            state: SessionState::Ready,
            ..
        }
    ));
    assert!(matches!(
        next_app_event(app_events).await,
        AppEvent::CatalogReady {
            service_count: 1,
            ..
        }
    ));
}

// ----------------------------------------------------------------------------
// Scanning
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_scan_dedup_added_then_updated() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());

    handle.start_scan().await.unwrap();
    assert_eq!(next_effect(&mut link).await, Effect::StartScan);
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ScanStateChanged { scanning: true }
    ));

    let address = addr("AA:BB:CC:DD:EE:FF");
    advertise(&link, &address, -70).await;
    advertise(&link, &address, -55).await;

    match next_app_event(&mut app_events).await {
        AppEvent::DeviceAdded { device } => {
            assert_eq!(device.rssi, Rssi::new(-70));
            assert_eq!(device.display_name(), "Thermometer");
        }
        other => panic!("expected DeviceAdded, got {:?}", other),
    }
    match next_app_event(&mut app_events).await {
        AppEvent::DeviceUpdated { device } => assert_eq!(device.rssi, Rssi::new(-55)),
        other => panic!("expected DeviceUpdated, got {:?}", other),
    }

    let devices = handle.devices().await.unwrap();
    assert_eq!(devices.len(), 1);
}

#[tokio::test]
async fn test_scan_window_auto_stops() {
    let config = SessionConfig::default().with_scan_window(Duration::from_millis(50));
    let (handle, mut app_events, mut link, _join) = spawn(config);

    handle.start_scan().await.unwrap();
    assert_eq!(next_effect(&mut link).await, Effect::StartScan);
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ScanStateChanged { scanning: true }
    ));

    // The window closes itself without a StopScan command.
    assert_eq!(next_effect(&mut link).await, Effect::StopScan);
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ScanStateChanged { scanning: false }
    ));
}

#[tokio::test]
async fn test_scan_failure_reported() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());

    handle.start_scan().await.unwrap();
    assert_eq!(next_effect(&mut link).await, Effect::StartScan);
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ScanStateChanged { scanning: true }
    ));

    inject(&link, Event::ScanFailed { code: 2 }).await;
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ScanFailed {
            kind: ErrorKind::ScanFailed(2)
        }
    ));
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ScanStateChanged { scanning: false }
    ));
    // The transport already gave up; no StopScan effect is owed.
    no_effect(&mut link).await;
}

#[tokio::test]
async fn test_scan_refused_when_transport_unavailable() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());

    inject(&link, Event::AdapterStateChanged { available: false }).await;
    // Adapter loss produces no app event while idle; give the sequencer a
    // beat to process it before the scan command lands.
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.start_scan().await.unwrap();

    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ScanFailed {
            kind: ErrorKind::TransportUnavailable
        }
    ));
    no_effect(&mut link).await;
}

// ----------------------------------------------------------------------------
// Connection Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_discovery_flow_reaches_ready() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let address = addr("AA:BB:CC:DD:EE:FF");

    bring_to_ready(&handle, &mut app_events, &mut link, &address).await;

    let catalog = handle.catalog(address).await.unwrap();
    assert_eq!(catalog.unwrap().service_count(), 1);
}

#[tokio::test]
async fn test_select_unknown_device_reports_not_found() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());

    handle.select_device(addr("00:00:00:00:00:00")).await.unwrap();
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::SessionError {
            kind: ErrorKind::NotFound,
            ..
        }
    ));
    no_effect(&mut link).await;
}

#[tokio::test]
async fn test_select_retry_while_connecting() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let address = addr("AA:BB:CC:DD:EE:FF");

    advertise(&link, &address, -60).await;
    next_app_event(&mut app_events).await;

    handle.select_device(address.clone()).await.unwrap();
    assert!(matches!(next_effect(&mut link).await, Effect::Connect { .. }));
    next_app_event(&mut app_events).await; // Connecting

    // A second click while the attempt is pending retries the connect.
    handle.select_device(address.clone()).await.unwrap();
    assert!(matches!(next_effect(&mut link).await, Effect::Connect { .. }));

    inject(
        &link,
        Event::ConnectFailed {
            address: address.clone(),
            reason: "timed out".into(),
        },
    )
    .await;
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ConnectionStateChanged {
            state: SessionState::Idle,
            ..
        }
    ));
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::SessionError {
            kind: ErrorKind::ConnectFailed,
            ..
        }
    ));

    // The binding survives the failure, so another click retries.
    handle.select_device(address).await.unwrap();
    assert!(matches!(next_effect(&mut link).await, Effect::Connect { .. }));
}

#[tokio::test]
async fn test_select_other_device_refused_while_busy() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let first = addr("AA:AA:AA:AA:AA:AA");
    let second = addr("BB:BB:BB:BB:BB:BB");

    advertise(&link, &first, -60).await;
    advertise(&link, &second, -70).await;
    next_app_event(&mut app_events).await;
    next_app_event(&mut app_events).await;

    handle.select_device(first).await.unwrap();
    assert!(matches!(next_effect(&mut link).await, Effect::Connect { .. }));
    next_app_event(&mut app_events).await; // Connecting

    handle.select_device(second.clone()).await.unwrap();
    match next_app_event(&mut app_events).await {
        AppEvent::SessionError { address, kind } => {
            assert_eq!(address, second);
            assert_eq!(kind, ErrorKind::SessionBusy);
        }
        other => panic!("expected SessionError, got {:?}", other),
    }
    no_effect(&mut link).await;
}

#[tokio::test]
async fn test_select_stops_active_scan_first() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let address = addr("AA:BB:CC:DD:EE:FF");

    handle.start_scan().await.unwrap();
    assert_eq!(next_effect(&mut link).await, Effect::StartScan);
    next_app_event(&mut app_events).await; // scanning=true

    advertise(&link, &address, -60).await;
    next_app_event(&mut app_events).await; // DeviceAdded

    handle.select_device(address.clone()).await.unwrap();
    assert_eq!(next_effect(&mut link).await, Effect::StopScan);
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ScanStateChanged { scanning: false }
    ));
    assert_eq!(next_effect(&mut link).await, Effect::Connect { address });
}

#[tokio::test]
async fn test_unsolicited_disconnect_clears_catalog() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let address = addr("AA:BB:CC:DD:EE:FF");

    bring_to_ready(&handle, &mut app_events, &mut link, &address).await;

    inject(
        &link,
        Event::Disconnected {
            address: address.clone(),
        },
    )
    .await;
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ConnectionStateChanged {
            state: SessionState::Idle,
            ..
        }
    ));

    // The catalog does not survive the connection epoch.
    assert!(handle.catalog(address.clone()).await.unwrap().is_none());

    // The device record itself is retained for reconnection.
    let devices = handle.devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].state, SessionState::Idle);
}

// ----------------------------------------------------------------------------
// Operations
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_refused_when_not_ready() {
    let (handle, _app_events, mut link, _join) = spawn(SessionConfig::default());

    let pending = handle
        .submit(OperationRequest::Read {
            service: SVC,
            characteristic: CHR,
        })
        .await
        .unwrap();

    match pending.resolve().await {
        Err(CoreError::Operation(ErrorKind::NotConnected)) => {}
        other => panic!("expected NotConnected, got {:?}", other),
    }
    // Refused submissions never reach the transport.
    no_effect(&mut link).await;
}

#[tokio::test]
async fn test_submit_unknown_characteristic_refused() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let address = addr("AA:BB:CC:DD:EE:FF");
    bring_to_ready(&handle, &mut app_events, &mut link, &address).await;

    let pending = handle
        .submit(OperationRequest::Read {
            service: SVC,
            characteristic: Uuid::from_u128(0xbeef),
        })
        .await
        .unwrap();

    match pending.resolve().await {
        Err(CoreError::Operation(ErrorKind::NotFound)) => {}
        other => panic!("expected NotFound, got {:?}", other),
    }
    no_effect(&mut link).await;
}

#[tokio::test]
async fn test_operations_dispatch_fifo_one_in_flight() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let address = addr("AA:BB:CC:DD:EE:FF");
    bring_to_ready(&handle, &mut app_events, &mut link, &address).await;

    let read = handle
        .submit(OperationRequest::Read {
            service: SVC,
            characteristic: CHR,
        })
        .await
        .unwrap();
    let write = handle
        .submit(OperationRequest::Write {
            service: SVC,
            characteristic: CHR,
            payload: vec![0x01, 0x02],
        })
        .await
        .unwrap();

    let read_id = match next_effect(&mut link).await {
        Effect::ReadCharacteristic { id, .. } => id,
        other => panic!("expected read effect first, got {:?}", other),
    };
    // The write waits for the read to complete.
    no_effect(&mut link).await;

    inject(
        &link,
        Event::OperationCompleted {
            id: read_id,
            result: Ok(Some(vec![0x42])),
        },
    )
    .await;
    assert_eq!(read.resolve().await.unwrap(), Some(vec![0x42]));
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::OperationResult { .. }
    ));

    let write_id = match next_effect(&mut link).await {
        Effect::WriteCharacteristic { id, payload, .. } => {
            assert_eq!(payload, vec![0x01, 0x02]);
            id
        }
        other => panic!("expected write effect second, got {:?}", other),
    };
    inject(
        &link,
        Event::OperationCompleted {
            id: write_id,
            result: Ok(None),
        },
    )
    .await;
    assert_eq!(write.resolve().await.unwrap(), None);
}

#[tokio::test]
async fn test_disconnect_fails_outstanding_operations() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let address = addr("AA:BB:CC:DD:EE:FF");
    bring_to_ready(&handle, &mut app_events, &mut link, &address).await;

    let read = handle
        .submit(OperationRequest::Read {
            service: SVC,
            characteristic: CHR,
        })
        .await
        .unwrap();
    let write = handle
        .submit(OperationRequest::Write {
            service: SVC,
            characteristic: CHR,
            payload: vec![0x01],
        })
        .await
        .unwrap();
    assert!(matches!(
        next_effect(&mut link).await,
        Effect::ReadCharacteristic { .. }
    ));

    handle.disconnect().await.unwrap();

    // Both operations fail before the link teardown completes.
    for _ in 0..2 {
        match next_app_event(&mut app_events).await {
            AppEvent::OperationResult { result, .. } => {
                assert_eq!(result, Err(ErrorKind::ConnectionLost));
            }
            other => panic!("expected OperationResult, got {:?}", other),
        }
    }
    assert_eq!(
        next_effect(&mut link).await,
        Effect::Disconnect {
            address: address.clone()
        }
    );
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ConnectionStateChanged {
            state: SessionState::Disconnecting,
            ..
        }
    ));

    assert!(matches!(
        read.resolve().await,
        Err(CoreError::Operation(ErrorKind::ConnectionLost))
    ));
    assert!(matches!(
        write.resolve().await,
        Err(CoreError::Operation(ErrorKind::ConnectionLost))
    ));

    inject(&link, Event::Disconnected { address }).await;
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ConnectionStateChanged {
            state: SessionState::Idle,
            ..
        }
    ));
    // The queued write never reaches the transport.
    no_effect(&mut link).await;
}

#[tokio::test]
async fn test_link_loss_mid_operation_fails_queue() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let address = addr("AA:BB:CC:DD:EE:FF");
    bring_to_ready(&handle, &mut app_events, &mut link, &address).await;

    let read = handle
        .submit(OperationRequest::Read {
            service: SVC,
            characteristic: CHR,
        })
        .await
        .unwrap();
    let write = handle
        .submit(OperationRequest::Write {
            service: SVC,
            characteristic: CHR,
            payload: vec![0x01],
        })
        .await
        .unwrap();
    assert!(matches!(
        next_effect(&mut link).await,
        Effect::ReadCharacteristic { .. }
    ));

    // The peripheral drops the link on its own while the read is in flight.
    inject(
        &link,
        Event::Disconnected {
            address: address.clone(),
        },
    )
    .await;

    for _ in 0..2 {
        match next_app_event(&mut app_events).await {
            AppEvent::OperationResult { result, .. } => {
                assert_eq!(result, Err(ErrorKind::ConnectionLost));
            }
            other => panic!("expected OperationResult, got {:?}", other),
        }
    }
    assert!(matches!(
        next_app_event(&mut app_events).await,
        AppEvent::ConnectionStateChanged {
            state: SessionState::Idle,
            ..
        }
    ));

    assert!(matches!(
        read.resolve().await,
        Err(CoreError::Operation(ErrorKind::ConnectionLost))
    ));
    assert!(matches!(
        write.resolve().await,
        Err(CoreError::Operation(ErrorKind::ConnectionLost))
    ));

    // The queued write never reaches the transport.
    no_effect(&mut link).await;
    assert!(handle.catalog(address).await.unwrap().is_none());
}

#[tokio::test]
async fn test_notifications_flow_out_of_band() {
    let (handle, mut app_events, mut link, _join) = spawn(SessionConfig::default());
    let address = addr("AA:BB:CC:DD:EE:FF");
    bring_to_ready(&handle, &mut app_events, &mut link, &address).await;

    let pending = handle
        .submit(OperationRequest::Read {
            service: SVC,
            characteristic: CHR,
        })
        .await
        .unwrap();
    let id = match next_effect(&mut link).await {
        Effect::ReadCharacteristic { id, .. } => id,
        other => panic!("expected read effect, got {:?}", other),
    };

    // A notification arriving mid-operation does not consume the slot.
    inject(
        &link,
        Event::NotificationReceived {
            service: Some(SVC),
            characteristic: CHR,
            value: vec![0x99],
        },
    )
    .await;
    match next_app_event(&mut app_events).await {
        AppEvent::NotificationReceived { value, .. } => assert_eq!(value, vec![0x99]),
        other => panic!("expected NotificationReceived, got {:?}", other),
    }

    inject(
        &link,
        Event::OperationCompleted {
            id,
            result: Ok(Some(vec![0x01])),
        },
    )
    .await;
    assert_eq!(pending.resolve().await.unwrap(), Some(vec![0x01]));
}
