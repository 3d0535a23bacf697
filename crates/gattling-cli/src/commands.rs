//! Per-subcommand execution flows and terminal rendering

use std::time::Duration;

use tokio::time::{timeout, Instant};
use uuid::Uuid;

use gattling_core::{AppEvent, DeviceAddress, DeviceSnapshot, OperationRequest};

use crate::app::GattlingApp;
use crate::cli::Commands;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

pub struct CommandDispatcher;

impl CommandDispatcher {
    pub async fn execute(command: Commands, mut app: GattlingApp) -> Result<()> {
        let outcome = match command {
            Commands::Scan => Self::scan(&mut app).await,
            Commands::Inspect { address } => {
                Self::inspect(&mut app, DeviceAddress::new(address)).await
            }
            Commands::Read {
                address,
                service,
                characteristic,
            } => {
                Self::read(
                    &mut app,
                    DeviceAddress::new(address),
                    parse_uuid(&service)?,
                    parse_uuid(&characteristic)?,
                )
                .await
            }
            Commands::Write {
                address,
                service,
                characteristic,
                payload,
            } => {
                Self::write(
                    &mut app,
                    DeviceAddress::new(address),
                    parse_uuid(&service)?,
                    parse_uuid(&characteristic)?,
                    hex::decode(payload)?,
                )
                .await
            }
            Commands::Watch {
                address,
                service,
                characteristic,
                duration,
            } => {
                Self::watch(
                    &mut app,
                    DeviceAddress::new(address),
                    parse_uuid(&service)?,
                    parse_uuid(&characteristic)?,
                    Duration::from_secs(duration),
                )
                .await
            }
        };
        app.shutdown().await?;
        outcome
    }

    // ------------------------------------------------------------------------
    // Subcommands
    // ------------------------------------------------------------------------

    async fn scan(app: &mut GattlingApp) -> Result<()> {
        app.handle.start_scan().await?;
        println!("Scanning...");

        loop {
            match app.next_app_event().await? {
                AppEvent::DeviceAdded { device } => print_device(&device),
                AppEvent::ScanFailed { kind } => {
                    return Err(crate::error::CliError::ScanFailed(kind))
                }
                AppEvent::ScanStateChanged { scanning: false } => break,
                _ => {}
            }
        }

        let devices = app.handle.devices().await?;
        println!("{} device(s) found", devices.len());
        Ok(())
    }

    async fn inspect(app: &mut GattlingApp, address: DeviceAddress) -> Result<()> {
        let device = app.find_device(&address).await?;
        println!("Connecting to {} ({})...", device.display_name(), address);

        let service_count = app.connect(&address).await?;
        println!("{} service(s):", service_count);

        if let Some(catalog) = app.handle.catalog(address.clone()).await? {
            for service in catalog.services() {
                println!("  Service {}", service.uuid);
                for characteristic in &service.characteristics {
                    println!(
                        "    {}  [{}]",
                        characteristic.uuid,
                        characteristic.properties.labels()
                    );
                }
            }
        }

        app.disconnect().await
    }

    async fn read(
        app: &mut GattlingApp,
        address: DeviceAddress,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()> {
        app.find_device(&address).await?;
        app.connect(&address).await?;

        let pending = app
            .handle
            .submit(OperationRequest::Read {
                service,
                characteristic,
            })
            .await?;
        match pending.resolve().await? {
            Some(value) => {
                println!("hex:  {}", hex::encode(&value));
                println!("text: {}", String::from_utf8_lossy(&value));
            }
            None => println!("(empty)"),
        }

        app.disconnect().await
    }

    async fn write(
        app: &mut GattlingApp,
        address: DeviceAddress,
        service: Uuid,
        characteristic: Uuid,
        payload: Vec<u8>,
    ) -> Result<()> {
        app.find_device(&address).await?;
        app.connect(&address).await?;

        let pending = app
            .handle
            .submit(OperationRequest::Write {
                service,
                characteristic,
                payload,
            })
            .await?;
        pending.resolve().await?;
        println!("Write complete");

        app.disconnect().await
    }

    async fn watch(
        app: &mut GattlingApp,
        address: DeviceAddress,
        service: Uuid,
        characteristic: Uuid,
        duration: Duration,
    ) -> Result<()> {
        app.find_device(&address).await?;
        app.connect(&address).await?;

        let pending = app
            .handle
            .submit(OperationRequest::SetNotify {
                service,
                characteristic,
                enable: true,
            })
            .await?;
        pending.resolve().await?;
        println!("Listening for {} second(s)...", duration.as_secs());

        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let app_event = match timeout(remaining, app.next_app_event()).await {
                Ok(app_event) => app_event?,
                Err(_) => break,
            };
            if let AppEvent::NotificationReceived {
                characteristic: from,
                value,
                ..
            } = app_event
            {
                println!(
                    "{}  {}  ({})",
                    from,
                    hex::encode(&value),
                    String::from_utf8_lossy(&value)
                );
            }
        }

        let pending = app
            .handle
            .submit(OperationRequest::SetNotify {
                service,
                characteristic,
                enable: false,
            })
            .await?;
        pending.resolve().await?;

        app.disconnect().await
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn print_device(device: &DeviceSnapshot) {
    println!(
        "  {}  {}  {}",
        device.address,
        device.display_name(),
        device.rssi
    );
}

/// Parse a full UUID, or expand a bare 16-bit assigned number onto the
/// Bluetooth base UUID
fn parse_uuid(input: &str) -> std::result::Result<Uuid, uuid::Error> {
    if input.len() == 4 && input.chars().all(|c| c.is_ascii_hexdigit()) {
        let expanded = format!("0000{}-0000-1000-8000-00805f9b34fb", input);
        return Uuid::parse_str(&expanded);
    }
    Uuid::parse_str(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_uuid() {
        let parsed = parse_uuid("00001800-0000-1000-8000-00805f9b34fb").unwrap();
        assert_eq!(parsed, Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb));
    }

    #[test]
    fn test_parse_short_uuid_expands_to_base() {
        let parsed = parse_uuid("2a00").unwrap();
        assert_eq!(parsed, Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb));
    }

    #[test]
    fn test_parse_invalid_uuid() {
        assert!(parse_uuid("not-a-uuid").is_err());
    }
}
