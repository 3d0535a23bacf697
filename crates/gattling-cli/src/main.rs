//! Gattling CLI entry point

use std::time::Duration;

use clap::Parser;
use tracing::error;

use gattling_cli::{app::GattlingApp, cli::Cli, commands::CommandDispatcher, error::Result};
use gattling_core::SessionConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config =
        SessionConfig::default().with_scan_window(Duration::from_secs(cli.scan_window));

    let app = match GattlingApp::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start BLE transport: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = CommandDispatcher::execute(cli.command, app).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
