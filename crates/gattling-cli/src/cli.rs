//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gattling", author, version, about = "BLE central session manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Scan window in seconds
    #[arg(long, default_value_t = 10)]
    pub scan_window: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for nearby peripherals and list them
    Scan,
    /// Connect to a device and print its service catalog
    Inspect {
        /// Device address (as shown by `scan`)
        address: String,
    },
    /// Read a characteristic value
    Read {
        /// Device address
        address: String,
        /// Service UUID (full, or 16-bit assigned number)
        #[arg(short, long)]
        service: String,
        /// Characteristic UUID (full, or 16-bit assigned number)
        #[arg(short, long)]
        characteristic: String,
    },
    /// Write a payload to a characteristic
    Write {
        /// Device address
        address: String,
        /// Service UUID (full, or 16-bit assigned number)
        #[arg(short, long)]
        service: String,
        /// Characteristic UUID (full, or 16-bit assigned number)
        #[arg(short, long)]
        characteristic: String,
        /// Payload as hex bytes, e.g. "01ff02"
        payload: String,
    },
    /// Subscribe to notifications and print values as they arrive
    Watch {
        /// Device address
        address: String,
        /// Service UUID (full, or 16-bit assigned number)
        #[arg(short, long)]
        service: String,
        /// Characteristic UUID (full, or 16-bit assigned number)
        #[arg(short, long)]
        characteristic: String,
        /// How long to listen, in seconds
        #[arg(short, long, default_value_t = 30)]
        duration: u64,
    },
}
