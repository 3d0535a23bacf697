//! Gattling CLI library
//!
//! Components of the command-line BLE central: argument parsing, session
//! wiring and per-subcommand flows.

pub mod app;
pub mod cli;
pub mod commands;
pub mod error;

pub use app::GattlingApp;
pub use cli::{Cli, Commands};
pub use error::{CliError, Result};
