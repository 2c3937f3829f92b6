//! Gymbook CLI Library
//!
//! Command-line host for the booking run: argument parsing, remembered
//! settings, terminal progress and exit codes.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
mod output;
mod runner;
mod settings;

pub use commands::{
    BookArgs, Cli, ColorArg, Commands, CountdownArgs, SettingsAction, SettingsArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{countdown_text, Reporter, COUNTDOWN_TICK};
#[cfg(feature = "browser")]
pub use runner::launch_options;
pub use runner::{parse_day_attempts, BookingRequest, BookingRunner, EXIT_CANCELED};
pub use settings::{Settings, DEFAULT_SETTINGS_PATH, MASK};
