//! CLI command definitions using clap

use crate::settings::DEFAULT_SETTINGS_PATH;
use clap::{Parser, Subcommand, ValueEnum};
use gymbook::{DEFAULT_SCREENSHOT_PATH, DEFAULT_START_EARLY_SECONDS};
use std::path::PathBuf;

/// Gymbook: book a CUS Torino Free Fitness slot, optionally right at midnight
#[derive(Parser, Debug)]
#[command(name = "gymbook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only the final status)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Remembered settings file
    #[arg(long, global = true, env = "GYMBOOK_SETTINGS", default_value = DEFAULT_SETTINGS_PATH)]
    pub settings: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one booking attempt
    Book(BookArgs),

    /// Show the time left until midnight
    Countdown(CountdownArgs),

    /// Show or clear remembered settings
    Settings(SettingsArgs),
}

/// Arguments for the book command.
///
/// Anything not given falls back to the remembered settings.
#[derive(Parser, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct BookArgs {
    /// Portal username
    #[arg(short, long, env = "GYMBOOK_USERNAME")]
    pub username: Option<String>,

    /// Portal password
    #[arg(short, long, env = "GYMBOOK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Day of month to book (1-31)
    #[arg(short, long)]
    pub day: Option<String>,

    /// Month to book (1-12), current year
    #[arg(short, long)]
    pub month: Option<String>,

    /// Preferred slot: 0 = 14:00, 1 = 15:30, 2 = 17:00, 3 = 18:30
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub slot: Option<u8>,

    /// Fall back to the other slots when the preferred one is full
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub try_other_slots: Option<bool>,

    /// Times to try clicking the day (invalid values mean 5)
    #[arg(long)]
    pub day_attempts: Option<String>,

    /// Wait until shortly before midnight before picking the day
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub wait_midnight: Option<bool>,

    /// Seconds before midnight at which the wait ends
    #[arg(long, default_value_t = DEFAULT_START_EARLY_SECONDS)]
    pub start_early: u32,

    /// Screenshot written after confirming
    #[arg(long, default_value = DEFAULT_SCREENSHOT_PATH)]
    pub screenshot: PathBuf,

    /// Remember these values in the settings file
    #[arg(long)]
    pub remember: bool,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Disable the chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chromium executable (auto-detected when absent)
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<PathBuf>,
}

/// Arguments for the countdown command
#[derive(Parser, Debug, Default)]
pub struct CountdownArgs {
    /// Keep updating until midnight (Ctrl-C to stop)
    #[arg(short, long)]
    pub follow: bool,
}

/// Arguments for the settings command
#[derive(Parser, Debug)]
pub struct SettingsArgs {
    /// What to do (default: show)
    #[command(subcommand)]
    pub action: Option<SettingsAction>,
}

/// Settings actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    /// Print remembered values (password masked)
    Show,
    /// Delete the settings file
    Clear,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
