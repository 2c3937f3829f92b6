//! Booking runner: arguments plus remembered settings in, one run out

use crate::commands::BookArgs;
use crate::error::{CliError, CliResult};
use crate::output::{Reporter, COUNTDOWN_TICK};
use crate::settings::Settings;
use gymbook::{
    BookingRun, Clock, Credentials, Launcher, RunConfig, RunOutcome, Slot, SystemClock,
    TargetDate, DEFAULT_DAY_CLICK_ATTEMPTS,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exit code for a run canceled with Ctrl-C
pub const EXIT_CANCELED: u8 = 130;

/// Fully validated booking request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    /// Portal login
    pub credentials: Credentials,
    /// Day to book
    pub target: TargetDate,
    /// Preferred slot
    pub slot: Slot,
    /// Fall back to the other slots
    pub try_other_slots: bool,
    /// Day-click attempts
    pub day_attempts: u32,
    /// Wait for midnight first
    pub wait_midnight: bool,
    /// Seconds before midnight at which the wait ends
    pub start_early: u32,
    /// Screenshot path
    pub screenshot: PathBuf,
}

impl BookingRequest {
    /// Merge command-line arguments over remembered settings and validate.
    ///
    /// Username and password are required, day must be 1-31 and month 1-12.
    /// A missing, unparsable or non-positive attempt count becomes 5.
    pub fn resolve(args: &BookArgs, settings: &Settings) -> CliResult<Self> {
        let username = pick(args.username.as_deref(), settings.username.as_deref())
            .ok_or_else(|| CliError::invalid_argument("username is required"))?;
        let password = pick(args.password.as_deref(), settings.password.as_deref())
            .ok_or_else(|| CliError::invalid_argument("password is required"))?;
        let day = parse_bounded(
            "day",
            pick(args.day.as_deref(), settings.day.as_deref()),
            1,
            31,
        )?;
        let month = parse_bounded(
            "month",
            pick(args.month.as_deref(), settings.month.as_deref()),
            1,
            12,
        )?;

        let slot = match args.slot {
            Some(index) => Slot::from_index(usize::from(index)).unwrap_or_default(),
            None => settings
                .slot_idx
                .as_deref()
                .map(Slot::from_setting)
                .unwrap_or_default(),
        };

        Ok(Self {
            credentials: Credentials::new(username, password),
            target: TargetDate::in_current_year(month, day)?,
            slot,
            try_other_slots: args
                .try_other_slots
                .unwrap_or_else(|| Settings::flag(settings.try_other_slots.as_deref())),
            day_attempts: parse_day_attempts(
                pick(args.day_attempts.as_deref(), settings.day_attempts.as_deref()),
            ),
            wait_midnight: args
                .wait_midnight
                .unwrap_or_else(|| Settings::flag(settings.wait_midnight.as_deref())),
            start_early: args.start_early,
            screenshot: args.screenshot.clone(),
        })
    }

    /// Run configuration for the library
    pub fn run_config(&self) -> CliResult<RunConfig> {
        Ok(
            RunConfig::builder(self.credentials.clone(), self.target)
                .primary_slot(self.slot)
                .try_other_slots(self.try_other_slots)
                .day_click_attempts(self.day_attempts)
                .wait_for_midnight(self.wait_midnight)
                .start_early_seconds(self.start_early)
                .screenshot_path(self.screenshot.clone())
                .build()?,
        )
    }

    /// Values to remember
    #[must_use]
    pub fn to_settings(&self) -> Settings {
        Settings {
            username: Some(self.credentials.username().to_string()),
            password: Some(self.credentials.password().to_string()),
            day: Some(self.target.day().to_string()),
            month: Some(self.target.month().to_string()),
            slot_idx: Some(self.slot.index().to_string()),
            day_attempts: Some(self.day_attempts.to_string()),
            wait_midnight: Some(self.wait_midnight.to_string()),
            try_other_slots: Some(self.try_other_slots.to_string()),
        }
    }
}

fn pick<'a>(arg: Option<&'a str>, saved: Option<&'a str>) -> Option<&'a str> {
    let present = |v: Option<&'a str>| v.map(str::trim).filter(|s| !s.is_empty());
    present(arg).or_else(|| present(saved))
}

fn parse_bounded(name: &str, raw: Option<&str>, min: u32, max: u32) -> CliResult<u32> {
    let raw = raw.ok_or_else(|| CliError::invalid_argument(format!("{name} is required")))?;
    raw.parse::<u32>()
        .ok()
        .filter(|n| (min..=max).contains(n))
        .ok_or_else(|| {
            CliError::invalid_argument(format!(
                "{name} must be between {min} and {max}, got {raw:?}"
            ))
        })
}

/// Attempt count, falling back to the default for anything but a positive integer
#[must_use]
pub fn parse_day_attempts(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(DEFAULT_DAY_CLICK_ATTEMPTS)
}

/// Launch options for the requested browser flags
#[cfg(feature = "browser")]
#[must_use]
pub fn launch_options(args: &BookArgs) -> gymbook::LaunchOptions {
    let mut options = gymbook::LaunchOptions::default().with_headless(args.headless);
    if args.no_sandbox {
        options = options.with_no_sandbox();
    }
    if let Some(ref path) = args.chromium_path {
        options = options.with_chromium_path(path);
    }
    options
}

/// Drives one [`BookingRun`] and reports it on the terminal
#[derive(Clone)]
pub struct BookingRunner {
    reporter: Reporter,
    cancel: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for BookingRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookingRunner")
            .field("reporter", &self.reporter)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl BookingRunner {
    /// Create a runner
    #[must_use]
    pub fn new(reporter: Reporter) -> Self {
        Self {
            reporter,
            cancel: CancellationToken::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different clock for the midnight gate
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Token that cancels the run
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute a run to completion. The countdown spinner is shown only while
    /// the run waits for midnight.
    pub async fn run<L: Launcher + 'static>(&self, launcher: L, config: RunConfig) -> RunOutcome {
        self.reporter.status("Starting...");

        let ticker = if config.wait_for_midnight() {
            let reporter = self.reporter.clone();
            Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval(COUNTDOWN_TICK);
                loop {
                    interval.tick().await;
                    reporter.tick_countdown();
                }
            }))
        } else {
            None
        };

        let outcome = BookingRun::new(launcher, config, self.cancel.clone())
            .with_clock(Arc::clone(&self.clock))
            .with_sink(Arc::new(self.reporter.clone()))
            .execute()
            .await;

        if let Some(ticker) = ticker {
            ticker.abort();
        }
        self.reporter.stop_countdown();
        outcome
    }

    /// Report the outcome and turn it into an exit code
    pub fn finish(&self, outcome: RunOutcome) -> CliResult<u8> {
        match outcome {
            RunOutcome::Success { screenshot } => {
                self.reporter.status("Done");
                self.reporter.success(&format!(
                    "Booking flow finished; check the log above and {}",
                    screenshot.display()
                ));
                Ok(0)
            }
            RunOutcome::Canceled => {
                self.reporter.status("Canceled by user.");
                Ok(EXIT_CANCELED)
            }
            RunOutcome::Failed(failure) => Err(CliError::run(failure.to_string())),
        }
    }
}
