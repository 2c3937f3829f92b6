//! Gymbook: unattended booking for the CUS Torino Free Fitness portal
//!
//! Gymbook drives a real browser through the portal's reserved area: it logs
//! in, opens the Free Fitness popup, optionally waits until shortly before
//! midnight (when the next day's slots open), clicks the target day and then
//! ticks and confirms a slot, capturing a screenshot as evidence.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      GYMBOOK Architecture                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌──────────────┐    ┌──────────────────┐      │
//! │   │ RunConfig  │───►│ BookingRun   │───►│ BrowserSession   │      │
//! │   │ (fixed)    │    │ (stages)     │    │ (chromium/mock)  │      │
//! │   └────────────┘    └──────┬───────┘    └──────────────────┘      │
//! │                            │                                      │
//! │              ProgressLog ◄─┴─► CancellationToken                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gymbook::{BookingRun, Credentials, MockLauncher, MockScript, RunConfig, TargetDate};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> gymbook::GymbookResult<()> {
//! let config = RunConfig::builder(
//!     Credentials::new("user", "secret"),
//!     TargetDate::in_current_year(3, 14)?,
//! )
//! .build()?;
//!
//! let outcome = BookingRun::new(MockLauncher::new(MockScript::new()), config, CancellationToken::new())
//!     .execute()
//!     .await;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod booking;
#[cfg(feature = "browser")]
mod chromium;
mod clock;
mod config;
mod driver;
mod locator;
mod progress;
mod result;
pub mod site;
mod wait;

pub use booking::{BookingRun, Failure, FailureReason, RunOutcome, Stage};
#[cfg(feature = "browser")]
pub use chromium::{
    ChromiumLauncher, ChromiumSession, LaunchOptions, ANCHOR_ATTRIBUTE, DEFAULT_ARGS,
    DEFAULT_VIEWPORT,
};
pub use clock::{
    format_countdown, midnight_wait, seconds_until_next_midnight, Clock, FixedClock, SystemClock,
};
pub use config::{
    Credentials, RunConfig, RunConfigBuilder, Slot, TargetDate, Timings,
    DEFAULT_DAY_CLICK_ATTEMPTS, DEFAULT_SCREENSHOT_PATH, DEFAULT_START_EARLY_SECONDS,
};
pub use driver::{BrowserSession, Launcher, MockJournal, MockLauncher, MockScript, MockSession};
pub use locator::{DayTarget, Selector};
pub use progress::{LogLine, LogSink, MemorySink, ProgressLog};
pub use result::{GymbookError, GymbookResult};
pub use wait::{
    LoadState, WaitOptions, DEFAULT_ACTION_TIMEOUT_MS, DEFAULT_NAVIGATION_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
