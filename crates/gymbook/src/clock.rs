//! Wall-clock access for the midnight gate.
//!
//! The run asks a [`Clock`] how long is left until the next local midnight, so
//! tests can pin that number with [`FixedClock`].

use chrono::{Local, NaiveDateTime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Source of "time until midnight"
pub trait Clock: Send + Sync {
    /// Seconds from now until the next local midnight (never negative)
    fn seconds_until_midnight(&self) -> f64;
}

/// Local system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn seconds_until_midnight(&self) -> f64 {
        seconds_until_next_midnight(Local::now().naive_local())
    }
}

/// Clock frozen at a given distance from midnight
#[derive(Debug, Default)]
pub struct FixedClock {
    millis: AtomicU64,
}

impl FixedClock {
    /// Clock with `seconds` left until midnight
    #[must_use]
    pub fn new(seconds: f64) -> Self {
        let clock = Self::default();
        clock.set(seconds);
        clock
    }

    /// Move the clock
    pub fn set(&self, seconds: f64) {
        let millis = (seconds.max(0.0) * 1000.0).round() as u64;
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn seconds_until_midnight(&self) -> f64 {
        self.millis.load(Ordering::SeqCst) as f64 / 1000.0
    }
}

/// Seconds between `now` and the following midnight
#[must_use]
pub fn seconds_until_next_midnight(now: NaiveDateTime) -> f64 {
    let Some(midnight) = now
        .date()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return 0.0;
    };
    let millis = (midnight - now).num_milliseconds();
    (millis as f64 / 1000.0).max(0.0)
}

/// How long the midnight gate should suspend.
///
/// `None` when `remaining` is already within the start-early margin.
#[must_use]
pub fn midnight_wait(remaining_secs: f64, start_early_secs: u32) -> Option<Duration> {
    let margin = f64::from(start_early_secs);
    if remaining_secs > margin {
        Some(Duration::from_secs_f64(remaining_secs - margin))
    } else {
        None
    }
}

/// Render a countdown as `HH:MM:SS`
#[must_use]
pub fn format_countdown(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let (h, rem) = (total / 3600, total % 3600);
    let (m, s) = (rem / 60, rem % 60);
    format!("{h:02}:{m:02}:{s:02}")
}
