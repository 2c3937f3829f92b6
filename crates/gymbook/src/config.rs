//! Run configuration: everything one booking attempt needs, fixed before it starts.

use crate::result::{GymbookError, GymbookResult};
use crate::site;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of tries for clicking the target day
pub const DEFAULT_DAY_CLICK_ATTEMPTS: u32 = 5;

/// Default margin, in seconds, between the end of the midnight wait and midnight
pub const DEFAULT_START_EARLY_SECONDS: u32 = 30;

/// Default screenshot written after the confirmation click
pub const DEFAULT_SCREENSHOT_PATH: &str = "booking_result.png";

/// Portal login. Forwarded to the page, never inspected.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Username
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Calendar day to book.
///
/// Only the ranges are checked (month 1-12, day 1-31). Whether the day exists
/// in that month is left to the portal: an impossible day simply never shows
/// up as a clickable anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetDate {
    year: i32,
    month: u32,
    day: u32,
}

impl TargetDate {
    /// Create a target date
    pub fn new(year: i32, month: u32, day: u32) -> GymbookResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(GymbookError::invalid_config(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if !(1..=31).contains(&day) {
            return Err(GymbookError::invalid_config(format!(
                "day must be between 1 and 31, got {day}"
            )));
        }
        Ok(Self { year, month, day })
    }

    /// Target date in the current local year
    pub fn in_current_year(month: u32, day: u32) -> GymbookResult<Self> {
        Self::new(chrono::Local::now().year(), month, day)
    }

    /// Year
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Month (1-12)
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Day of month (1-31)
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.day
    }

    /// Month name as written in the calendar's anchor titles
    #[must_use]
    pub fn month_name(&self) -> &'static str {
        site::month_name(self.month).unwrap_or_default()
    }
}

impl fmt::Display for TargetDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// One of the four bookable periods on the Free Fitness page.
///
/// `Slot0` doubles as "nothing selected": callers that never picked a slot end
/// up here, and nothing downstream can tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Slot {
    /// 14:00-15:30
    #[default]
    Slot0,
    /// 15:30-17:00
    Slot1,
    /// 17:00-18:30
    Slot2,
    /// 18:30-20:00
    Slot3,
}

impl Slot {
    /// Canonical fallback order
    pub const ALL: [Self; 4] = [Self::Slot0, Self::Slot1, Self::Slot2, Self::Slot3];

    /// Zero-based index
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Slot0 => 0,
            Self::Slot1 => 1,
            Self::Slot2 => 2,
            Self::Slot3 => 3,
        }
    }

    /// Slot for an index, if in range
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Parse a persisted `"0"`..`"3"` value; anything else is `Slot0`
    #[must_use]
    pub fn from_setting(value: &str) -> Self {
        value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(Self::from_index)
            .unwrap_or_default()
    }

    /// Checkbox selector for this slot
    #[must_use]
    pub const fn selector(self) -> &'static str {
        site::SLOT_CHECKBOXES[self.index()]
    }

    /// Time range shown on the page
    #[must_use]
    pub const fn label(self) -> &'static str {
        site::SLOT_LABELS[self.index()]
    }

    /// Order in which slots are attempted.
    ///
    /// The primary slot always comes first. With `try_others`, the remaining
    /// slots follow in canonical order.
    #[must_use]
    pub fn candidate_order(primary: Self, try_others: bool) -> Vec<Self> {
        let mut order = vec![primary];
        if try_others {
            order.extend(Self::ALL.into_iter().filter(|slot| *slot != primary));
        }
        order
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} ({})", self.index(), self.label())
    }
}

/// Fixed pauses the run inserts around page actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// After submitting the login form, before checking the result
    pub login_settle: Duration,
    /// After clicking confirm, before the screenshot
    pub confirm_settle: Duration,
    /// Between day-click attempts
    pub day_retry_pause: Duration,
    /// Before the reload that ends the midnight gate
    pub pre_reload_pause: Duration,
    /// Bound on waiting for a day anchor to become visible
    pub day_visible_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            login_settle: Duration::from_millis(1500),
            confirm_settle: Duration::from_millis(2000),
            day_retry_pause: Duration::from_millis(60),
            pre_reload_pause: Duration::from_millis(200),
            day_visible_timeout: Duration::from_millis(5000),
        }
    }
}

impl Timings {
    /// No pauses at all (visibility waits keep a 1ms bound)
    #[must_use]
    pub const fn none() -> Self {
        Self {
            login_settle: Duration::ZERO,
            confirm_settle: Duration::ZERO,
            day_retry_pause: Duration::ZERO,
            pre_reload_pause: Duration::ZERO,
            day_visible_timeout: Duration::from_millis(1),
        }
    }
}

/// Immutable description of one booking attempt
#[derive(Debug, Clone)]
pub struct RunConfig {
    credentials: Credentials,
    target_date: TargetDate,
    primary_slot: Slot,
    try_other_slots: bool,
    day_click_attempts: u32,
    wait_for_midnight: bool,
    start_early_seconds: u32,
    timings: Timings,
    screenshot_path: PathBuf,
}

impl RunConfig {
    /// Start building a configuration
    #[must_use]
    pub fn builder(credentials: Credentials, target_date: TargetDate) -> RunConfigBuilder {
        RunConfigBuilder::new(credentials, target_date)
    }

    /// Login credentials
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Day to book
    #[must_use]
    pub const fn target_date(&self) -> TargetDate {
        self.target_date
    }

    /// Preferred slot
    #[must_use]
    pub const fn primary_slot(&self) -> Slot {
        self.primary_slot
    }

    /// Whether to fall back to the other slots
    #[must_use]
    pub const fn try_other_slots(&self) -> bool {
        self.try_other_slots
    }

    /// Maximum tries for clicking the target day (at least 1)
    #[must_use]
    pub const fn day_click_attempts(&self) -> u32 {
        self.day_click_attempts
    }

    /// Whether to wait until shortly before midnight
    #[must_use]
    pub const fn wait_for_midnight(&self) -> bool {
        self.wait_for_midnight
    }

    /// Seconds before midnight at which the wait ends
    #[must_use]
    pub const fn start_early_seconds(&self) -> u32 {
        self.start_early_seconds
    }

    /// Settle pauses
    #[must_use]
    pub const fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Where the confirmation screenshot goes
    #[must_use]
    pub fn screenshot_path(&self) -> &std::path::Path {
        &self.screenshot_path
    }

    /// Slots in the order they will be tried
    #[must_use]
    pub fn slot_candidates(&self) -> Vec<Slot> {
        Slot::candidate_order(self.primary_slot, self.try_other_slots)
    }
}

/// Builder for [`RunConfig`]
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    credentials: Credentials,
    target_date: TargetDate,
    primary_slot: Slot,
    try_other_slots: bool,
    day_click_attempts: u32,
    wait_for_midnight: bool,
    start_early_seconds: u32,
    timings: Timings,
    screenshot_path: PathBuf,
}

impl RunConfigBuilder {
    /// Create a builder with default options
    #[must_use]
    pub fn new(credentials: Credentials, target_date: TargetDate) -> Self {
        Self {
            credentials,
            target_date,
            primary_slot: Slot::default(),
            try_other_slots: false,
            day_click_attempts: DEFAULT_DAY_CLICK_ATTEMPTS,
            wait_for_midnight: false,
            start_early_seconds: DEFAULT_START_EARLY_SECONDS,
            timings: Timings::default(),
            screenshot_path: PathBuf::from(DEFAULT_SCREENSHOT_PATH),
        }
    }

    /// Set the preferred slot
    #[must_use]
    pub const fn primary_slot(mut self, slot: Slot) -> Self {
        self.primary_slot = slot;
        self
    }

    /// Fall back to the remaining slots
    #[must_use]
    pub const fn try_other_slots(mut self, enabled: bool) -> Self {
        self.try_other_slots = enabled;
        self
    }

    /// Set the number of day-click tries
    #[must_use]
    pub const fn day_click_attempts(mut self, attempts: u32) -> Self {
        self.day_click_attempts = attempts;
        self
    }

    /// Wait until shortly before midnight
    #[must_use]
    pub const fn wait_for_midnight(mut self, enabled: bool) -> Self {
        self.wait_for_midnight = enabled;
        self
    }

    /// Set the start-early margin
    #[must_use]
    pub const fn start_early_seconds(mut self, seconds: u32) -> Self {
        self.start_early_seconds = seconds;
        self
    }

    /// Override settle pauses
    #[must_use]
    pub const fn timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Set the screenshot path
    #[must_use]
    pub fn screenshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot_path = path.into();
        self
    }

    /// Validate and build
    pub fn build(self) -> GymbookResult<RunConfig> {
        if self.day_click_attempts == 0 {
            return Err(GymbookError::invalid_config(
                "day click attempts must be at least 1",
            ));
        }
        Ok(RunConfig {
            credentials: self.credentials,
            target_date: self.target_date,
            primary_slot: self.primary_slot,
            try_other_slots: self.try_other_slots,
            day_click_attempts: self.day_click_attempts,
            wait_for_midnight: self.wait_for_midnight,
            start_early_seconds: self.start_early_seconds,
            timings: self.timings,
            screenshot_path: self.screenshot_path,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("mario", "segreto")
    }

    mod target_date_tests {
        use super::*;

        #[test]
        fn test_ranges_enforced() {
            assert!(TargetDate::new(2026, 0, 10).is_err());
            assert!(TargetDate::new(2026, 13, 10).is_err());
            assert!(TargetDate::new(2026, 3, 0).is_err());
            assert!(TargetDate::new(2026, 3, 32).is_err());
        }

        #[test]
        fn test_calendar_validity_not_checked() {
            let date = TargetDate::new(2026, 4, 31).unwrap();
            assert_eq!(date.day(), 31);
            assert_eq!(date.month_name(), "aprile");
        }

        #[test]
        fn test_display() {
            let date = TargetDate::new(2026, 3, 5).unwrap();
            assert_eq!(date.to_string(), "2026-03-05");
        }

        #[test]
        fn test_current_year() {
            let date = TargetDate::in_current_year(12, 1).unwrap();
            assert_eq!(date.year(), chrono::Local::now().year());
        }
    }

    mod slot_tests {
        use super::*;

        #[test]
        fn test_default_is_slot0() {
            assert_eq!(Slot::default(), Slot::Slot0);
        }

        #[test]
        fn test_from_setting() {
            assert_eq!(Slot::from_setting("2"), Slot::Slot2);
            assert_eq!(Slot::from_setting(" 3 "), Slot::Slot3);
            assert_eq!(Slot::from_setting(""), Slot::Slot0);
            assert_eq!(Slot::from_setting("7"), Slot::Slot0);
            assert_eq!(Slot::from_setting("abc"), Slot::Slot0);
        }

        #[test]
        fn test_selector_and_label() {
            assert_eq!(Slot::Slot1.selector(), "#UC_FreeFitness_GVPeriodi_CBScelta_1");
            assert_eq!(Slot::Slot3.label(), "18:30-20:00");
            assert_eq!(Slot::Slot2.to_string(), "slot 2 (17:00-18:30)");
        }

        #[test]
        fn test_primary_only() {
            assert_eq!(Slot::candidate_order(Slot::Slot2, false), vec![Slot::Slot2]);
        }

        #[test]
        fn test_fallback_order() {
            assert_eq!(
                Slot::candidate_order(Slot::Slot2, true),
                vec![Slot::Slot2, Slot::Slot0, Slot::Slot1, Slot::Slot3]
            );
        }

        #[test]
        fn test_serde_uses_variant_names() {
            let json = serde_json::to_string(&Slot::Slot1).unwrap();
            assert_eq!(json, "\"Slot1\"");
        }
    }

    mod builder_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let date = TargetDate::new(2026, 5, 20).unwrap();
            let config = RunConfig::builder(creds(), date).build().unwrap();
            assert_eq!(config.day_click_attempts(), 5);
            assert_eq!(config.start_early_seconds(), 30);
            assert_eq!(config.primary_slot(), Slot::Slot0);
            assert!(!config.try_other_slots());
            assert!(!config.wait_for_midnight());
            assert_eq!(config.screenshot_path(), std::path::Path::new("booking_result.png"));
            assert_eq!(config.timings().login_settle, Duration::from_millis(1500));
        }

        #[test]
        fn test_zero_attempts_rejected() {
            let date = TargetDate::new(2026, 5, 20).unwrap();
            let err = RunConfig::builder(creds(), date)
                .day_click_attempts(0)
                .build()
                .unwrap_err();
            assert!(err.to_string().contains("at least 1"));
        }

        #[test]
        fn test_password_redacted_in_debug() {
            let rendered = format!("{:?}", creds());
            assert!(rendered.contains("mario"));
            assert!(!rendered.contains("segreto"));
        }
    }

    mod candidate_props {
        use super::*;
        use proptest::prelude::*;

        fn any_slot() -> impl Strategy<Value = Slot> {
            (0usize..4).prop_map(|idx| Slot::ALL[idx])
        }

        proptest! {
            #[test]
            fn primary_always_first(primary in any_slot(), others in any::<bool>()) {
                let order = Slot::candidate_order(primary, others);
                prop_assert_eq!(order[0], primary);
            }

            #[test]
            fn without_fallback_only_primary(primary in any_slot()) {
                prop_assert_eq!(Slot::candidate_order(primary, false), vec![primary]);
            }

            #[test]
            fn fallback_is_canonical_remainder(primary in any_slot()) {
                let order = Slot::candidate_order(primary, true);
                let expected: Vec<Slot> = std::iter::once(primary)
                    .chain(Slot::ALL.into_iter().filter(|s| *s != primary))
                    .collect();
                prop_assert_eq!(order, expected);
            }
        }
    }
}
