//! Booking run state machine.
//!
//! One run walks a fixed sequence of stages against a single browser session:
//!
//! ```text
//! Launch -> Login -> Navigate -> MidnightGate -> DaySelection -> SlotSelection
//!    |         \__________\___________\_______________\_____________\
//!    |                                                              Teardown
//!    '-- (no session, nothing to tear down)
//! ```
//!
//! Login retries once, day selection retries up to the configured number of
//! attempts, and slot selection walks the candidate list. Everything else is
//! single-shot. Every driver call and every pause races the cancellation
//! token, and the session is closed exactly once whatever the outcome.

use crate::clock::{midnight_wait, Clock, SystemClock};
use crate::config::{RunConfig, Slot};
use crate::driver::{BrowserSession, Launcher};
use crate::locator::{DayTarget, Selector};
use crate::progress::{LogSink, ProgressLog};
use crate::result::{GymbookError, GymbookResult};
use crate::site;
use crate::wait::LoadState;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Stages of a run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    /// Acquire a browser and a page
    Launch,
    /// Log into the reserved area
    Login,
    /// Open bookings, then the Free Fitness popup
    Navigate,
    /// Optionally wait for midnight, then reload
    MidnightGate,
    /// Click the target day in the calendar
    DaySelection,
    /// Tick a slot and confirm
    SlotSelection,
    /// Release the browser
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Launch => "launch",
            Self::Login => "login",
            Self::Navigate => "navigate",
            Self::MidnightGate => "midnight gate",
            Self::DaySelection => "day selection",
            Self::SlotSelection => "slot selection",
            Self::Teardown => "teardown",
        })
    }
}

/// Why a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureReason {
    /// Browser or page could not be acquired
    BrowserUnavailable,
    /// Post-login marker still hidden after the retry
    LoginFailed,
    /// Day anchor never clicked within the configured attempts
    DayNotClickable,
    /// Every slot candidate was disabled or raised
    NoSlotAvailable,
    /// A single-shot page action raised
    PageError,
}

impl FailureReason {
    /// Short classification string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BrowserUnavailable => "browser unavailable",
            Self::LoginFailed => "login failed",
            Self::DayNotClickable => "day not clickable",
            Self::NoSlotAvailable => "no slot available",
            Self::PageError => "page error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} during {stage}: {message}")]
pub struct Failure {
    /// Classification
    pub reason: FailureReason,
    /// Stage that failed
    pub stage: Stage,
    /// Human-readable detail
    pub message: String,
}

impl Failure {
    /// Create a failure
    #[must_use]
    pub fn new(reason: FailureReason, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            reason,
            stage,
            message: message.into(),
        }
    }
}

/// Terminal result of a run, produced exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Confirmation clicked and the page captured
    Success {
        /// Screenshot written after confirming
        screenshot: PathBuf,
    },
    /// Cancellation observed before the run finished
    Canceled,
    /// Fatal failure
    Failed(Failure),
}

impl RunOutcome {
    /// Whether the run booked something
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether the run was canceled
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Failure details, if the run failed
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Why the stage sequence stopped early
enum Halt {
    Canceled,
    Failed(Failure),
}

impl Halt {
    fn failed(reason: FailureReason, stage: Stage, message: impl Into<String>) -> Self {
        Self::Failed(Failure::new(reason, stage, message))
    }

    fn page_error(stage: Stage, err: &GymbookError) -> Self {
        Self::failed(FailureReason::PageError, stage, err.to_string())
    }
}

impl From<Halt> for RunOutcome {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Canceled => Self::Canceled,
            Halt::Failed(failure) => Self::Failed(failure),
        }
    }
}

enum DayProbe {
    Clicked,
    Missing,
    Failed(GymbookError),
}

enum SlotAttempt {
    Booked(PathBuf),
    Unavailable,
}

/// One booking attempt, from browser launch to teardown
pub struct BookingRun<L> {
    launcher: L,
    config: RunConfig,
    cancel: CancellationToken,
    clock: Arc<dyn Clock>,
    log: ProgressLog,
}

impl<L> fmt::Debug for BookingRun<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookingRun")
            .field("config", &self.config)
            .field("canceled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<L: Launcher> BookingRun<L> {
    /// Prepare a run. Nothing happens until [`BookingRun::execute`].
    #[must_use]
    pub fn new(launcher: L, config: RunConfig, cancel: CancellationToken) -> Self {
        Self {
            launcher,
            config,
            cancel,
            clock: Arc::new(SystemClock),
            log: ProgressLog::default(),
        }
    }

    /// Use a different clock for the midnight gate
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send progress lines to `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log = ProgressLog::new(sink);
        self
    }

    /// Configuration this run was built with
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every stage and report the terminal outcome
    pub async fn execute(self) -> RunOutcome {
        let mut session = match self.launch().await {
            Ok(session) => session,
            Err(halt) => return self.finish(halt.into()),
        };

        let outcome = match self.drive(&mut session).await {
            Ok(screenshot) => RunOutcome::Success { screenshot },
            Err(halt) => halt.into(),
        };

        self.teardown(&mut session).await;
        self.finish(outcome)
    }

    async fn drive(&self, s: &mut L::Session) -> Result<PathBuf, Halt> {
        self.login(s).await?;
        self.open_booking_page(s).await?;
        self.midnight_gate(s).await?;
        self.select_day(s).await?;
        self.book_slot(s).await
    }

    // ------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------

    async fn launch(&self) -> Result<L::Session, Halt> {
        self.checkpoint()?;
        match self.guard(self.launcher.launch()).await? {
            Ok(session) => {
                tracing::debug!("browser session acquired");
                Ok(session)
            }
            Err(err) => Err(Halt::failed(
                FailureReason::BrowserUnavailable,
                Stage::Launch,
                err.to_string(),
            )),
        }
    }

    async fn login(&self, s: &mut L::Session) -> Result<(), Halt> {
        self.checkpoint()?;
        self.step(
            Stage::Login,
            s.navigate(site::LOGIN_URL, LoadState::DomContentLoaded),
        )
        .await?;
        self.log.info("Loaded login page.");

        if self.submit_login(s).await? {
            self.log.info("Login confirmed.");
            return Ok(());
        }

        self.log.warn("Login not confirmed; retrying after reload...");
        self.step(Stage::Login, s.reload(LoadState::DomContentLoaded))
            .await?;
        if self.submit_login(s).await? {
            self.log.info("Login confirmed.");
            Ok(())
        } else {
            Err(Halt::failed(
                FailureReason::LoginFailed,
                Stage::Login,
                "Login failed; verify credentials or check for popups.",
            ))
        }
    }

    async fn submit_login(&self, s: &mut L::Session) -> Result<bool, Halt> {
        let credentials = self.config.credentials();
        self.step(
            Stage::Login,
            s.fill(site::USERNAME_INPUT, credentials.username()),
        )
        .await?;
        self.step(
            Stage::Login,
            s.fill(site::PASSWORD_INPUT, credentials.password()),
        )
        .await?;
        self.step(Stage::Login, s.click(site::LOGIN_BUTTON)).await?;
        self.pause(self.config.timings().login_settle).await?;
        // The postback may still be replacing the page; treat errors as not logged in
        match self.guard(s.is_visible(site::BOOKINGS_NAV)).await? {
            Ok(visible) => Ok(visible),
            Err(err) => {
                self.log.warn(format!("Login check failed: {err}"));
                Ok(false)
            }
        }
    }

    async fn open_booking_page(&self, s: &mut L::Session) -> Result<(), Halt> {
        self.checkpoint()?;
        self.step(Stage::Navigate, s.click(site::BOOKINGS_NAV))
            .await?;
        self.step(Stage::Navigate, s.wait_for_load(LoadState::DomContentLoaded))
            .await?;
        self.log.info("Opened Prenotazioni.");

        self.step(Stage::Navigate, s.open_popup(site::FREE_FITNESS_LINK))
            .await?;
        self.step(Stage::Navigate, s.wait_for_load(LoadState::DomContentLoaded))
            .await?;
        self.log.info("Opened Free Fitness page.");
        Ok(())
    }

    async fn midnight_gate(&self, s: &mut L::Session) -> Result<(), Halt> {
        self.checkpoint()?;
        if !self.config.wait_for_midnight() {
            return Ok(());
        }

        let remaining = self.clock.seconds_until_midnight();
        let early = self.config.start_early_seconds();
        match midnight_wait(remaining, early) {
            Some(wait) => {
                self.log.info(format!(
                    "Waiting {:.0}s (start {early}s before midnight)...",
                    wait.as_secs_f64()
                ));
                self.log.midnight_wait(true);
                let waited = self.pause(wait).await;
                self.log.midnight_wait(false);
                waited?;
            }
            None => self.log.info(format!(
                "{remaining:.0}s to midnight is within the {early}s margin; not waiting."
            )),
        }

        self.pause(self.config.timings().pre_reload_pause).await?;
        self.step(Stage::MidnightGate, s.reload(LoadState::DomContentLoaded))
            .await?;
        self.log.info("Reloaded Free Fitness page.");
        Ok(())
    }

    async fn select_day(&self, s: &mut L::Session) -> Result<(), Halt> {
        self.checkpoint()?;
        let date = self.config.target_date();
        let target = DayTarget::new(date);
        let attempts = self.config.day_click_attempts();
        let day = target.day();
        self.log.info(format!("Target date: {date}"));

        for attempt in 1..=attempts {
            self.checkpoint()?;
            match self.try_day(s, &target).await? {
                DayProbe::Clicked => {
                    self.log
                        .info(format!("Clicked day {day} on attempt {attempt}."));
                    return Ok(());
                }
                DayProbe::Missing => self.log.warn(format!(
                    "Attempt {attempt}: day {day} anchor not found; reloading..."
                )),
                DayProbe::Failed(err) => self.log.warn(format!(
                    "Attempt {attempt} failed to click day {day}; retrying... ({err})"
                )),
            }

            if let Err(err) = self.guard(s.reload(LoadState::DomContentLoaded)).await? {
                self.log
                    .warn(format!("Reload after attempt {attempt} failed: {err}"));
            }
            self.pause(self.config.timings().day_retry_pause).await?;
        }

        Err(Halt::failed(
            FailureReason::DayNotClickable,
            Stage::DaySelection,
            format!("Could not click day {day} after {attempts} attempts"),
        ))
    }

    async fn try_day(&self, s: &mut L::Session, target: &DayTarget) -> Result<DayProbe, Halt> {
        let present = match self.guard(anchor_present(s, target)).await? {
            Ok(present) => present,
            Err(err) => return Ok(DayProbe::Failed(err)),
        };
        if !present {
            return Ok(DayProbe::Missing);
        }

        let timeout = self.config.timings().day_visible_timeout;
        Ok(match self.guard(click_day(s, target, timeout)).await? {
            Ok(()) => DayProbe::Clicked,
            Err(err) => DayProbe::Failed(err),
        })
    }

    async fn book_slot(&self, s: &mut L::Session) -> Result<PathBuf, Halt> {
        self.checkpoint()?;
        let mut last_error: Option<GymbookError> = None;

        for slot in self.config.slot_candidates() {
            self.checkpoint()?;
            match self.guard(self.submit_slot(s, slot)).await? {
                Ok(SlotAttempt::Booked(path)) => return Ok(path),
                Ok(SlotAttempt::Unavailable) => {
                    self.log.info(format!("{slot} disabled/full; skipping."));
                }
                Err(err) => {
                    self.log
                        .warn(format!("Slot attempt failed ({slot}): {err}"));
                    last_error = Some(err);
                }
            }
        }

        let message = match last_error {
            Some(err) => format!("All slots failed; last error: {err}"),
            None => "All slots disabled/full; no booking submitted.".to_string(),
        };
        Err(Halt::failed(
            FailureReason::NoSlotAvailable,
            Stage::SlotSelection,
            message,
        ))
    }

    /// Select, confirm and capture. Success is reported once the confirm
    /// click went through and the page was captured; the page content itself
    /// is not inspected.
    async fn submit_slot(&self, s: &mut L::Session, slot: Slot) -> GymbookResult<SlotAttempt> {
        let selector = slot.selector();
        if !s.is_enabled(selector).await? {
            return Ok(SlotAttempt::Unavailable);
        }

        s.check(selector, true).await?;
        self.log.info(format!("Selected {slot}; submitting."));
        s.click(site::CONFIRM_BUTTON).await?;
        self.log.info("Confirm clicked; waiting for server response.");
        tokio::time::sleep(self.config.timings().confirm_settle).await;

        let path = self.config.screenshot_path();
        s.screenshot(path, true).await?;
        self.log
            .info(format!("Attempted booking; see {}", path.display()));
        self.log.info("Booking flow completed.");
        Ok(SlotAttempt::Booked(path.to_path_buf()))
    }

    async fn teardown(&self, s: &mut L::Session) {
        match s.close().await {
            Ok(()) => tracing::debug!("browser session released"),
            Err(err) => {
                tracing::warn!(stage = %Stage::Teardown, %err, "session close failed");
                self.log.warn(format!("Closing the browser failed: {err}"));
            }
        }
    }

    fn finish(&self, outcome: RunOutcome) -> RunOutcome {
        match &outcome {
            RunOutcome::Success { screenshot } => {
                tracing::info!(screenshot = %screenshot.display(), "booking submitted");
            }
            RunOutcome::Canceled => tracing::info!("run canceled"),
            RunOutcome::Failed(failure) => tracing::warn!(
                reason = %failure.reason,
                stage = %failure.stage,
                "{}",
                failure.message
            ),
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Suspension points
    // ------------------------------------------------------------------

    fn checkpoint(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            Err(Halt::Canceled)
        } else {
            Ok(())
        }
    }

    /// Await `fut` unless cancellation comes first
    async fn guard<T>(
        &self,
        fut: impl Future<Output = GymbookResult<T>>,
    ) -> Result<GymbookResult<T>, Halt> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Halt::Canceled),
            res = fut => Ok(res),
        }
    }

    /// Await a single-shot action; an error fails the run
    async fn step<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = GymbookResult<T>>,
    ) -> Result<T, Halt> {
        self.guard(fut)
            .await?
            .map_err(|err| Halt::page_error(stage, &err))
    }

    async fn pause(&self, duration: Duration) -> Result<(), Halt> {
        if duration.is_zero() {
            return self.checkpoint();
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Halt::Canceled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

async fn anchor_present<S: BrowserSession>(s: &mut S, target: &DayTarget) -> GymbookResult<bool> {
    for selector in target.anchors() {
        if s.count(&selector).await? > 0 {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Click the day: titled anchor, else text anchor, else any cell with the number
async fn click_day<S: BrowserSession>(
    s: &mut S,
    target: &DayTarget,
    timeout: Duration,
) -> GymbookResult<()> {
    for selector in target.anchors() {
        if s.count(&selector).await? > 0 {
            return click_located(s, &selector, timeout).await;
        }
    }
    click_located(s, &target.cell(), timeout).await
}

async fn click_located<S: BrowserSession>(
    s: &mut S,
    selector: &Selector,
    timeout: Duration,
) -> GymbookResult<()> {
    s.scroll_into_view(selector).await?;
    s.wait_for_visible(selector, timeout).await?;
    s.click_first(selector).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::{Credentials, RunConfigBuilder, TargetDate, Timings};
    use crate::driver::{MockJournal, MockLauncher, MockScript};
    use crate::progress::MemorySink;
    use tokio::time::Instant;

    fn builder() -> RunConfigBuilder {
        RunConfig::builder(
            Credentials::new("mario", "segreto"),
            TargetDate::new(2026, 3, 5).unwrap(),
        )
        .timings(Timings::none())
    }

    fn target() -> DayTarget {
        DayTarget::new(TargetDate::new(2026, 3, 5).unwrap())
    }

    struct Harness {
        run: BookingRun<MockLauncher>,
        journal: MockJournal,
        sink: MemorySink,
    }

    fn harness(script: MockScript, config: RunConfig, cancel: CancellationToken) -> Harness {
        let launcher = MockLauncher::new(script);
        let journal = launcher.journal();
        let sink = MemorySink::new();
        let run = BookingRun::new(launcher, config, cancel).with_sink(Arc::new(sink.clone()));
        Harness { run, journal, sink }
    }

    async fn execute(script: MockScript, config: RunConfig) -> (RunOutcome, MockJournal, MemorySink) {
        let h = harness(script, config, CancellationToken::new());
        let outcome = h.run.execute().await;
        (outcome, h.journal, h.sink)
    }

    fn slot_probes(journal: &MockJournal) -> Vec<String> {
        journal
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("is_enabled:"))
            .collect()
    }

    mod happy_path_tests {
        use super::*;

        #[tokio::test]
        async fn test_books_primary_slot() {
            let config = builder().primary_slot(Slot::Slot1).build().unwrap();
            let (outcome, journal, sink) = execute(MockScript::new(), config).await;

            assert_eq!(
                outcome,
                RunOutcome::Success {
                    screenshot: PathBuf::from("booking_result.png")
                }
            );
            assert!(journal.was_called(&format!("navigate:{}", site::LOGIN_URL)));
            assert!(journal.was_called(&format!("open_popup:{}", site::FREE_FITNESS_LINK)));
            assert!(journal.was_called(&format!("click_first:{}", target().title_anchor())));
            assert!(journal.was_called(&format!("check:{}", Slot::Slot1.selector())));
            assert!(journal.was_called(&format!("click:{}", site::CONFIRM_BUTTON)));
            assert!(journal.was_called("screenshot:booking_result.png"));
            assert_eq!(journal.count("close"), 1);
            assert!(sink.contains("Booking flow completed."));
        }

        #[tokio::test]
        async fn test_stage_order() {
            let (_, journal, _) = execute(MockScript::new(), builder().build().unwrap()).await;
            let calls = journal.calls();
            let pos = |prefix: &str| calls.iter().position(|c| c.starts_with(prefix)).unwrap();

            assert!(pos("launch") < pos("navigate:"));
            assert!(pos("navigate:") < pos("fill:"));
            assert!(pos("is_visible:") < pos("open_popup:"));
            assert!(pos("open_popup:") < pos("count:"));
            assert!(pos("click_first:") < pos("check:"));
            assert!(pos("screenshot:") < pos("close"));
            assert_eq!(calls.last().map(String::as_str), Some("close"));
        }

        #[tokio::test]
        async fn test_custom_screenshot_path() {
            let config = builder().screenshot_path("out/result.png").build().unwrap();
            let (outcome, journal, _) = execute(MockScript::new(), config).await;
            assert_eq!(
                outcome,
                RunOutcome::Success {
                    screenshot: PathBuf::from("out/result.png")
                }
            );
            assert!(journal.was_called("screenshot:out/result.png"));
        }
    }

    mod login_tests {
        use super::*;

        #[tokio::test]
        async fn test_retry_once_then_proceed() {
            let script = MockScript::new().visible(site::BOOKINGS_NAV, [false, true]);
            let (outcome, journal, sink) = execute(script, builder().build().unwrap()).await;

            assert!(outcome.is_success());
            assert_eq!(journal.count(&format!("click:{}", site::LOGIN_BUTTON)), 2);
            assert_eq!(journal.count("reload"), 1);
            assert!(sink.contains("Login not confirmed"));
        }

        #[tokio::test]
        async fn test_fails_after_single_retry() {
            let script = MockScript::new().visible(site::BOOKINGS_NAV, [false]);
            let (outcome, journal, _) = execute(script, builder().build().unwrap()).await;

            let failure = outcome.failure().unwrap();
            assert_eq!(failure.reason, FailureReason::LoginFailed);
            assert_eq!(failure.stage, Stage::Login);
            assert_eq!(journal.count(&format!("click:{}", site::LOGIN_BUTTON)), 2);
            assert!(!journal.was_called("open_popup:"));
            assert_eq!(journal.count("close"), 1);
        }

        #[tokio::test]
        async fn test_fill_error_is_page_error() {
            let script = MockScript::new().fail(format!("fill:{}", site::USERNAME_INPUT), "detached");
            let (outcome, journal, _) = execute(script, builder().build().unwrap()).await;

            let failure = outcome.failure().unwrap();
            assert_eq!(failure.reason, FailureReason::PageError);
            assert!(failure.message.contains("detached"));
            assert_eq!(journal.count("close"), 1);
        }

        #[tokio::test]
        async fn test_check_error_counts_as_not_logged_in() {
            let script = MockScript::new().fail_times(
                format!("is_visible:{}", site::BOOKINGS_NAV),
                1,
                "Execution context was destroyed",
            );
            let (outcome, journal, sink) = execute(script, builder().build().unwrap()).await;

            assert!(outcome.is_success());
            assert_eq!(journal.count("reload"), 1);
            assert_eq!(journal.count(&format!("click:{}", site::LOGIN_BUTTON)), 2);
            assert!(sink.contains("Login check failed: "));
            assert!(sink.contains("Execution context was destroyed"));
        }

        #[tokio::test]
        async fn test_check_errors_twice_is_login_failure() {
            let script = MockScript::new().fail(
                format!("is_visible:{}", site::BOOKINGS_NAV),
                "Execution context was destroyed",
            );
            let (outcome, journal, _) = execute(script, builder().build().unwrap()).await;

            let failure = outcome.failure().unwrap();
            assert_eq!(failure.reason, FailureReason::LoginFailed);
            assert_eq!(failure.stage, Stage::Login);
            assert_eq!(journal.count(&format!("click:{}", site::LOGIN_BUTTON)), 2);
            assert_eq!(journal.count("close"), 1);
        }
    }

    mod teardown_tests {
        use super::*;

        #[tokio::test]
        async fn test_close_error_keeps_outcome() {
            let script = MockScript::new().fail("close", "browser already gone");
            let (outcome, journal, sink) = execute(script, builder().build().unwrap()).await;

            assert!(outcome.is_success());
            assert_eq!(journal.count("close"), 1);
            assert!(sink.contains("Closing the browser failed: "));
        }
    }

    mod launch_tests {
        use super::*;

        #[tokio::test]
        async fn test_launch_failure_is_fatal() {
            let script = MockScript::new().fail("launch", "chromium missing");
            let (outcome, journal, _) = execute(script, builder().build().unwrap()).await;

            let failure = outcome.failure().unwrap();
            assert_eq!(failure.reason, FailureReason::BrowserUnavailable);
            assert_eq!(failure.stage, Stage::Launch);
            assert_eq!(journal.calls(), vec!["launch"]);
        }

        #[tokio::test]
        async fn test_popup_failure_tears_down() {
            let script = MockScript::new().fail(format!("open_popup:{}", site::FREE_FITNESS_LINK), "no popup");
            let (outcome, journal, _) = execute(script, builder().build().unwrap()).await;

            let failure = outcome.failure().unwrap();
            assert_eq!(failure.reason, FailureReason::PageError);
            assert_eq!(failure.stage, Stage::Navigate);
            assert_eq!(journal.count("close"), 1);
        }
    }

    mod day_tests {
        use super::*;

        #[tokio::test]
        async fn test_succeeds_on_last_attempt() {
            let t = target();
            let script = MockScript::new()
                .counts(&t.title_anchor(), [0, 0, 1])
                .counts(&t.text_anchor(), [0, 0, 1]);
            let config = builder().day_click_attempts(3).build().unwrap();
            let (outcome, journal, sink) = execute(script, config).await;

            assert!(outcome.is_success());
            assert_eq!(journal.count("reload"), 2);
            assert!(sink.contains("Clicked day 5 on attempt 3."));
        }

        #[tokio::test]
        async fn test_exhausted_attempts() {
            let t = target();
            let script = MockScript::new()
                .counts(&t.title_anchor(), [0])
                .counts(&t.text_anchor(), [0]);
            let config = builder().day_click_attempts(3).build().unwrap();
            let (outcome, journal, _) = execute(script, config).await;

            let failure = outcome.failure().unwrap();
            assert_eq!(failure.reason, FailureReason::DayNotClickable);
            assert_eq!(failure.message, "Could not click day 5 after 3 attempts");
            assert_eq!(journal.count("reload"), 3);
            assert_eq!(journal.count("close"), 1);
            assert!(!journal.was_called("is_enabled:"));
        }

        #[tokio::test]
        async fn test_text_anchor_fallback() {
            let t = target();
            let script = MockScript::new().counts(&t.title_anchor(), [0]);
            let (outcome, journal, _) = execute(script, builder().build().unwrap()).await;

            assert!(outcome.is_success());
            assert!(journal.was_called(&format!("click_first:{}", t.text_anchor())));
            assert!(!journal.was_called(&format!("click_first:{}", t.title_anchor())));
        }

        #[tokio::test]
        async fn test_cell_fallback_when_anchor_vanishes() {
            let t = target();
            // present during the probe, gone by the time the click looks again
            let script = MockScript::new()
                .counts(&t.title_anchor(), [1, 0])
                .counts(&t.text_anchor(), [0]);
            let (outcome, journal, _) = execute(script, builder().build().unwrap()).await;

            assert!(outcome.is_success());
            assert!(journal.was_called(&format!("click_first:{}", t.cell())));
        }

        #[tokio::test]
        async fn test_click_error_retries() {
            let t = target();
            let script = MockScript::new().fail_times(
                format!("click_first:{}", t.title_anchor()),
                1,
                "element detached",
            );
            let (outcome, journal, sink) = execute(script, builder().build().unwrap()).await;

            assert!(outcome.is_success());
            assert_eq!(journal.count("reload"), 1);
            assert!(sink.contains("Attempt 1 failed to click day 5"));
            assert!(sink.contains("Clicked day 5 on attempt 2."));
        }

        #[tokio::test]
        async fn test_scrolls_and_waits_before_click() {
            let t = target();
            let (_, journal, _) = execute(MockScript::new(), builder().build().unwrap()).await;
            let calls = journal.calls();
            let pos = |c: String| calls.iter().position(|x| *x == c).unwrap();
            let sel = t.title_anchor();

            assert!(pos(format!("scroll_into_view:{sel}")) < pos(format!("wait_for_visible:{sel}")));
            assert!(pos(format!("wait_for_visible:{sel}")) < pos(format!("click_first:{sel}")));
        }
    }

    mod slot_tests {
        use super::*;

        #[tokio::test]
        async fn test_primary_disabled_without_fallback() {
            let script = MockScript::new().disabled(Slot::Slot2.selector());
            let config = builder().primary_slot(Slot::Slot2).build().unwrap();
            let (outcome, journal, _) = execute(script, config).await;

            let failure = outcome.failure().unwrap();
            assert_eq!(failure.reason, FailureReason::NoSlotAvailable);
            assert_eq!(
                failure.message,
                "All slots disabled/full; no booking submitted."
            );
            assert_eq!(slot_probes(&journal).len(), 1);
            assert!(!journal.was_called("check:"));
            assert_eq!(journal.count("close"), 1);
        }

        #[tokio::test]
        async fn test_fallback_order() {
            let script = MockScript::new()
                .disabled(Slot::Slot2.selector())
                .disabled(Slot::Slot0.selector());
            let config = builder()
                .primary_slot(Slot::Slot2)
                .try_other_slots(true)
                .build()
                .unwrap();
            let (outcome, journal, _) = execute(script, config).await;

            assert!(outcome.is_success());
            assert_eq!(
                slot_probes(&journal),
                vec![
                    format!("is_enabled:{}", Slot::Slot2.selector()),
                    format!("is_enabled:{}", Slot::Slot0.selector()),
                    format!("is_enabled:{}", Slot::Slot1.selector()),
                ]
            );
            assert!(journal.was_called(&format!("check:{}", Slot::Slot1.selector())));
            assert_eq!(journal.count("screenshot:"), 1);
        }

        #[tokio::test]
        async fn test_error_moves_to_next_candidate() {
            let script = MockScript::new().fail(format!("check:{}", Slot::Slot0.selector()), "overlay");
            let config = builder().try_other_slots(true).build().unwrap();
            let (outcome, journal, sink) = execute(script, config).await;

            assert!(outcome.is_success());
            assert!(journal.was_called(&format!("check:{}", Slot::Slot1.selector())));
            assert!(sink.contains("Slot attempt failed (slot 0"));
        }

        #[tokio::test]
        async fn test_all_raise_reports_last_error() {
            let mut script = MockScript::new();
            for slot in Slot::ALL {
                script = script.fail(format!("check:{}", slot.selector()), format!("boom {}", slot.index()));
            }
            let config = builder().try_other_slots(true).build().unwrap();
            let (outcome, journal, _) = execute(script, config).await;

            let failure = outcome.failure().unwrap();
            assert_eq!(failure.reason, FailureReason::NoSlotAvailable);
            assert!(failure.message.starts_with("All slots failed; last error:"));
            assert!(failure.message.contains("boom 3"));
            assert_eq!(journal.count("check:"), 4);
            assert_eq!(journal.count("close"), 1);
        }

        #[tokio::test]
        async fn test_screenshot_error_is_terminal_attempt_error() {
            let script = MockScript::new().fail("screenshot:booking_result.png", "disk full");
            let (outcome, _, _) = execute(script, builder().build().unwrap()).await;

            let failure = outcome.failure().unwrap();
            assert_eq!(failure.reason, FailureReason::NoSlotAvailable);
            assert!(failure.message.contains("disk full"));
        }
    }

    mod midnight_tests {
        use super::*;

        fn gated(remaining: f64, script: MockScript, cancel: CancellationToken) -> Harness {
            let config = builder()
                .wait_for_midnight(true)
                .start_early_seconds(30)
                .build()
                .unwrap();
            let h = harness(script, config, cancel);
            Harness {
                run: h.run.with_clock(Arc::new(FixedClock::new(remaining))),
                journal: h.journal,
                sink: h.sink,
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_suspends_until_margin() {
            let h = gated(100.0, MockScript::new(), CancellationToken::new());
            let started = Instant::now();
            let outcome = h.run.execute().await;
            let elapsed = started.elapsed();

            assert!(outcome.is_success());
            assert!(elapsed >= Duration::from_secs(70));
            assert!(elapsed < Duration::from_millis(70_050));
            assert!(h.sink.contains("Waiting 70s (start 30s before midnight)..."));
            assert_eq!(h.sink.midnight_waits(), vec![true, false]);
            assert_eq!(h.journal.count("reload"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_suspension_inside_margin() {
            let h = gated(20.0, MockScript::new(), CancellationToken::new());
            let started = Instant::now();
            let outcome = h.run.execute().await;

            assert!(outcome.is_success());
            assert!(started.elapsed() < Duration::from_secs(1));
            assert!(!h.sink.contains("Waiting"));
            assert!(h.sink.midnight_waits().is_empty());
            assert_eq!(h.journal.count("reload"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_cancel_during_suspension() {
            let cancel = CancellationToken::new();
            let h = gated(100.0, MockScript::new(), cancel.clone());
            let canceller = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                cancel.cancel();
            });

            let started = Instant::now();
            let outcome = h.run.execute().await;
            canceller.await.unwrap();

            assert_eq!(outcome, RunOutcome::Canceled);
            assert!(started.elapsed() < Duration::from_secs(11));
            assert!(!h.journal.was_called("reload"));
            assert_eq!(h.sink.midnight_waits(), vec![true, false]);
            assert_eq!(h.journal.count("close"), 1);
        }

        #[tokio::test]
        async fn test_gate_skipped_when_disabled() {
            let (outcome, journal, sink) = execute(MockScript::new(), builder().build().unwrap()).await;
            assert!(outcome.is_success());
            assert!(!journal.was_called("reload"));
            assert!(!sink.contains("Waiting"));
        }
    }

    mod cancellation_tests {
        use super::*;

        #[tokio::test]
        async fn test_canceled_before_start() {
            let cancel = CancellationToken::new();
            cancel.cancel();
            let h = harness(MockScript::new(), builder().build().unwrap(), cancel);
            let outcome = h.run.execute().await;

            assert_eq!(outcome, RunOutcome::Canceled);
            assert!(h.journal.calls().is_empty());
        }

        #[tokio::test]
        async fn test_cancel_in_day_retry_loop() {
            let cancel = CancellationToken::new();
            let t = target();
            let script = MockScript::new()
                .counts(&t.title_anchor(), [0])
                .counts(&t.text_anchor(), [0])
                .cancel_on("reload", cancel.clone());
            let config = builder().day_click_attempts(5).build().unwrap();
            let h = harness(script, config, cancel);
            let outcome = h.run.execute().await;

            assert!(outcome.is_canceled());
            assert_eq!(h.journal.count("reload"), 1);
            assert_eq!(h.journal.count("close"), 1);
        }

        #[tokio::test]
        async fn test_cancel_mid_login_is_not_failure() {
            let cancel = CancellationToken::new();
            let script = MockScript::new().cancel_on(format!("click:{}", site::LOGIN_BUTTON), cancel.clone());
            let h = harness(script, builder().build().unwrap(), cancel);
            let outcome = h.run.execute().await;

            assert_eq!(outcome, RunOutcome::Canceled);
            assert!(outcome.failure().is_none());
            assert_eq!(h.journal.count("close"), 1);
        }
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_failure_display() {
            let failure = Failure::new(
                FailureReason::DayNotClickable,
                Stage::DaySelection,
                "Could not click day 5 after 5 attempts",
            );
            assert_eq!(
                failure.to_string(),
                "day not clickable during day selection: Could not click day 5 after 5 attempts"
            );
        }

        #[test]
        fn test_reason_strings() {
            assert_eq!(FailureReason::LoginFailed.as_str(), "login failed");
            assert_eq!(FailureReason::NoSlotAvailable.as_str(), "no slot available");
            assert_eq!(FailureReason::BrowserUnavailable.to_string(), "browser unavailable");
        }

        #[test]
        fn test_outcome_predicates() {
            assert!(RunOutcome::Canceled.is_canceled());
            assert!(!RunOutcome::Canceled.is_success());
            let ok = RunOutcome::Success {
                screenshot: PathBuf::from("x.png"),
            };
            assert!(ok.is_success());
            assert!(ok.failure().is_none());
        }
    }
}
