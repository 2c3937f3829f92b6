//! Browser driver seam.
//!
//! The booking run only ever talks to a [`BrowserSession`]: one browser with
//! one active page. A [`Launcher`] produces sessions, so the run can acquire
//! and release the browser itself.
//!
//! # Implementations
//!
//! - `ChromiumLauncher` - real browser over CDP via chromiumoxide (`browser` feature)
//! - [`MockLauncher`] - scripted responses plus a call journal, for unit tests

use crate::locator::Selector;
use crate::result::{GymbookError, GymbookResult};
use crate::wait::LoadState;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One browser with one active page.
///
/// Every call acts on the active page. [`BrowserSession::open_popup`] is the
/// only call that changes which page that is.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate the active page and wait for `until`
    async fn navigate(&mut self, url: &str, until: LoadState) -> GymbookResult<()>;

    /// Reload the active page and wait for `until`
    async fn reload(&mut self, until: LoadState) -> GymbookResult<()>;

    /// Wait until the active page reaches `state`
    async fn wait_for_load(&mut self, state: LoadState) -> GymbookResult<()>;

    /// Replace the value of an input
    async fn fill(&mut self, selector: &str, value: &str) -> GymbookResult<()>;

    /// Click an element
    async fn click(&mut self, selector: &str) -> GymbookResult<()>;

    /// Whether an element exists and is rendered
    async fn is_visible(&mut self, selector: &str) -> GymbookResult<bool>;

    /// Whether a form control is enabled
    async fn is_enabled(&mut self, selector: &str) -> GymbookResult<bool>;

    /// Tick a checkbox; `force` skips actionability checks (overlays etc.)
    async fn check(&mut self, selector: &str, force: bool) -> GymbookResult<()>;

    /// Number of elements matching `selector`
    async fn count(&mut self, selector: &Selector) -> GymbookResult<usize>;

    /// Scroll the first match into view
    async fn scroll_into_view(&mut self, selector: &Selector) -> GymbookResult<()>;

    /// Wait until the first match is visible, at most `timeout`
    async fn wait_for_visible(&mut self, selector: &Selector, timeout: Duration)
        -> GymbookResult<()>;

    /// Click the first match
    async fn click_first(&mut self, selector: &Selector) -> GymbookResult<()>;

    /// Click `trigger` and make the window it opens the active page
    async fn open_popup(&mut self, trigger: &str) -> GymbookResult<()>;

    /// Capture the active page to `path`
    async fn screenshot(&mut self, path: &Path, full_page: bool) -> GymbookResult<()>;

    /// Release the browser and everything it holds
    async fn close(&mut self) -> GymbookResult<()>;
}

/// Acquires browser sessions
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Session type produced
    type Session: BrowserSession;

    /// Start a browser and open a blank page
    async fn launch(&self) -> GymbookResult<Self::Session>;
}

// ============================================================================
// Mock driver
// ============================================================================

#[derive(Debug, Clone)]
struct InjectedFailure {
    message: String,
    remaining: Option<usize>,
}

/// Scripted page behaviour for [`MockLauncher`].
///
/// Answer queues are consumed one per call; the last answer repeats. Anything
/// not scripted is visible, enabled and present once.
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    visible: HashMap<String, VecDeque<bool>>,
    counts: HashMap<String, VecDeque<usize>>,
    disabled: HashSet<String>,
    failures: HashMap<String, InjectedFailure>,
    cancel_on: Vec<(String, CancellationToken)>,
}

impl MockScript {
    /// Empty script: every page interaction succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Successive `is_visible` answers for `selector`
    #[must_use]
    pub fn visible(mut self, selector: &str, answers: impl IntoIterator<Item = bool>) -> Self {
        self.visible
            .insert(selector.to_string(), answers.into_iter().collect());
        self
    }

    /// Successive `count` answers for `selector`
    #[must_use]
    pub fn counts(mut self, selector: &Selector, answers: impl IntoIterator<Item = usize>) -> Self {
        self.counts
            .insert(selector.to_string(), answers.into_iter().collect());
        self
    }

    /// Report `selector` as disabled
    #[must_use]
    pub fn disabled(mut self, selector: &str) -> Self {
        self.disabled.insert(selector.to_string());
        self
    }

    /// Make every call with this journal key fail (e.g. `"check:#id"`, `"launch"`)
    #[must_use]
    pub fn fail(mut self, call: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(
            call.into(),
            InjectedFailure {
                message: message.into(),
                remaining: None,
            },
        );
        self
    }

    /// Make the first `times` calls with this journal key fail
    #[must_use]
    pub fn fail_times(
        mut self,
        call: impl Into<String>,
        times: usize,
        message: impl Into<String>,
    ) -> Self {
        self.failures.insert(
            call.into(),
            InjectedFailure {
                message: message.into(),
                remaining: Some(times),
            },
        );
        self
    }

    /// Cancel `token` as soon as a call whose key starts with `call` is made
    #[must_use]
    pub fn cancel_on(mut self, call: impl Into<String>, token: CancellationToken) -> Self {
        self.cancel_on.push((call.into(), token));
        self
    }
}

fn next_answer<T: Copy>(queue: Option<&mut VecDeque<T>>, default: T) -> T {
    match queue {
        Some(q) if q.len() > 1 => q.pop_front().unwrap_or(default),
        Some(q) => q.front().copied().unwrap_or(default),
        None => default,
    }
}

/// Shared record of every driver call, in order
#[derive(Debug, Clone, Default)]
pub struct MockJournal {
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockJournal {
    fn push(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// All calls so far
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    /// Number of calls starting with `prefix`
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

/// Launcher handing out scripted [`MockSession`]s
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    script: MockScript,
    journal: MockJournal,
}

impl MockLauncher {
    /// Create a launcher for a script
    #[must_use]
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            journal: MockJournal::default(),
        }
    }

    /// Journal shared with every session this launcher creates
    #[must_use]
    pub fn journal(&self) -> MockJournal {
        self.journal.clone()
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    type Session = MockSession;

    async fn launch(&self) -> GymbookResult<MockSession> {
        let mut session = MockSession {
            script: self.script.clone(),
            journal: self.journal.clone(),
            page: 0,
        };
        session
            .record("launch".to_string())
            .map_err(|e| GymbookError::BrowserLaunch {
                message: e.to_string(),
            })?;
        Ok(session)
    }
}

/// Session produced by [`MockLauncher`]
#[derive(Debug)]
pub struct MockSession {
    script: MockScript,
    journal: MockJournal,
    page: usize,
}

impl MockSession {
    /// Index of the active page (0 until a popup is captured)
    #[must_use]
    pub const fn active_page(&self) -> usize {
        self.page
    }

    fn record(&mut self, call: String) -> GymbookResult<()> {
        for (prefix, token) in &self.script.cancel_on {
            if call.starts_with(prefix.as_str()) {
                token.cancel();
            }
        }
        let failure = match self.script.failures.get_mut(&call) {
            Some(InjectedFailure {
                remaining: Some(0), ..
            })
            | None => None,
            Some(InjectedFailure {
                message,
                remaining: Some(n),
            }) => {
                *n -= 1;
                Some(message.clone())
            }
            Some(InjectedFailure {
                message,
                remaining: None,
            }) => Some(message.clone()),
        };
        self.journal.push(call);
        failure.map_or(Ok(()), |message| Err(GymbookError::page(message)))
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&mut self, url: &str, _until: LoadState) -> GymbookResult<()> {
        self.record(format!("navigate:{url}"))
    }

    async fn reload(&mut self, _until: LoadState) -> GymbookResult<()> {
        self.record("reload".to_string())
    }

    async fn wait_for_load(&mut self, state: LoadState) -> GymbookResult<()> {
        self.record(format!("wait_for_load:{state}"))
    }

    async fn fill(&mut self, selector: &str, _value: &str) -> GymbookResult<()> {
        self.record(format!("fill:{selector}"))
    }

    async fn click(&mut self, selector: &str) -> GymbookResult<()> {
        self.record(format!("click:{selector}"))
    }

    async fn is_visible(&mut self, selector: &str) -> GymbookResult<bool> {
        self.record(format!("is_visible:{selector}"))?;
        Ok(next_answer(self.script.visible.get_mut(selector), true))
    }

    async fn is_enabled(&mut self, selector: &str) -> GymbookResult<bool> {
        self.record(format!("is_enabled:{selector}"))?;
        Ok(!self.script.disabled.contains(selector))
    }

    async fn check(&mut self, selector: &str, force: bool) -> GymbookResult<()> {
        let _ = force;
        self.record(format!("check:{selector}"))
    }

    async fn count(&mut self, selector: &Selector) -> GymbookResult<usize> {
        let key = selector.to_string();
        self.record(format!("count:{key}"))?;
        Ok(next_answer(self.script.counts.get_mut(&key), 1))
    }

    async fn scroll_into_view(&mut self, selector: &Selector) -> GymbookResult<()> {
        self.record(format!("scroll_into_view:{selector}"))
    }

    async fn wait_for_visible(
        &mut self,
        selector: &Selector,
        _timeout: Duration,
    ) -> GymbookResult<()> {
        self.record(format!("wait_for_visible:{selector}"))
    }

    async fn click_first(&mut self, selector: &Selector) -> GymbookResult<()> {
        self.record(format!("click_first:{selector}"))
    }

    async fn open_popup(&mut self, trigger: &str) -> GymbookResult<()> {
        self.record(format!("open_popup:{trigger}"))?;
        self.page += 1;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> GymbookResult<()> {
        self.record(format!("screenshot:{}", path.display()))
    }

    async fn close(&mut self) -> GymbookResult<()> {
        self.record("close".to_string())
    }
}
