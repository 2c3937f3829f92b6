//! Output formatting and progress reporting

use console::{style, Term};
use gymbook::{format_countdown, Clock, LogLine, LogSink, SystemClock};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Countdown refresh interval
pub const COUNTDOWN_TICK: Duration = Duration::from_millis(500);

/// `Countdown: HH:MM:SS` for the given clock
#[must_use]
pub fn countdown_text(clock: &dyn Clock) -> String {
    let remaining = Duration::from_secs_f64(clock.seconds_until_midnight().max(0.0));
    format!("Countdown: {}", format_countdown(remaining))
}

/// Terminal reporter for a booking run.
///
/// Progress lines go to stderr; while the countdown spinner is active they are
/// printed above it.
#[derive(Debug, Clone)]
pub struct Reporter {
    term: Term,
    spinner: Arc<Mutex<Option<ProgressBar>>>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: Arc::new(Mutex::new(None)),
            use_color,
            quiet,
        }
    }

    /// Print a progress line
    pub fn line(&self, text: &str) {
        if self.quiet {
            return;
        }
        let guard = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(pb) => pb.println(text),
            None => {
                let _ = self.term.write_line(text);
            }
        }
    }

    /// Print a run status line (`Starting...`, `Done`)
    pub fn status(&self, text: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(text).bold().to_string()
        } else {
            text.to_string()
        };
        self.line(&styled);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message (shown even in quiet mode)
    pub fn failure(&self, message: &str) {
        let text = if self.use_color {
            format!("{} {message}", style("Error:").red().bold())
        } else {
            format!("Error: {message}")
        };
        let guard = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(pb) => pb.println(text),
            None => {
                let _ = self.term.write_line(&text);
            }
        }
    }

    /// Show the midnight countdown spinner
    pub fn start_countdown(&self) {
        if self.quiet {
            return;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(countdown_text(&SystemClock));
        pb.enable_steady_tick(Duration::from_millis(120));
        *self.spinner.lock().unwrap_or_else(PoisonError::into_inner) = Some(pb);
    }

    /// Refresh the countdown text
    pub fn tick_countdown(&self) {
        if let Some(pb) = self
            .spinner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            pb.set_message(countdown_text(&SystemClock));
        }
    }

    /// Remove the countdown spinner
    pub fn stop_countdown(&self) {
        if let Some(pb) = self
            .spinner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pb.finish_and_clear();
        }
    }

    /// Whether the countdown spinner is showing
    #[must_use]
    pub fn countdown_active(&self) -> bool {
        self.spinner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl LogSink for Reporter {
    fn emit(&self, line: &LogLine) {
        self.line(&line.to_string());
    }

    fn midnight_wait(&self, waiting: bool) {
        if waiting {
            self.start_countdown();
        } else {
            self.stop_countdown();
        }
    }
}
