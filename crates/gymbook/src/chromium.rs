//! Chromium session over CDP.
//!
//! Element state (visibility, enabled, text filters) is read with page script;
//! clicks go through chromiumoxide's native element click so the portal sees
//! real input events. Text-filtered locators cannot be expressed in CSS, so
//! the first match is tagged with [`ANCHOR_ATTRIBUTE`] and clicked through
//! that attribute.

use crate::driver::{BrowserSession, Launcher};
use crate::locator::Selector;
use crate::result::{GymbookError, GymbookResult};
use crate::wait::{LoadState, WaitOptions};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Attribute used to hand a script-resolved element to a native click
pub const ANCHOR_ATTRIBUTE: &str = "data-gymbook-anchor";

/// Default window size
pub const DEFAULT_VIEWPORT: (u32, u32) = (1280, 900);

/// Extra chromium flags applied to every launch
pub const DEFAULT_ARGS: [&str; 6] = [
    "--disable-extensions",
    "--disable-default-apps",
    "--disable-sync",
    "--disable-background-networking",
    "--disable-component-update",
    "--no-first-run",
];

/// Browser launch options
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a window
    pub headless: bool,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
    /// Command-line flags
    pub args: Vec<String>,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<PathBuf>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Action and navigation bounds
    pub wait: WaitOptions,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: false,
            viewport_width: DEFAULT_VIEWPORT.0,
            viewport_height: DEFAULT_VIEWPORT.1,
            args: DEFAULT_ARGS.iter().map(ToString::to_string).collect(),
            chromium_path: None,
            sandbox: true,
            wait: WaitOptions::default(),
        }
    }
}

impl LaunchOptions {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set window dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Append a command-line flag
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Override timeouts
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    fn to_cdp_config(&self) -> GymbookResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.viewport_width, self.viewport_height)
            .request_timeout(self.wait.navigation_timeout)
            .args(self.args.clone());

        if !self.headless {
            builder = builder.with_head();
        }
        if !self.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = self.chromium_path {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|message| GymbookError::BrowserLaunch { message })
    }
}

/// Launches a local chromium for each run
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    options: LaunchOptions,
}

impl ChromiumLauncher {
    /// Create a launcher
    #[must_use]
    pub const fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    /// Launch options
    #[must_use]
    pub const fn options(&self) -> &LaunchOptions {
        &self.options
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> GymbookResult<ChromiumSession> {
        let config = self.options.to_cdp_config()?;
        let (mut browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| GymbookError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(%err, "cdp handler error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(GymbookError::BrowserLaunch {
                    message: err.to_string(),
                });
            }
        };

        tracing::debug!(
            headless = self.options.headless,
            width = self.options.viewport_width,
            height = self.options.viewport_height,
            "chromium launched"
        );

        Ok(ChromiumSession {
            browser,
            handler,
            page,
            wait: self.options.wait,
        })
    }
}

/// Live chromium with one active page
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    wait: WaitOptions,
}

impl fmt::Debug for ChromiumSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromiumSession")
            .field("page", self.page.target_id())
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

impl ChromiumSession {
    async fn eval<T: DeserializeOwned>(&self, expr: &str) -> GymbookResult<T> {
        let page = &self.page;
        bounded(self.wait.action_timeout, "script evaluation", async move {
            page.evaluate(expr)
                .await
                .map_err(|e| GymbookError::script(e.to_string()))?
                .into_value::<T>()
                .map_err(|e| GymbookError::script(e.to_string()))
        })
        .await
    }

    /// Evaluate `expr` every poll interval until it yields `true`.
    /// Evaluation errors count as "not yet" (the document may be swapping).
    async fn poll_until(&self, expr: &str, limit: Duration, what: &str) -> GymbookResult<()> {
        let deadline = Instant::now() + limit;
        loop {
            if self.eval::<bool>(expr).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(GymbookError::timeout(what, millis(limit)));
            }
            tokio::time::sleep(self.wait.poll_interval).await;
        }
    }

    async fn native_click(&self, css: &str) -> GymbookResult<()> {
        let page = &self.page;
        bounded(self.wait.action_timeout, css, async move {
            page.find_element(css)
                .await
                .map_err(|_| GymbookError::not_found(css))?
                .click()
                .await
                .map_err(|e| GymbookError::page(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn target_ids(&self) -> GymbookResult<HashSet<TargetId>> {
        let pages = self
            .browser
            .pages()
            .await
            .map_err(|e| GymbookError::page(e.to_string()))?;
        Ok(pages.iter().map(|p| p.target_id().clone()).collect())
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, until: LoadState) -> GymbookResult<()> {
        let page = &self.page;
        bounded(self.wait.navigation_timeout, url, async move {
            page.goto(url)
                .await
                .map_err(|e| GymbookError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        })
        .await?;
        self.wait_for_load(until).await
    }

    async fn reload(&mut self, until: LoadState) -> GymbookResult<()> {
        let page = &self.page;
        bounded(self.wait.navigation_timeout, "reload", async move {
            page.reload()
                .await
                .map_err(|e| GymbookError::page(e.to_string()))?;
            Ok(())
        })
        .await?;
        self.wait_for_load(until).await
    }

    async fn wait_for_load(&mut self, state: LoadState) -> GymbookResult<()> {
        self.poll_until(
            state.ready_check(),
            self.wait.navigation_timeout,
            state.event_name(),
        )
        .await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> GymbookResult<()> {
        if self.eval::<bool>(&fill_script(selector, value)).await? {
            Ok(())
        } else {
            Err(GymbookError::not_found(selector))
        }
    }

    async fn click(&mut self, selector: &str) -> GymbookResult<()> {
        self.native_click(selector).await
    }

    async fn is_visible(&mut self, selector: &str) -> GymbookResult<bool> {
        self.eval(&visible_script(&Selector::css(selector))).await
    }

    async fn is_enabled(&mut self, selector: &str) -> GymbookResult<bool> {
        self.eval::<Option<bool>>(&enabled_script(selector))
            .await?
            .ok_or_else(|| GymbookError::not_found(selector))
    }

    async fn check(&mut self, selector: &str, force: bool) -> GymbookResult<()> {
        if force {
            return if self.eval::<bool>(&check_script(selector)).await? {
                Ok(())
            } else {
                Err(GymbookError::not_found(selector))
            };
        }
        let checked: Option<bool> = self
            .eval(&format!(
                "(() => {{ const el = {}; return el ? el.checked : null; }})()",
                Selector::css(selector).to_query()
            ))
            .await?;
        match checked {
            Some(true) => Ok(()),
            Some(false) => self.native_click(selector).await,
            None => Err(GymbookError::not_found(selector)),
        }
    }

    async fn count(&mut self, selector: &Selector) -> GymbookResult<usize> {
        self.eval(&selector.to_count_query()).await
    }

    async fn scroll_into_view(&mut self, selector: &Selector) -> GymbookResult<()> {
        if self.eval::<bool>(&scroll_script(selector)).await? {
            Ok(())
        } else {
            Err(GymbookError::not_found(selector))
        }
    }

    async fn wait_for_visible(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> GymbookResult<()> {
        self.poll_until(
            &visible_script(selector),
            timeout,
            &format!("visibility of {selector}"),
        )
        .await
    }

    async fn click_first(&mut self, selector: &Selector) -> GymbookResult<()> {
        if let Selector::Css(css) = selector {
            return self.native_click(css).await;
        }
        if !self.eval::<bool>(&tag_script(selector)).await? {
            return Err(GymbookError::not_found(selector));
        }
        self.native_click(&format!("[{ANCHOR_ATTRIBUTE}]")).await
    }

    async fn open_popup(&mut self, trigger: &str) -> GymbookResult<()> {
        let before = self.target_ids().await?;
        self.native_click(trigger).await?;

        let limit = self.wait.navigation_timeout;
        let deadline = Instant::now() + limit;
        loop {
            let pages = self
                .browser
                .pages()
                .await
                .map_err(|e| GymbookError::page(e.to_string()))?;
            if let Some(popup) = pages.into_iter().find(|p| !before.contains(p.target_id())) {
                tracing::debug!(target_id = ?popup.target_id(), "popup captured");
                self.page = popup;
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(GymbookError::Popup {
                    message: format!("no new window within {}ms of clicking {trigger}", millis(limit)),
                });
            }
            tokio::time::sleep(self.wait.poll_interval).await;
        }
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> GymbookResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let params = ScreenshotParams::builder().full_page(full_page).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|e| GymbookError::Screenshot {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn close(&mut self) -> GymbookResult<()> {
        let closed = bounded(self.wait.action_timeout, "browser close", async {
            self.browser
                .close()
                .await
                .map_err(|e| GymbookError::page(e.to_string()))?;
            let _ = self.browser.wait().await;
            Ok(())
        })
        .await;
        self.handler.abort();
        closed
    }
}

async fn bounded<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = GymbookResult<T>> + Send,
) -> GymbookResult<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| GymbookError::timeout(what, millis(limit)))?
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn js_string(s: &str) -> String {
    format!("{s:?}")
}

const IS_RENDERED: &str = "(el) => { if (!el) return false; \
    const st = window.getComputedStyle(el); const r = el.getBoundingClientRect(); \
    return st.visibility !== 'hidden' && st.display !== 'none' && r.width > 0 && r.height > 0; }";

fn visible_script(selector: &Selector) -> String {
    format!("({IS_RENDERED})({})", selector.to_query())
}

fn enabled_script(css: &str) -> String {
    format!(
        "(() => {{ const el = {}; return el ? !el.disabled : null; }})()",
        Selector::css(css).to_query()
    )
}

fn fill_script(css: &str, value: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; el.focus(); el.value = {}; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
        Selector::css(css).to_query(),
        js_string(value)
    )
}

/// Tick through a script click so overlays cannot intercept it
fn check_script(css: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; if (!el.checked) el.click(); return true; }})()",
        Selector::css(css).to_query()
    )
}

fn scroll_script(selector: &Selector) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; \
         el.scrollIntoView({{ block: 'center', inline: 'center' }}); return true; }})()",
        selector.to_query()
    )
}

fn tag_script(selector: &Selector) -> String {
    format!(
        "(() => {{ document.querySelectorAll('[{ANCHOR_ATTRIBUTE}]')\
         .forEach(e => e.removeAttribute('{ANCHOR_ATTRIBUTE}')); \
         const el = {}; if (!el) return false; el.setAttribute('{ANCHOR_ATTRIBUTE}', '1'); return true; }})()",
        selector.to_query()
    )
}
