//! Browser session owned by a single worker
//!
//! Each worker holds one `BrowserManager` for its lifetime. There is no
//! process-wide browser: a crash in one worker's Chrome never touches
//! another worker's session.
//!
//! # Lifecycle
//!
//! - Lazy launch on first `get_or_launch()`
//! - Health check on every reuse; a dead browser is torn down and relaunched
//! - `recycle()` after a crash, timeout or cancellation leaves the slot empty
//! - `shutdown()` when the worker exits

use tracing::{debug, info, warn};

use crate::BrowserConfig;
use crate::browser::{BrowserResult, BrowserWrapper, launch_browser};

pub struct BrowserManager {
    worker: usize,
    config: BrowserConfig,
    headless: bool,
    browser: Option<BrowserWrapper>,
    launches: u32,
}

impl BrowserManager {
    /// Browser will be launched on first `get_or_launch()` call
    pub fn new(worker: usize, config: BrowserConfig, headless: bool) -> Self {
        Self {
            worker,
            config,
            headless,
            browser: None,
            launches: 0,
        }
    }

    /// Return a healthy browser, launching or relaunching as needed
    pub async fn get_or_launch(&mut self) -> BrowserResult<&BrowserWrapper> {
        if let Some(wrapper) = self.browser.take() {
            if wrapper.is_healthy().await {
                debug!(worker = self.worker, "Browser health check passed, reusing session");
                return Ok(self.browser.insert(wrapper));
            }
            warn!(worker = self.worker, "Browser health check failed, recycling session");
            wrapper.close().await;
        }

        info!(worker = self.worker, launch = self.launches + 1, "Launching browser session");
        let wrapper = launch_browser(&self.config, self.headless).await?;
        self.launches += 1;
        Ok(self.browser.insert(wrapper))
    }

    /// Tear down the current session; the next target gets a fresh one
    pub async fn recycle(&mut self) {
        if let Some(wrapper) = self.browser.take() {
            info!(worker = self.worker, "Recycling browser session");
            wrapper.close().await;
        }
    }

    /// Safe to call multiple times
    pub async fn shutdown(&mut self) {
        if let Some(wrapper) = self.browser.take() {
            info!(worker = self.worker, "Shutting down browser");
            wrapper.close().await;
        }
    }
}

impl Drop for BrowserManager {
    fn drop(&mut self) {
        if self.browser.is_some() {
            // BrowserWrapper::drop aborts the handler and kills Chrome
            debug!(worker = self.worker, "BrowserManager dropped with a live session");
        }
    }
}
