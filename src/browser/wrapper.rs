//! Browser lifecycle for one worker session
//!
//! Handles launching a chromiumoxide browser with stealth configuration and
//! tearing it down, including its temporary profile directory.

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{BrowserError, BrowserResult};
use crate::BrowserConfig;
use crate::utils::constants::HIDE_WEBDRIVER_SCRIPT;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Wrapper for Browser and its event handler task
///
/// Handler MUST be aborted to prevent it running after the browser is
/// closed; `Drop` does that. Call [`BrowserWrapper::close`] for a clean
/// shutdown that also waits for the Chrome process and removes the profile.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Cheap liveness probe via the CDP `Browser.getVersion` command
    pub async fn is_healthy(&self) -> bool {
        self.browser.version().await.is_ok()
    }

    /// Close Chrome, wait for the process to exit, then remove the profile
    ///
    /// Best-effort: a crashed browser fails `close()` but still gets its
    /// handler aborted and its directory removed.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.cleanup_temp_dir();
    }

    /// Must run after `browser.wait()` so Chrome has released file handles
    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();

        if let Some(path) = self.user_data_dir.take() {
            warn!(
                "BrowserWrapper dropped without close(); removing profile {} while Chrome may still hold it",
                path.display()
            );
            let _ = std::fs::remove_dir_all(&path);
        }
    }
}

/// Launch a new browser session with its own profile directory
///
/// Every session gets a unique directory so parallel workers never contend
/// for Chrome's profile lock.
pub async fn launch_browser(config: &BrowserConfig, headless: bool) -> BrowserResult<BrowserWrapper> {
    let session = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    let user_data_dir = std::env::temp_dir().join(format!(
        "menu_scraper_{}_{}",
        std::process::id(),
        session
    ));
    info!(session, headless, "Launching browser session");

    let (browser, handler) = crate::browser_setup::launch_browser(config, headless, user_data_dir.clone())
        .await
        .map_err(|e| BrowserError::LaunchFailed(format!("{e:#}")))?;

    Ok(BrowserWrapper::new(browser, handler, user_data_dir))
}

/// Create a blank page with the webdriver flag hidden
///
/// The script must be registered on about:blank, before the site's own
/// scripts run on navigation.
pub async fn create_blank_page(wrapper: &BrowserWrapper) -> BrowserResult<Page> {
    let page = wrapper
        .browser()
        .new_page("about:blank")
        .await
        .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

    page.evaluate_on_new_document(HIDE_WEBDRIVER_SCRIPT)
        .await
        .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

    Ok(page)
}
