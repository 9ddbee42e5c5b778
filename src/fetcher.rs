//! Page Fetcher: loads a restaurant page and scrolls until the menu settles
//!
//! The [`PageFetcher`] trait is the seam between the job runner and Chrome.
//! [`ChromeFetcher`] is the production implementation; tests drive the runner
//! with scripted fetchers.

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide_cdp::cdp::js_protocol::runtime::{CallArgument, CallFunctionOnParams};
use serde_json::json;
use std::ops::Deref;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::browser::create_blank_page;
use crate::error::FetchError;
use crate::manager::BrowserManager;
use crate::model::{RenderedPage, ScrapeTarget};
use crate::utils::constants::{MENU_CONTAINER_SELECTORS, MENU_ITEM_SELECTOR, READINESS_SELECTORS};
use crate::utils::{CAPTURE_MARGIN, wait_for_any};
use crate::{BrowserConfig, Config};

/// Loads one target into a rendered page
///
/// Implementations own their browser session. The runner calls `recycle`
/// after a session crash, timeout or forced cancellation, and `shutdown`
/// once when the worker exits.
#[async_trait]
pub trait PageFetcher: Send {
    async fn fetch(
        &mut self,
        target: &ScrapeTarget,
        config: &Config,
    ) -> Result<RenderedPage, FetchError>;

    /// Tear down the current session so the next fetch starts fresh
    async fn recycle(&mut self) {}

    async fn shutdown(&mut self) {}
}

/// Builds one fetcher per worker
pub trait FetcherFactory: Send + Sync {
    fn create(&self, worker: usize) -> Box<dyn PageFetcher>;
}

pub struct ChromeFetcherFactory {
    browser: BrowserConfig,
    headless: bool,
}

impl ChromeFetcherFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            browser: config.browser.clone(),
            headless: config.headless,
        }
    }
}

impl FetcherFactory for ChromeFetcherFactory {
    fn create(&self, worker: usize) -> Box<dyn PageFetcher> {
        Box::new(ChromeFetcher::new(worker, self.browser.clone(), self.headless))
    }
}

/// Fetcher backed by a per-worker Chrome session
pub struct ChromeFetcher {
    worker: usize,
    manager: BrowserManager,
}

impl ChromeFetcher {
    pub fn new(worker: usize, browser: BrowserConfig, headless: bool) -> Self {
        Self {
            worker,
            manager: BrowserManager::new(worker, browser, headless),
        }
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(
        &mut self,
        target: &ScrapeTarget,
        config: &Config,
    ) -> Result<RenderedPage, FetchError> {
        let timeout = target.timeout(config);
        let deadline = Instant::now() + timeout;
        let url = target.url.as_str();

        let wrapper = self.manager.get_or_launch().await?;
        let page = PageGuard::new(create_blank_page(wrapper).await?, url.to_string());

        info!(worker = self.worker, url, "Loading page");
        match tokio::time::timeout_at(deadline, page.goto(url)).await {
            Err(_) => {
                return Err(FetchError::NavigationTimeout {
                    url: url.to_string(),
                    after: timeout,
                });
            }
            Ok(Err(e)) => {
                return Err(match FetchError::from_cdp(url, e) {
                    FetchError::NavigationTimeout { url, .. } => {
                        FetchError::NavigationTimeout { url, after: timeout }
                    }
                    other => other,
                });
            }
            Ok(Ok(_)) => {}
        }

        if let Some(status) = response_status(&page).await
            && status >= 400
        {
            return Err(FetchError::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        if wait_for_any(&page, READINESS_SELECTORS, deadline).await.is_none() {
            return Err(FetchError::NavigationTimeout {
                url: url.to_string(),
                after: timeout,
            });
        }

        let menu_snapshots = scroll_until_stable(&page, config, deadline).await?;

        let capture = async {
            let html = page.content().await.map_err(|e| FetchError::from_cdp(url, e))?;
            let final_url = page.url().await.ok().flatten();
            let page_state = menu_page_state(&page).await;
            Ok::<_, FetchError>((html, final_url, page_state))
        };
        let (html, final_url, page_state) = tokio::time::timeout_at(deadline + CAPTURE_MARGIN, capture)
            .await
            .map_err(|_| FetchError::NavigationTimeout {
                url: url.to_string(),
                after: timeout,
            })??;
        let final_url = final_url.unwrap_or_else(|| url.to_string());

        page.close().await;

        Ok(RenderedPage {
            requested_url: url.to_string(),
            final_url,
            html,
            menu_snapshots,
            page_state,
        })
    }

    async fn recycle(&mut self) {
        self.manager.recycle().await;
    }

    async fn shutdown(&mut self) {
        self.manager.shutdown().await;
    }
}

/// Scroll-and-wait cycles that trigger lazy loading
///
/// The menu list is virtualized: rows scrolled out of view are unmounted.
/// The container HTML is therefore captured after every scroll and the
/// extractor merges the snapshots in order.
///
/// Stops when the item count did not change across a scroll, after
/// `max_scroll_attempts`, or when the target deadline is close.
async fn scroll_until_stable(
    page: &Page,
    config: &Config,
    deadline: Instant,
) -> Result<Vec<String>, FetchError> {
    let pause = std::time::Duration::from_millis(config.scroll_pause_ms);
    let mut snapshots = Vec::new();

    let mut last_count = count_menu_items(page).await;
    push_snapshot(page, &mut snapshots).await;

    for attempt in 0..config.max_scroll_attempts {
        if Instant::now() + pause + CAPTURE_MARGIN >= deadline {
            debug!(attempt, "Target deadline near, stopping scroll");
            break;
        }

        scroll_menu(page).await?;
        tokio::time::sleep(pause).await;

        // Bouncing the viewport makes the virtualized list mount rows it skipped
        if attempt % 2 == 0 {
            scroll_by(page, -300).await?;
            scroll_by(page, 600).await?;
        }

        push_snapshot(page, &mut snapshots).await;

        let count = count_menu_items(page).await;
        debug!(attempt = attempt + 1, items = count, "Scroll attempt");
        if count == last_count {
            debug!("Item count stabilized, stopping scroll");
            break;
        }
        last_count = count;
    }

    Ok(snapshots)
}

/// Looks through `window` globals for an object holding a menu section list
/// and returns a plain copy of it. React props are cyclic, so only the
/// fields the extractor reads are copied.
const PAGE_STATE_SCRIPT: &str = r#"(() => {
  const plain = (sections) => sections
    .filter((s) => s && typeof s === 'object' && s.name)
    .map((s) => ({
      name: String(s.name),
      items: (Array.isArray(s.items) ? s.items : [])
        .filter((i) => i && typeof i === 'object' && i.name)
        .map((i) => ({
          name: String(i.name),
          price: i.price == null ? null : String(i.price),
          description: i.description == null ? null : String(i.description),
          id: i.id == null ? null : String(i.id),
        })),
    }));
  for (const key of Object.keys(window)) {
    if (!/menu|restaurant/i.test(key)) continue;
    try {
      const val = window[key];
      if (!val || typeof val !== 'object') continue;
      const sections = val.menu || val.menuSections || val.categories;
      if (Array.isArray(sections)) return { sections: plain(sections) };
    } catch (e) {}
  }
  return null;
})()"#;

async fn menu_page_state(page: &Page) -> Option<serde_json::Value> {
    match page.evaluate(PAGE_STATE_SCRIPT).await {
        Ok(result) => result
            .into_value::<Option<serde_json::Value>>()
            .ok()
            .flatten(),
        Err(e) => {
            debug!("Page state lookup failed: {}", e);
            None
        }
    }
}

async fn count_menu_items(page: &Page) -> u64 {
    let expr = format!("document.querySelectorAll({}).length", json!(MENU_ITEM_SELECTOR));
    match page.evaluate(expr).await {
        Ok(result) => result.into_value::<u64>().unwrap_or(0),
        Err(e) => {
            warn!("Failed to count menu items: {}", e);
            0
        }
    }
}

/// HTTP status of the main document, when the browser exposes it
async fn response_status(page: &Page) -> Option<u64> {
    let expr = "(() => { const e = performance.getEntriesByType('navigation')[0]; \
                return e && e.responseStatus ? e.responseStatus : 0; })()";
    let status = page.evaluate(expr).await.ok()?.into_value::<u64>().ok()?;
    (status > 0).then_some(status)
}

async fn push_snapshot(page: &Page, snapshots: &mut Vec<String>) {
    let expr = format!(
        "(() => {{ for (const s of {}) {{ const el = document.querySelector(s); \
         if (el) return el.outerHTML; }} return document.body ? document.body.outerHTML : ''; }})()",
        json!(MENU_CONTAINER_SELECTORS)
    );
    match page.evaluate(expr).await {
        Ok(result) => match result.into_value::<String>() {
            Ok(html) if !html.is_empty() => snapshots.push(html),
            Ok(_) => {}
            Err(e) => warn!("Failed to read menu snapshot: {}", e),
        },
        Err(e) => warn!("Failed to capture menu snapshot: {}", e),
    }
}

/// Scroll the menu container to its end, or the window when there is none
async fn scroll_menu(page: &Page) -> Result<(), FetchError> {
    let call = CallFunctionOnParams::builder()
        .function_declaration(
            "(selectors) => { \
               for (const s of selectors) { \
                 const el = document.querySelector(s); \
                 if (el && el.scrollHeight > el.clientHeight) { el.scrollTop = el.scrollHeight; return true; } \
               } \
               window.scrollTo(0, document.body.scrollHeight); \
               return false; \
             }",
        )
        .argument(CallArgument::builder().value(json!(MENU_CONTAINER_SELECTORS)).build())
        .build()
        .map_err(FetchError::SessionCrash)?;

    page.evaluate_function(call)
        .await
        .map_err(|e| FetchError::SessionCrash(format!("scroll failed: {e}")))?;
    Ok(())
}

async fn scroll_by(page: &Page, dy: i64) -> Result<(), FetchError> {
    let call = CallFunctionOnParams::builder()
        .function_declaration("(dy) => window.scrollBy(0, dy)")
        .argument(CallArgument::builder().value(json!(dy)).build())
        .build()
        .map_err(FetchError::SessionCrash)?;

    page.evaluate_function(call)
        .await
        .map_err(|e| FetchError::SessionCrash(format!("scroll failed: {e}")))?;
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    Ok(())
}

/// Page handle that is always closed
///
/// chromiumoxide's `Page` has no `Drop`; without an explicit close the
/// target leaks inside the browser. `close()` is the normal path, `Drop`
/// covers early returns, timeouts and cancellation.
struct PageGuard {
    page: Option<Page>,
    url: String,
    runtime_handle: tokio::runtime::Handle,
}

impl PageGuard {
    fn new(page: Page, url: String) -> Self {
        Self {
            page: Some(page),
            url,
            runtime_handle: tokio::runtime::Handle::current(),
        }
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            warn!("Failed to close page for {}: {}", self.url, e);
        }
    }
}

impl Deref for PageGuard {
    type Target = Page;

    fn deref(&self) -> &Self::Target {
        // Only `close` and `drop` take the page, and both consume the guard
        match self.page.as_ref() {
            Some(page) => page,
            None => unreachable!("PageGuard used after close"),
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let url = std::mem::take(&mut self.url);
            self.runtime_handle.spawn(async move {
                if let Err(e) = page.close().await {
                    tracing::debug!("PageGuard drop cleanup failed for {}: {}", url, e);
                }
            });
        }
    }
}
