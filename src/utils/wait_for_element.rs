//! Element polling for client-rendered pages
//!
//! The restaurant page is a React app: the load event fires long before the
//! menu is in the DOM, so readiness is a polled selector rather than a
//! lifecycle event.

use std::time::Duration;

use chromiumoxide::Page;
use tokio::time::Instant;
use tracing::debug;

/// Wait until any selector in `selectors` matches, with exponential backoff
///
/// Returns the selector that matched, or `None` once `deadline` passes.
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry, capped at 1 second
pub async fn wait_for_any(page: &Page, selectors: &[&str], deadline: Instant) -> Option<String> {
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        for selector in selectors {
            let found = tokio::time::timeout_at(deadline, page.find_element(*selector)).await;
            if matches!(found, Ok(Ok(_))) {
                debug!(selector, "readiness selector matched");
                return Some((*selector).to_string());
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }

        tokio::time::sleep(poll_interval.min(deadline - now)).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}
