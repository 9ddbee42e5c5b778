//! Shared constants for the browser session and page markup
//!
//! Selectors target the marketplace's `data-testid` attributes, which are
//! more stable across restaurant templates than class names.

/// Chrome user agent string for stealth mode
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

pub const MENU_ITEM_SELECTOR: &str = "article[data-testid='restaurant-menu-item']";

/// Any of these marks the page as rendered
pub const READINESS_SELECTORS: &[&str] = &[
    "[data-testid='restaurant-menu-item']",
    "[data-testid='menuSection-title']",
    "[data-testid='restaurant-name']",
];

/// Virtualized menu list, then its inline-styled fallback
pub const MENU_CONTAINER_SELECTORS: &[&str] = &[
    "[data-test-id='virtuoso-item-list']",
    "div[style*='padding-top'][style*='padding-bottom']",
];

/// Hides the automation flag before any site script runs
pub const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";
