//! Restaurant menu scraper
//!
//! Drives headless Chrome through restaurant pages of a food-delivery
//! marketplace, extracts business and menu data, and converts it into an
//! e-commerce import CSV and a raw archive.

mod browser;
pub mod browser_setup;
pub mod error;
pub mod export;
pub mod extractor;
pub mod fetcher;
mod manager;
pub mod model;
pub mod runner;
pub mod targets;
mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 8;
pub const MIN_SCROLL_ATTEMPTS: u32 = 1;
pub const MAX_SCROLL_ATTEMPTS: u32 = 100;
pub const MIN_SCROLL_PAUSE_MS: u64 = 100;
pub const MAX_SCROLL_PAUSE_MS: u64 = 10_000;
pub const MAX_GRACE_PERIOD_SECS: u64 = 60;

/// Scrape job configuration
///
/// Every field has a default so a partial YAML file is enough. camelCase
/// aliases are accepted for the job-form field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Concurrent browser sessions
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-target budget for load, readiness and scrolling
    #[serde(default = "default_timeout_secs", alias = "timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(default = "default_max_scroll_attempts", alias = "maxScrollAttempts")]
    pub max_scroll_attempts: u32,

    /// Pause after each scroll for lazy-loaded content to arrive
    #[serde(default = "default_scroll_pause_ms", alias = "scrollPauseMs")]
    pub scroll_pause_ms: u64,

    #[serde(default = "default_output_directory", alias = "outputDirectory")]
    pub output_directory: PathBuf,

    /// How long in-flight targets may finish after cancellation
    #[serde(default = "default_grace_period_secs", alias = "gracePeriodSecs")]
    pub grace_period_secs: u64,

    /// Optional wall-clock budget for the whole run
    #[serde(default, alias = "runBudgetSecs")]
    pub run_budget_secs: Option<u64>,

    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Browser launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Explicit Chrome/Chromium binary; discovery is used when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_workers() -> usize {
    1
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_headless() -> bool {
    true
}
fn default_max_scroll_attempts() -> u32 {
    30
}
fn default_scroll_pause_ms() -> u64 {
    1500
}
fn default_output_directory() -> PathBuf {
    PathBuf::from("scraped_data")
}
fn default_grace_period_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    utils::constants::CHROME_USER_AGENT.to_string()
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            headless: default_headless(),
            max_scroll_attempts: default_max_scroll_attempts(),
            scroll_pause_ms: default_scroll_pause_ms(),
            output_directory: default_output_directory(),
            grace_period_secs: default_grace_period_secs(),
            run_budget_secs: None,
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_agent: default_user_agent(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Config {
    /// Reject invalid values before any browser session is opened
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.workers) {
            return Err(ValidationError::Workers {
                got: self.workers,
                min: MIN_WORKERS,
                max: MAX_WORKERS,
            });
        }

        validate_target_timeout(self.timeout_secs)?;

        if !(MIN_SCROLL_ATTEMPTS..=MAX_SCROLL_ATTEMPTS).contains(&self.max_scroll_attempts) {
            return Err(ValidationError::ScrollAttempts {
                got: self.max_scroll_attempts,
                min: MIN_SCROLL_ATTEMPTS,
                max: MAX_SCROLL_ATTEMPTS,
            });
        }

        if !(MIN_SCROLL_PAUSE_MS..=MAX_SCROLL_PAUSE_MS).contains(&self.scroll_pause_ms) {
            return Err(ValidationError::ScrollPause {
                got: self.scroll_pause_ms,
                min: MIN_SCROLL_PAUSE_MS,
                max: MAX_SCROLL_PAUSE_MS,
            });
        }

        if self.grace_period_secs > MAX_GRACE_PERIOD_SECS {
            return Err(ValidationError::GracePeriod {
                got: self.grace_period_secs,
                max: MAX_GRACE_PERIOD_SECS,
            });
        }

        if let Some(budget) = self.run_budget_secs
            && budget < MIN_TARGET_TIMEOUT_SECS
        {
            return Err(ValidationError::RunBudget {
                got: budget,
                min: MIN_TARGET_TIMEOUT_SECS,
            });
        }

        if self.output_directory.as_os_str().is_empty() {
            return Err(ValidationError::OutputDirectory);
        }

        let window = &self.browser.window;
        if window.width == 0 || window.height == 0 {
            return Err(ValidationError::WindowSize {
                width: window.width,
                height: window.height,
            });
        }

        Ok(())
    }
}

/// Load config from a YAML file, or defaults when `path` is `None`
pub fn load_yaml_config(path: Option<&Path>) -> Result<Config, ValidationError> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = fs::read_to_string(path)
        .map_err(|e| ValidationError::ConfigFile(format!("{}: {e}", path.display())))?;
    serde_yaml::from_str(&contents)
        .map_err(|e| ValidationError::ConfigFile(format!("{}: {e}", path.display())))
}

pub use browser::{BrowserError, BrowserResult, BrowserWrapper, launch_browser};
pub use error::{ErrorKind, ExportError, ExtractError, FetchError, ScrapeError};
pub use extractor::{Extraction, extract};
pub use fetcher::{ChromeFetcher, ChromeFetcherFactory, FetcherFactory, PageFetcher};
pub use manager::BrowserManager;
pub use model::{
    MenuCategory, MenuItem, Outcome, RenderedPage, RestaurantRecord, ScrapeResult, ScrapeTarget,
};
pub use runner::{JobRunner, ProgressEvent, ProgressSnapshot, RunReport};
pub use utils::{MIN_TARGET_TIMEOUT_SECS, MAX_TARGET_TIMEOUT_SECS, validate_target_timeout};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_worker_counts_outside_range() {
        for workers in [0, 9] {
            let config = Config {
                workers,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ValidationError::Workers { got, .. }) if got == workers
            ));
        }
    }

    #[test]
    fn rejects_timeouts_outside_range() {
        for timeout_secs in [9, 121] {
            let config = Config {
                timeout_secs,
                ..Config::default()
            };
            assert!(matches!(config.validate(), Err(ValidationError::Timeout { .. })));
        }
    }

    #[test]
    fn rejects_empty_output_directory() {
        let config = Config {
            output_directory: PathBuf::new(),
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::OutputDirectory));
    }

    #[test]
    fn rejects_short_run_budget() {
        let config = Config {
            run_budget_secs: Some(3),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::RunBudget { .. })));
    }

    #[test]
    fn yaml_accepts_camel_case_aliases() {
        let yaml = "workers: 4\ntimeout: 45\nheadless: false\nmaxScrollAttempts: 12\noutputDirectory: out\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.timeout_secs, 45);
        assert!(!config.headless);
        assert_eq!(config.max_scroll_attempts, 12);
        assert_eq!(config.output_directory, PathBuf::from("out"));
        assert_eq!(config.scroll_pause_ms, 1500);
        assert_eq!(config.browser.window.width, 1920);
    }

    #[test]
    fn missing_config_file_is_a_validation_error() {
        let err = load_yaml_config(Some(Path::new("/nonexistent/menu.yaml"))).unwrap_err();
        assert!(matches!(err, ValidationError::ConfigFile(_)));
    }
}
