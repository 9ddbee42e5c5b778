//! Error taxonomy for scrape runs
//!
//! Per-target failures are captured into a `ScrapeResult` and never escape the
//! runner. Only [`ValidationError`] aborts a run, and it does so before any
//! browser session is opened.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::browser::BrowserError;

/// Serializable failure classification recorded on each failed target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed configuration or target list (run-level only)
    Validation,
    /// Page never reached the readiness signal within the target timeout
    NavigationTimeout,
    /// Unexpected HTTP or network error while loading the page
    NavigationFailed,
    /// The restaurant name could not be read
    ExtractionFailure,
    /// The worker's browser session became unusable
    SessionCrash,
    /// The run was cancelled before this target started or finished
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NavigationTimeout => "navigation_timeout",
            ErrorKind::NavigationFailed => "navigation_failed",
            ErrorKind::ExtractionFailure => "extraction_failure",
            ErrorKind::SessionCrash => "session_crash",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Whether the worker must tear down its session after this failure
    pub fn requires_recycle(self) -> bool {
        matches!(
            self,
            ErrorKind::SessionCrash | ErrorKind::Cancelled | ErrorKind::NavigationTimeout
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected configuration or target list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("workers must be between {min} and {max}, got {got}")]
    Workers { got: usize, min: usize, max: usize },

    #[error("timeout must be between {min}s and {max}s, got {got}s")]
    Timeout { got: u64, min: u64, max: u64 },

    #[error("max_scroll_attempts must be between {min} and {max}, got {got}")]
    ScrollAttempts { got: u32, min: u32, max: u32 },

    #[error("scroll_pause_ms must be between {min} and {max}, got {got}")]
    ScrollPause { got: u64, min: u64, max: u64 },

    #[error("grace_period_secs cannot exceed {max}, got {got}")]
    GracePeriod { got: u64, max: u64 },

    #[error("run_budget_secs must be at least {min}, got {got}")]
    RunBudget { got: u64, min: u64 },

    #[error("window size must be non-zero, got {width}x{height}")]
    WindowSize { width: u32, height: u32 },

    #[error("output_directory cannot be empty")]
    OutputDirectory,

    #[error("no targets provided")]
    NoTargets,

    #[error("line {line}: malformed target '{input}': {reason}")]
    MalformedTarget {
        line: usize,
        input: String,
        reason: String,
    },

    #[error("invalid configuration file: {0}")]
    ConfigFile(String),
}

/// Classified failure of the Page Fetcher
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("page {url} did not become ready within {}s", after.as_secs())]
    NavigationTimeout { url: String, after: Duration },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser session crashed: {0}")]
    SessionCrash(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::NavigationTimeout { .. } => ErrorKind::NavigationTimeout,
            FetchError::Navigation { .. } => ErrorKind::NavigationFailed,
            FetchError::SessionCrash(_) => ErrorKind::SessionCrash,
        }
    }

    /// Classify a CDP error raised while talking to a page
    pub fn from_cdp(url: &str, err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;

        match err {
            CdpError::Timeout => FetchError::NavigationTimeout {
                url: url.to_string(),
                after: Duration::ZERO,
            },
            CdpError::Ws(e) => FetchError::SessionCrash(e.to_string()),
            CdpError::Io(e) => FetchError::SessionCrash(e.to_string()),
            CdpError::NoResponse => FetchError::SessionCrash("no response from browser".into()),
            other => {
                let reason = other.to_string();
                if reason.contains("net::ERR") || reason.contains("HTTP") {
                    FetchError::Navigation {
                        url: url.to_string(),
                        reason,
                    }
                } else if reason.contains("channel") || reason.contains("closed") {
                    FetchError::SessionCrash(reason)
                } else {
                    FetchError::Navigation {
                        url: url.to_string(),
                        reason,
                    }
                }
            }
        }
    }
}

impl From<BrowserError> for FetchError {
    fn from(err: BrowserError) -> Self {
        FetchError::SessionCrash(err.to_string())
    }
}

/// Hard failure of the Field Extractor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("restaurant name not found on {url}")]
    MissingName { url: String },
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ExtractionFailure
    }
}

/// Failures writing or reading export artifacts
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive schema mismatch: expected {expected}, found {found}")]
    ArchiveSchema { expected: String, found: String },
}

/// Crate-level error for operations that abort a whole run
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
