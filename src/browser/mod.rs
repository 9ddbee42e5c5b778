//! Browser infrastructure for launching and managing Chrome instances

mod wrapper;

pub use wrapper::{BrowserWrapper, create_blank_page, launch_browser};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to find browser executable: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Browser health check failed: {0}")]
    Unhealthy(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for BrowserError {
    fn from(err: std::io::Error) -> Self {
        BrowserError::IoError(err.to_string())
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;
