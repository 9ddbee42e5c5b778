//! Chrome discovery and launch
//!
//! Resolution order for the executable: `browser.executable` from config,
//! the `CHROME_BINARY_PATH` / `CHROMIUM_PATH` environment variables, well
//! known install locations, `which`, and finally a managed Chromium download
//! into the user cache directory.

use anyhow::{Context, Result, anyhow};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::BrowserConfig;
use crate::utils::MAX_TARGET_TIMEOUT_SECS;

const BROWSER_ENV_VARS: &[&str] = &["CHROME_BINARY_PATH", "CHROMIUM_PATH"];

const WHICH_NAMES: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/opt/homebrew/bin/chromium",
];

// Debian's chromium first: slim container images ship it
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const INSTALL_PATHS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/usr/local/bin/chromium",
    "/opt/google/chrome/chrome",
];

/// Flags applied to every session. JavaScript and images stay on: the menu
/// is client-rendered and item images are part of the record.
const SESSION_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-breakpad",
    "--disable-default-apps",
    "--disable-sync",
    "--metrics-recording-only",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
    "--use-mock-keychain",
    "--mute-audio",
];

const CONTAINER_FLAGS: &[&str] = &["--no-sandbox", "--disable-setuid-sandbox"];

/// Profile directory removed on drop unless the launch succeeded
struct ProfileDir {
    path: PathBuf,
    armed: bool,
}

impl ProfileDir {
    fn create(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create profile directory {}", path.display()))?;
        Ok(Self { path, armed: true })
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed profile after failed launch: {}", self.path.display()),
            Err(e) => warn!("Failed to remove profile {}: {}", self.path.display(), e),
        }
    }
}

/// Locate an installed Chrome or Chromium
pub fn find_browser_executable() -> Option<PathBuf> {
    from_env()
        .or_else(from_install_paths)
        .or_else(from_which)
}

fn from_env() -> Option<PathBuf> {
    BROWSER_ENV_VARS.iter().find_map(|var| {
        let path = PathBuf::from(std::env::var_os(var)?);
        if path.exists() {
            info!("Using browser from {}: {}", var, path.display());
            Some(path)
        } else {
            warn!("{} points to a missing file: {}", var, path.display());
            None
        }
    })
}

fn from_install_paths() -> Option<PathBuf> {
    INSTALL_PATHS
        .iter()
        .filter_map(|raw| expand_home(raw))
        .find(|path| path.exists())
        .inspect(|path| info!("Found browser at {}", path.display()))
}

fn expand_home(raw: &str) -> Option<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(raw)),
    }
}

fn from_which() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        return None;
    }
    WHICH_NAMES.iter().find_map(|name| {
        let output = Command::new("which").arg(name).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!found.is_empty()).then(|| PathBuf::from(found))
    })
}

/// Download Chromium into the user cache and return its executable
pub async fn download_chromium() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("menu_scraper")
        .join("chromium");
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create {}", cache_dir.display()))?;

    info!("No local browser found, downloading Chromium to {}", cache_dir.display());
    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .context("Failed to build fetcher options")?;
    let installed = BrowserFetcher::new(options)
        .fetch()
        .await
        .context("Failed to download Chromium")?;

    Ok(installed.executable_path)
}

async fn resolve_executable(config: &BrowserConfig) -> Result<PathBuf> {
    if let Some(path) = &config.executable {
        if path.exists() {
            return Ok(path.clone());
        }
        warn!("Configured browser executable does not exist: {}", path.display());
    }

    match find_browser_executable() {
        Some(path) => Ok(path),
        None => download_chromium().await,
    }
}

fn in_container() -> bool {
    Path::new("/.dockerenv").exists()
        || std::env::var_os("container").is_some()
        || std::env::var_os("KUBERNETES_SERVICE_HOST").is_some()
}

/// CDP events Chrome sends that chromiumoxide has no type for
fn is_benign_handler_error(message: &str) -> bool {
    message.contains("data did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}

/// Launch Chrome against `user_data_dir`
///
/// The returned handler task drives the CDP connection; the caller owns it
/// and must abort it when the session ends.
pub async fn launch_browser(
    config: &BrowserConfig,
    headless: bool,
    user_data_dir: PathBuf,
) -> Result<(Browser, JoinHandle<()>)> {
    let executable = resolve_executable(config).await?;
    let profile = ProfileDir::create(user_data_dir)?;

    // CDP requests may run as long as the longest target budget; the fetcher
    // enforces the real per-target deadline
    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(MAX_TARGET_TIMEOUT_SECS))
        .window_size(config.window.width, config.window.height)
        .user_data_dir(profile.path.clone())
        .chrome_executable(executable)
        .arg(format!("--user-agent={}", config.user_agent));

    builder = if headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    let container = in_container();
    if container {
        info!("Container detected, running Chrome without sandbox");
    }
    let flags = SESSION_FLAGS
        .iter()
        .chain(CONTAINER_FLAGS.iter().filter(|_| container));
    for flag in flags {
        builder = builder.arg(*flag);
    }

    let browser_config = builder
        .build()
        .map_err(|e| anyhow!("Invalid browser configuration: {e}"))?;
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            match event {
                Err(e) if is_benign_handler_error(&e.to_string()) => {
                    trace!("Ignored untyped CDP message: {}", e)
                }
                Err(e) => error!("Browser handler error: {:?}", e),
                Ok(()) => {}
            }
        }
        debug!("Browser handler task completed");
    });

    profile.disarm();
    Ok((browser, handler_task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_home_prefix() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/bin/chrome"), Some(home.join("bin/chrome")));
        }
        assert_eq!(expand_home("/usr/bin/chromium"), Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn recognizes_untyped_cdp_messages() {
        assert!(is_benign_handler_error(
            "data did not match any variant of untagged enum Message"
        ));
        assert!(!is_benign_handler_error("connection reset"));
    }

    #[test]
    fn failed_launch_removes_profile() {
        let path = std::env::temp_dir().join(format!("menu_scraper_profile_test_{}", std::process::id()));
        drop(ProfileDir::create(path.clone()).unwrap());
        assert!(!path.exists());

        let kept = ProfileDir::create(path.clone()).unwrap();
        kept.disarm();
        assert!(path.exists());
        std::fs::remove_dir_all(&path).unwrap();
    }
}
