//! Locating a Chromium-based browser on the host.

use std::path::{Path, PathBuf};

use crate::error::BrowserError;

/// Executable names looked up on `PATH`, most preferred first.
const EXECUTABLE_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const INSTALL_PATHS: &[&str] = &[];

/// Resolve the browser executable.
///
/// Order: `[source].chrome_path`, the `CHROME` environment variable, the
/// platform's usual install locations, then `PATH`.
pub fn find_chrome(configured: Option<&str>) -> Result<PathBuf, BrowserError> {
    let from_env = std::env::var("CHROME").ok();
    let explicit = [configured, from_env.as_deref()];
    if let Some(path) = explicit
        .into_iter()
        .flatten()
        .map(Path::new)
        .find(|p| p.exists())
    {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = INSTALL_PATHS.iter().map(Path::new).find(|p| p.exists()) {
        return Ok(path.to_path_buf());
    }

    EXECUTABLE_NAMES
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| BrowserError::NotFound(install_hint().into()))
}

pub fn install_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install one with `brew install --cask google-chrome` or set [source].chrome_path."
    } else if cfg!(target_os = "windows") {
        "Install one with `winget install Google.Chrome` or set [source].chrome_path."
    } else {
        "Install chromium from your package manager or set [source].chrome_path."
    }
}
