//! Browser error types.

use {maxrelay_forwarder::SourceError, thiserror::Error};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Chrome/Chromium not found. {0}")]
    NotFound(String),

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("invalid target URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("page reload failed: {0}")]
    ReloadFailed(String),

    #[error("JavaScript evaluation failed: {0}")]
    JsEvalFailed(String),

    #[error("CDP error: {0}")]
    Cdp(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Cdp(err.to_string())
    }
}

impl From<BrowserError> for SourceError {
    fn from(err: BrowserError) -> Self {
        let message = err.to_string();
        match err {
            BrowserError::NotFound(_) | BrowserError::LaunchFailed(_) => {
                SourceError::AcquisitionFailed(message)
            },
            BrowserError::InvalidUrl { .. } | BrowserError::NavigationFailed(_) => {
                SourceError::NavigationFailed(message)
            },
            BrowserError::ReloadFailed(_) => SourceError::RefreshFailed(message),
            BrowserError::JsEvalFailed(_) | BrowserError::Cdp(_) => SourceError::Driver(message),
        }
    }
}
