//! Chrome/Chromium source sessions driven over CDP.
//!
//! [`ChromeSource`] implements the forwarder's `SourceDriver`: each acquire
//! launches a visible browser on the MAX login page, the operator logs in by
//! hand, and the engine takes it from there (navigate, snapshot, reload,
//! close).

pub mod detect;
pub mod error;
pub mod session;

pub use {
    detect::find_chrome,
    error::BrowserError,
    session::{ChromeSession, ChromeSource, chrome_args},
};
