//! Semantic checks run once at startup, before the bot connects.

use secrecy::ExposeSecret;

use crate::schema::RelayConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "source.target_url"
    pub path: &'static str,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path,
            message: message.into(),
        }
    }

    fn warning(path: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path,
            message: message.into(),
        }
    }
}

/// Validate a loaded config. An empty result means the relay can start.
#[must_use]
pub fn validate(config: &RelayConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if config.telegram.token.expose_secret().trim().is_empty() {
        diagnostics.push(Diagnostic::error(
            "telegram.token",
            "bot token is empty (set it or export MAXRELAY_TELEGRAM_TOKEN)",
        ));
    }
    if config.auth.admin_password.expose_secret().is_empty() {
        diagnostics.push(Diagnostic::error(
            "auth.admin_password",
            "admin password is empty (set it or export MAXRELAY_ADMIN_PASSWORD)",
        ));
    }

    check_url(&config.source.target_url, "source.target_url", &mut diagnostics);
    check_url(&config.source.login_url, "source.login_url", &mut diagnostics);

    if config.store.history_retain >= config.store.history_cap {
        diagnostics.push(Diagnostic::error(
            "store.history_retain",
            format!(
                "must be smaller than store.history_cap ({})",
                config.store.history_cap
            ),
        ));
    }
    if config.forwarder.error_threshold == 0 {
        diagnostics.push(Diagnostic::warning(
            "forwarder.error_threshold",
            "0 triggers a recovery cycle on every iteration",
        ));
    }
    if config.forwarder.refresh_every == 0 {
        diagnostics.push(Diagnostic::error(
            "forwarder.refresh_every",
            "must be at least 1",
        ));
    }
    if config.source.headless {
        diagnostics.push(Diagnostic::warning(
            "source.headless",
            "the manual login step needs a visible browser window",
        ));
    }

    diagnostics
}

fn check_url(raw: &str, path: &'static str, diagnostics: &mut Vec<Diagnostic>) {
    if raw.trim().is_empty() {
        diagnostics.push(Diagnostic::error(path, "URL is empty"));
        return;
    }
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {},
        Ok(parsed) => diagnostics.push(Diagnostic::error(
            path,
            format!("unsupported scheme {:?}", parsed.scheme()),
        )),
        Err(e) => diagnostics.push(Diagnostic::error(path, format!("invalid URL: {e}"))),
    }
}
