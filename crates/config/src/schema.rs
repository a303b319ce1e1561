//! Configuration schema. Every section defaults to a usable value so a
//! config file only needs the secrets and the source target URL.

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Desktop user agent presented by the source browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub telegram: TelegramConfig,
    pub auth: AuthConfig,
    pub source: SourceConfig,
    pub forwarder: ForwarderConfig,
    pub store: StoreConfig,
}

/// Telegram bot account settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: Secret<String>,
    /// Upper bound on a single outbound `sendMessage` call.
    pub request_timeout_secs: u64,
    /// Long-polling timeout passed to `getUpdates`.
    pub poll_timeout_secs: u32,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            request_timeout_secs: 10,
            poll_timeout_secs: 30,
        }
    }
}

/// Operator authentication.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Password accepted by `/password`.
    pub admin_password: Secret<String>,
    /// Sliding session lifetime.
    pub session_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_password: Secret::new(String::new()),
            session_ttl_secs: 3600,
        }
    }
}

/// Content source (browser) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Page opened right after the browser starts, for the manual login.
    pub login_url: String,
    /// Fixed chat/group address forwarded from.
    pub target_url: String,
    /// Login needs a visible window, so this defaults to false.
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
    pub chrome_args: Vec<String>,
    /// Pause after navigation/refresh before the page is inspected.
    pub settle_delay_secs: u64,
    /// Number of trailing class-bearing elements inspected per snapshot.
    pub scan_window: usize,
    pub navigation_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            login_url: "https://web.max.ru".into(),
            target_url: String::new(),
            headless: false,
            chrome_path: None,
            user_agent: Some(DEFAULT_USER_AGENT.into()),
            chrome_args: Vec::new(),
            settle_delay_secs: 5,
            scan_window: 50,
            navigation_timeout_ms: 30_000,
        }
    }
}

/// Forwarding loop cadence and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Interval between checks of the manual-ready flag.
    pub ready_poll_interval_secs: u64,
    /// Sleep between forwarding iterations.
    pub loop_interval_secs: u64,
    /// Consecutive delivery failures that trigger a recovery cycle.
    pub error_threshold: u32,
    /// Refresh the source whenever the snapshot size is a multiple of this.
    pub refresh_every: usize,
    /// Longer messages are cut and suffixed with `...`.
    pub max_message_chars: usize,
    /// Text prepended to every forwarded message.
    pub forward_prefix: String,
    /// Pause between releasing and reacquiring the source during recovery.
    pub recovery_delay_secs: u64,
    /// How long `stop` waits for the worker before aborting it.
    pub stop_timeout_secs: u64,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            ready_poll_interval_secs: 5,
            loop_interval_secs: 5,
            error_threshold: 5,
            refresh_every: 30,
            max_message_chars: 4000,
            forward_prefix: "📨 From MAX:\n".into(),
            recovery_delay_secs: 5,
            stop_timeout_secs: 20,
        }
    }
}

/// Persisted state file names and history bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub settings_file: String,
    pub registry_file: String,
    pub history_file: String,
    /// History length per destination that triggers truncation.
    pub history_cap: usize,
    /// Entries kept when the history is truncated.
    pub history_retain: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            settings_file: "bot_settings.json".into(),
            registry_file: "telegram_chats.json".into(),
            history_file: "processed_messages.json".into(),
            history_cap: 1000,
            history_retain: 900,
        }
    }
}
