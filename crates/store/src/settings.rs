use {
    maxrelay_common::DestinationId,
    serde::{Deserialize, Serialize},
};

/// Singleton settings record (`bot_settings.json`).
///
/// Absent keys fall back to their defaults; the legacy `admin_chat_id` and
/// `selected_chat_id` key names are still accepted on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Operator intent: set by an accepted start, cleared by an accepted stop.
    pub forwarding_enabled: bool,
    /// Chat of the first operator that authenticated. Written once.
    #[serde(alias = "admin_chat_id")]
    pub admin_operator_id: Option<DestinationId>,
    #[serde(alias = "selected_chat_id")]
    pub selected_destination_id: Option<DestinationId>,
    /// Start the engine as soon as the process boots.
    pub auto_start: bool,
    /// `"<RFC3339 timestamp>: <message>"` of the last surfaced failure.
    pub last_error: Option<String>,
}
