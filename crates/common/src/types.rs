//! Identifier newtypes shared by the store, the engine and the bot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Platform-native chat/channel identifier that messages are forwarded into.
///
/// Kept as an opaque string so the persisted registry stays platform
/// agnostic; Telegram chat IDs are signed integers rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawDestinationId")]
pub struct DestinationId(String);

/// Older state files stored chat IDs as JSON numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDestinationId {
    Text(String),
    Number(i64),
}

impl From<RawDestinationId> for DestinationId {
    fn from(raw: RawDestinationId) -> Self {
        match raw {
            RawDestinationId::Text(id) => Self(id),
            RawDestinationId::Number(id) => Self(id.to_string()),
        }
    }
}

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the identifier as a numeric chat ID.
    pub fn as_chat_id(&self) -> Result<i64> {
        self.0
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::invalid_id("destination", self.0.clone()))
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for DestinationId {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

impl From<&str> for DestinationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DestinationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Control-plane user identity (a Telegram user ID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub u64);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
