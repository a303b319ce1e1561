//! Source driver capability.
//!
//! The engine never sees the automation technology behind a source. It asks a
//! [`SourceDriver`] for a fresh [`SourceHandle`], owns that handle exclusively,
//! and hands it back through [`SourceHandle::release`] when done.

use async_trait::async_trait;

use crate::error::SourceError;

/// Launches source sessions.
#[async_trait]
pub trait SourceDriver: Send + Sync {
    /// Start a new session, ready for manual login.
    async fn acquire(&self) -> Result<Box<dyn SourceHandle>, SourceError>;
}

/// A live source session. Dropping it must tear the session down on a
/// best-effort basis; [`release`](Self::release) is the orderly path.
#[async_trait]
pub trait SourceHandle: Send {
    /// Open the configured target conversation.
    async fn navigate_to_target(&mut self) -> Result<(), SourceError>;

    /// Raw texts of the most recent visible elements, oldest first.
    ///
    /// Unreadable elements are skipped; the snapshot itself never fails.
    async fn snapshot_texts(&mut self) -> Vec<String>;

    async fn refresh(&mut self) -> Result<(), SourceError>;

    /// Close the session. Must tolerate a session that already died.
    async fn release(self: Box<Self>);
}

/// Bounds on a candidate message, in characters (exclusive).
const MIN_CHARS: usize = 5;
const MAX_CHARS: usize = 1000;
/// Texts longer than this qualify without a conversational marker.
const FREE_TEXT_CHARS: usize = 20;

/// Substrings that suggest a chat line (author separator, "wrote", "sent").
const CONVERSATION_MARKERS: &[&str] = &[":", "написал", "отправлено", "message"];

/// Best-effort guess whether a visible text fragment is a chat message.
pub fn is_candidate_message(text: &str) -> bool {
    let chars = text.chars().count();
    if chars <= MIN_CHARS || chars >= MAX_CHARS {
        return false;
    }
    if text.starts_with("http") {
        return false;
    }
    let lowered = text.to_lowercase();
    CONVERSATION_MARKERS.iter().any(|m| lowered.contains(m)) || chars > FREE_TEXT_CHARS
}

/// Take a snapshot and keep only the fragments that look like messages.
pub async fn extract_messages(handle: &mut dyn SourceHandle) -> Vec<String> {
    handle
        .snapshot_texts()
        .await
        .into_iter()
        .map(|text| text.trim().to_string())
        .filter(|text| is_candidate_message(text))
        .collect()
}
