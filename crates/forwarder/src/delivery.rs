use std::borrow::Cow;

use {async_trait::async_trait, maxrelay_common::DestinationId};

/// Sends text to the destination platform.
///
/// Implementations bound each call with their own timeout and report every
/// fault as `false`. They do not retry.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send(&self, destination: &DestinationId, text: &str) -> bool;
}

/// Cut `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_message(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((byte_idx, _)) => Cow::Owned(format!("{}...", &text[..byte_idx])),
    }
}
