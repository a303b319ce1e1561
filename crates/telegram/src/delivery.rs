//! Outbound delivery of forwarded text through the Bot API.

use std::time::Duration;

use {
    async_trait::async_trait,
    maxrelay_common::DestinationId,
    maxrelay_forwarder::DeliveryClient,
    teloxide::{RequestError, prelude::*},
    tracing::{debug, warn},
};

/// Plain-text `sendMessage` bounded by a per-call timeout.
#[derive(Clone)]
pub struct TelegramDelivery {
    bot: Bot,
    timeout: Duration,
}

impl TelegramDelivery {
    pub fn new(bot: Bot, timeout: Duration) -> Self {
        Self { bot, timeout }
    }
}

#[async_trait]
impl DeliveryClient for TelegramDelivery {
    async fn send(&self, destination: &DestinationId, text: &str) -> bool {
        let chat_id = match destination.as_chat_id() {
            Ok(id) => ChatId(id),
            Err(e) => {
                warn!(%destination, error = %e, "destination is not a telegram chat id");
                return false;
            },
        };

        let request = self.bot.send_message(chat_id, text).send();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(_)) => {
                debug!(%destination, chars = text.chars().count(), "message delivered");
                true
            },
            Ok(Err(e)) => {
                match retry_after_duration(&e) {
                    Some(wait) => warn!(
                        %destination,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit hit, message dropped"
                    ),
                    None => warn!(%destination, error = %e, "telegram send failed"),
                }
                false
            },
            Err(_) => {
                warn!(
                    %destination,
                    timeout_secs = self.timeout.as_secs(),
                    "telegram send timed out"
                );
                false
            },
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{MockBehavior, MockTelegramApi},
    };

    #[tokio::test]
    async fn test_send_delivers_plain_text() {
        let api = MockTelegramApi::start(MockBehavior::Ok).await;
        let delivery = TelegramDelivery::new(api.bot.clone(), Duration::from_secs(5));

        assert!(
            delivery
                .send(&DestinationId::new("-100123"), "📨 From MAX:\nhello <b>there</b>")
                .await
        );

        let sent = api.texts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, -100123);
        assert_eq!(sent[0].text, "📨 From MAX:\nhello <b>there</b>");
        assert_eq!(sent[0].parse_mode, None);
    }

    #[tokio::test]
    async fn test_api_error_is_reported_as_false() {
        let api = MockTelegramApi::start(MockBehavior::Reject).await;
        let delivery = TelegramDelivery::new(api.bot.clone(), Duration::from_secs(5));

        assert!(!delivery.send(&DestinationId::new("42"), "hi").await);
        assert_eq!(api.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_api_times_out() {
        let api = MockTelegramApi::start(MockBehavior::Slow(Duration::from_secs(2))).await;
        let delivery = TelegramDelivery::new(api.bot.clone(), Duration::from_millis(100));

        assert!(!delivery.send(&DestinationId::new("42"), "hi").await);
    }

    #[tokio::test]
    async fn test_non_numeric_destination_is_not_sent() {
        let api = MockTelegramApi::start(MockBehavior::Ok).await;
        let delivery = TelegramDelivery::new(api.bot.clone(), Duration::from_secs(5));

        assert!(!delivery.send(&DestinationId::new("general"), "hi").await);
        assert!(api.requests().is_empty());
    }

    #[test]
    fn test_retry_after_duration_extracts_wait() {
        let err = RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(42));
        assert_eq!(retry_after_duration(&err), Some(Duration::from_secs(42)));
        let other = RequestError::Io(std::io::Error::other("boom"));
        assert_eq!(retry_after_duration(&other), None);
    }
}
