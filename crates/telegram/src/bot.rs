use std::{sync::Arc, time::Duration};

use {
    maxrelay_config::TelegramConfig,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    commands::bot_commands,
    error::{Error, Result},
    handlers::ControlPlane,
};

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Build a bot whose HTTP client outlives the long-polling timeout, so the
/// client does not abort a `getUpdates` before Telegram answers it.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 15))
        .build()?;
    Ok(Bot::with_client(config.token.expose_secret(), client))
}

/// Long-poll for updates and hand them to the control plane until `cancel`
/// fires. Returns an error when the token is rejected at startup or another
/// instance takes over polling.
pub async fn run_polling(
    plane: Arc<ControlPlane>,
    poll_timeout_secs: u32,
    cancel: CancellationToken,
) -> Result<()> {
    let bot = plane.bot().clone();

    let me = bot.get_me().await?;
    // Long polling does not work while a webhook is set.
    bot.delete_webhook().send().await?;
    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!("failed to register bot commands: {e}");
    }
    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    let mut offset: i32 = 0;
    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(poll_timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

        let result = tokio::select! {
            () = cancel.cancelled() => {
                info!("telegram polling stopped");
                return Ok(());
            }
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                if !updates.is_empty() {
                    debug!(count = updates.len(), "got telegram updates");
                }
                for update in updates {
                    offset = update.id.as_offset();
                    handle_update(&plane, update.kind).await;
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!("another instance is polling with this bot token, giving up");
                return Err(Error::message(
                    "another bot instance is already running with this token",
                ));
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                }
            },
        }
    }
}

async fn handle_update(plane: &ControlPlane, kind: UpdateKind) {
    let (context, result) = match kind {
        UpdateKind::Message(msg) => {
            debug!(chat_id = msg.chat.id.0, "received telegram message");
            ("message handling failed", plane.handle_message(msg).await)
        },
        UpdateKind::CallbackQuery(query) => {
            debug!(callback_data = ?query.data, "received telegram callback query");
            (
                "button handling failed",
                plane.handle_callback_query(query).await,
            )
        },
        other => {
            debug!("ignoring update: {other:?}");
            return;
        },
    };
    if let Err(e) = result {
        warn!(error = %e, "{context}");
        plane.report_failure(context, &e).await;
    }
}
