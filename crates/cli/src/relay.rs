//! Wires the relay together and runs it until interrupted.

use std::{path::Path, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    maxrelay_auth::SessionAuthority,
    maxrelay_browser::ChromeSource,
    maxrelay_config::{RelayConfig, Severity, validate},
    maxrelay_forwarder::{Controller, EngineSettings, ForwardingEngine},
    maxrelay_store::Store,
    maxrelay_telegram::{ControlPlane, TelegramDelivery, build_bot, run_polling},
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

/// Subdirectory of the data dir holding the browser profile, so a manual
/// MAX login survives restarts.
const CHROME_PROFILE_DIR: &str = "chrome-profile";

/// Refuse to start on config errors; log warnings and carry on.
pub fn check_config(config: &RelayConfig) -> Result<()> {
    let mut errors = 0;
    for d in validate(config) {
        match d.severity {
            Severity::Error => {
                error!(path = d.path, "{}", d.message);
                errors += 1;
            },
            Severity::Warning => warn!(path = d.path, "{}", d.message),
        }
    }
    if errors > 0 {
        anyhow::bail!("configuration has {errors} error(s), run `maxrelay config check`");
    }
    Ok(())
}

pub async fn run(config: RelayConfig, data_dir: &Path) -> Result<()> {
    check_config(&config)?;

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let store = Arc::new(Store::open(data_dir, &config.store));

    let sessions = Arc::new(SessionAuthority::new(
        config.auth.admin_password.clone(),
        Duration::from_secs(config.auth.session_ttl_secs),
    ));

    let bot = build_bot(&config.telegram).context("failed to build the telegram client")?;
    let delivery = Arc::new(TelegramDelivery::new(
        bot.clone(),
        Duration::from_secs(config.telegram.request_timeout_secs),
    ));
    let source = Arc::new(ChromeSource::new(
        config.source.clone(),
        Some(data_dir.join(CHROME_PROFILE_DIR)),
    ));

    let engine = Arc::new(ForwardingEngine::new(
        source,
        delivery,
        Arc::clone(&store),
        EngineSettings::from(&config.forwarder),
    ));
    let controller = Arc::new(Controller::new(
        Arc::clone(&engine),
        Arc::clone(&sessions),
        Arc::clone(&store),
    ));
    let plane = Arc::new(ControlPlane::new(
        bot,
        controller,
        sessions,
        Arc::clone(&store),
    ));

    if store.settings().auto_start {
        info!("auto_start is set, starting forwarding");
        engine.start().await;
    }

    let cancel = CancellationToken::new();
    let polling = tokio::spawn(run_polling(
        plane,
        config.telegram.poll_timeout_secs,
        cancel.clone(),
    ));

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
            cancel.cancel();
            Ok(())
        }
        joined = polling => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::Error::new(e).context("telegram polling failed")),
            Err(e) => Err(anyhow::Error::new(e).context("telegram polling task panicked")),
        },
    };

    engine.stop().await;
    info!("maxrelay stopped");
    outcome
}
