//! Authorization-gated command surface over the engine.

use std::{fmt, sync::Arc};

use {
    maxrelay_auth::SessionAuthority,
    maxrelay_common::{DestinationId, OperatorId},
    maxrelay_store::Store,
    tracing::{info, warn},
};

use crate::engine::{EngineStatus, ForwardingEngine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    MarkReady,
    SelectDestination(DestinationId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Started,
    AlreadyActive,
    Stopped,
    NotActive,
    ReadyAccepted,
    /// Active, but the run is past the manual login step.
    AlreadyReady,
    Unauthorized,
    NoDestinationSelected,
    UnknownDestination,
    DestinationSelected { label: String },
    /// The command took effect in the engine but its state was not saved.
    StorageFailed { detail: String },
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Started | Self::Stopped | Self::ReadyAccepted | Self::DestinationSelected { .. }
        )
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str(
                "🚀 Starting forwarding...\n\n1. A browser window opens\n2. Log in to MAX \
                 manually\n3. Press \"✅ I have logged in\"\n\nForwarding begins after that.",
            ),
            Self::AlreadyActive => f.write_str("ℹ️ Forwarding is already running."),
            Self::Stopped => f.write_str("🛑 Forwarding stopped."),
            Self::NotActive => f.write_str("ℹ️ Forwarding is not running."),
            Self::ReadyAccepted => f.write_str("✅ Great! Starting to forward messages..."),
            Self::AlreadyReady => f.write_str("ℹ️ Login was already confirmed."),
            Self::Unauthorized => f.write_str("❌ Access denied. Authenticate with /password first."),
            Self::NoDestinationSelected => f.write_str("❌ Select a destination chat first."),
            Self::UnknownDestination => f.write_str("❌ That chat is not registered."),
            Self::DestinationSelected { label } => write!(f, "✅ Selected chat: {label}"),
            Self::StorageFailed { detail } => write!(f, "⚠️ Could not save state: {detail}"),
        }
    }
}

/// Executes [`ControlCommand`]s on behalf of an operator.
pub struct Controller {
    engine: Arc<ForwardingEngine>,
    sessions: Arc<SessionAuthority>,
    store: Arc<Store>,
}

impl Controller {
    pub fn new(
        engine: Arc<ForwardingEngine>,
        sessions: Arc<SessionAuthority>,
        store: Arc<Store>,
    ) -> Self {
        Self {
            engine,
            sessions,
            store,
        }
    }

    pub async fn execute(&self, operator: OperatorId, command: ControlCommand) -> CommandOutcome {
        if !self.sessions.is_authorized(operator) {
            warn!(%operator, ?command, "unauthorized control command");
            return CommandOutcome::Unauthorized;
        }

        let outcome = match command {
            ControlCommand::Start => self.start().await,
            ControlCommand::Stop => self.stop().await,
            ControlCommand::MarkReady => self.mark_ready(),
            ControlCommand::SelectDestination(id) => self.select(id),
        };
        info!(%operator, ?outcome, "control command handled");
        outcome
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.status()
    }

    pub fn engine(&self) -> &Arc<ForwardingEngine> {
        &self.engine
    }

    async fn start(&self) -> CommandOutcome {
        if self.store.selected_destination().is_none() {
            return CommandOutcome::NoDestinationSelected;
        }
        if !self.engine.start().await {
            return CommandOutcome::AlreadyActive;
        }
        self.persist_intent(true, CommandOutcome::Started)
    }

    async fn stop(&self) -> CommandOutcome {
        if !self.engine.stop().await {
            return CommandOutcome::NotActive;
        }
        self.persist_intent(false, CommandOutcome::Stopped)
    }

    fn mark_ready(&self) -> CommandOutcome {
        if !self.engine.is_active() {
            return CommandOutcome::NotActive;
        }
        if self.engine.mark_ready() {
            CommandOutcome::ReadyAccepted
        } else {
            CommandOutcome::AlreadyReady
        }
    }

    fn select(&self, id: DestinationId) -> CommandOutcome {
        let Some(label) = self.store.destination_label(&id) else {
            return CommandOutcome::UnknownDestination;
        };
        match self.store.select_destination(id) {
            Ok(()) => CommandOutcome::DestinationSelected { label },
            Err(e) => {
                warn!(error = %e, "failed to persist selected destination");
                CommandOutcome::StorageFailed {
                    detail: format!("chat {label} was not selected ({e})"),
                }
            },
        }
    }

    fn persist_intent(&self, enabled: bool, done: CommandOutcome) -> CommandOutcome {
        match self.store.set_forwarding_enabled(enabled) {
            Ok(()) => done,
            Err(e) => {
                warn!(error = %e, "failed to persist forwarding flag");
                let state = if enabled { "started" } else { "stopped" };
                CommandOutcome::StorageFailed {
                    detail: format!("forwarding {state}, but the flag was not saved ({e})"),
                }
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::engine::{
            EnginePhase,
            tests::{ADMIN, Harness, HarnessBuilder, TARGET, wait_until},
        },
        maxrelay_config::StoreConfig,
        secrecy::Secret,
        std::time::Duration,
    };

    const OP: OperatorId = OperatorId(555);

    /// Put a non-empty directory where the settings file lives so every
    /// settings write fails.
    fn block_settings_writes(h: &Harness) {
        let path = h.tmp.path().join(StoreConfig::default().settings_file);
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "").unwrap();
    }

    fn controller(h: &Harness, login: bool) -> Controller {
        let sessions = Arc::new(SessionAuthority::new(
            Secret::new("pw".into()),
            Duration::from_secs(3600),
        ));
        if login {
            assert!(sessions.authenticate(OP, "pw"));
        }
        Controller::new(Arc::clone(&h.engine), sessions, Arc::clone(&h.store))
    }

    #[tokio::test]
    async fn test_unauthorized_commands_are_rejected() {
        let h = HarnessBuilder::new(|_| Vec::new()).build();
        let ctl = controller(&h, false);
        for cmd in [
            ControlCommand::Start,
            ControlCommand::Stop,
            ControlCommand::MarkReady,
            ControlCommand::SelectDestination(DestinationId::new(TARGET)),
        ] {
            assert_eq!(ctl.execute(OP, cmd).await, CommandOutcome::Unauthorized);
        }
        assert!(!h.engine.status().forwarding_active);
        assert_eq!(h.counters.acquires.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_requires_selected_destination() {
        let h = HarnessBuilder::new(|_| Vec::new()).no_destination().build();
        let ctl = controller(&h, true);
        assert_eq!(
            ctl.execute(OP, ControlCommand::Start).await,
            CommandOutcome::NoDestinationSelected
        );
        assert!(!h.engine.is_active());
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let h = HarnessBuilder::new(|_| Vec::new()).build();
        let ctl = controller(&h, true);

        assert_eq!(ctl.execute(OP, ControlCommand::Start).await, CommandOutcome::Started);
        assert!(h.store.settings().forwarding_enabled);
        assert_eq!(
            ctl.execute(OP, ControlCommand::Start).await,
            CommandOutcome::AlreadyActive
        );

        wait_until("manual ready phase", || {
            ctl.status().phase == EnginePhase::AwaitingManualReady
        })
        .await;
        assert_eq!(
            ctl.execute(OP, ControlCommand::MarkReady).await,
            CommandOutcome::ReadyAccepted
        );
        wait_until("forwarding phase", || ctl.status().phase == EnginePhase::Forwarding).await;
        assert_eq!(
            ctl.execute(OP, ControlCommand::MarkReady).await,
            CommandOutcome::AlreadyReady
        );

        assert_eq!(ctl.execute(OP, ControlCommand::Stop).await, CommandOutcome::Stopped);
        assert!(!h.store.settings().forwarding_enabled);
        assert_eq!(
            ctl.execute(OP, ControlCommand::Stop).await,
            CommandOutcome::NotActive
        );
        assert!(!h.delivery.delivered_to(ADMIN).is_empty());
    }

    #[tokio::test]
    async fn test_mark_ready_when_idle() {
        let h = HarnessBuilder::new(|_| Vec::new()).build();
        let ctl = controller(&h, true);
        assert_eq!(
            ctl.execute(OP, ControlCommand::MarkReady).await,
            CommandOutcome::NotActive
        );
    }

    #[tokio::test]
    async fn test_select_destination() {
        let h = HarnessBuilder::new(|_| Vec::new()).no_destination().build();
        let ctl = controller(&h, true);

        assert_eq!(
            ctl.execute(OP, ControlCommand::SelectDestination(DestinationId::new("777")))
                .await,
            CommandOutcome::UnknownDestination
        );
        assert_eq!(h.store.selected_destination(), None);

        let outcome = ctl
            .execute(OP, ControlCommand::SelectDestination(DestinationId::new(TARGET)))
            .await;
        assert_eq!(outcome, CommandOutcome::DestinationSelected {
            label: "Target group".into()
        });
        assert_eq!(outcome.to_string(), "✅ Selected chat: Target group");
        assert_eq!(h.store.selected_destination(), Some(DestinationId::new(TARGET)));
    }

    #[tokio::test]
    async fn test_select_reports_unsaved_selection() {
        let h = HarnessBuilder::new(|_| Vec::new()).no_destination().build();
        let ctl = controller(&h, true);
        block_settings_writes(&h);

        let outcome = ctl
            .execute(OP, ControlCommand::SelectDestination(DestinationId::new(TARGET)))
            .await;
        assert!(matches!(outcome, CommandOutcome::StorageFailed { .. }), "{outcome:?}");
        assert!(!outcome.is_success());
        assert!(outcome.to_string().contains("Target group"));
        assert_eq!(h.store.selected_destination(), None);
    }

    #[tokio::test]
    async fn test_start_reports_unsaved_flag() {
        let h = HarnessBuilder::new(|_| Vec::new()).build();
        let ctl = controller(&h, true);
        block_settings_writes(&h);

        let started = ctl.execute(OP, ControlCommand::Start).await;
        assert!(matches!(started, CommandOutcome::StorageFailed { .. }), "{started:?}");
        assert!(started.to_string().contains("forwarding started"));
        assert!(h.engine.is_active());
        assert!(!h.store.settings().forwarding_enabled);

        // The flag never left `false`, so there is nothing to write.
        assert_eq!(ctl.execute(OP, ControlCommand::Stop).await, CommandOutcome::Stopped);
        assert!(!h.engine.is_active());
    }
}
