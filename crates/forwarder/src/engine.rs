//! The forwarding engine.
//!
//! One worker task per run walks the lifecycle
//! `AcquiringSource → AwaitingManualReady → Navigating → Forwarding`
//! (with `Recovering` detours) until it is cancelled or fails. The worker owns
//! the source handle outright; control-plane code only reaches the engine
//! through [`ForwardingEngine::start`], [`stop`](ForwardingEngine::stop),
//! [`mark_ready`](ForwardingEngine::mark_ready) and
//! [`status`](ForwardingEngine::status).

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use {
    futures::FutureExt,
    maxrelay_common::DestinationId,
    maxrelay_config::ForwarderConfig,
    maxrelay_store::Store,
    serde::Serialize,
    tokio::{
        sync::{Mutex, Notify},
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    dedup::{Classification, Deduplicator},
    delivery::{DeliveryClient, truncate_message},
    error::{EngineError, Result},
    source::{self, SourceDriver, SourceHandle},
};

/// Timing and policy knobs, resolved from `[forwarder]`.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ready_poll_interval: Duration,
    pub loop_interval: Duration,
    pub error_threshold: u32,
    /// Refresh the source whenever the snapshot size is a multiple of this.
    /// Zero disables refreshing.
    pub refresh_every: usize,
    pub max_message_chars: usize,
    pub forward_prefix: String,
    pub recovery_delay: Duration,
    /// How long `stop()` waits for the worker before aborting it.
    pub stop_timeout: Duration,
}

impl From<&ForwarderConfig> for EngineSettings {
    fn from(cfg: &ForwarderConfig) -> Self {
        Self {
            ready_poll_interval: Duration::from_secs(cfg.ready_poll_interval_secs),
            loop_interval: Duration::from_secs(cfg.loop_interval_secs),
            error_threshold: cfg.error_threshold.max(1),
            refresh_every: cfg.refresh_every,
            max_message_chars: cfg.max_message_chars,
            forward_prefix: cfg.forward_prefix.clone(),
            recovery_delay: Duration::from_secs(cfg.recovery_delay_secs),
            stop_timeout: Duration::from_secs(cfg.stop_timeout_secs),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&ForwarderConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EnginePhase {
    Idle = 0,
    AcquiringSource = 1,
    AwaitingManualReady = 2,
    Navigating = 3,
    Forwarding = 4,
    Recovering = 5,
    Stopped = 6,
}

impl EnginePhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::AcquiringSource,
            2 => Self::AwaitingManualReady,
            3 => Self::Navigating,
            4 => Self::Forwarding,
            5 => Self::Recovering,
            6 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AcquiringSource => "starting browser",
            Self::AwaitingManualReady => "waiting for manual login",
            Self::Navigating => "opening target chat",
            Self::Forwarding => "forwarding",
            Self::Recovering => "recovering",
            Self::Stopped => "stopped",
        }
    }

    /// Phases in which `mark_ready` is honoured.
    pub fn accepts_ready(self) -> bool {
        matches!(self, Self::AcquiringSource | Self::AwaitingManualReady)
    }
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub forwarding_active: bool,
    pub source_ready: bool,
    pub consecutive_errors: u32,
    pub total_forwarded: u64,
    pub phase: EnginePhase,
    /// Time since the engine was created.
    pub uptime: Duration,
}

#[derive(Default)]
struct RuntimeState {
    active: AtomicBool,
    ready: AtomicBool,
    consecutive_errors: AtomicU32,
    total_forwarded: AtomicU64,
    phase: AtomicU8,
    ready_notify: Notify,
}

impl RuntimeState {
    fn phase(&self) -> EnginePhase {
        EnginePhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn set_phase(&self, phase: EnginePhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        debug!(%phase, "engine phase");
    }

    fn set_errors(&self, count: u32) {
        self.consecutive_errors.store(count, Ordering::SeqCst);
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ForwardingEngine {
    ctx: Arc<WorkerContext>,
    worker: Mutex<Option<Worker>>,
    created_at: Instant,
}

impl ForwardingEngine {
    pub fn new(
        driver: Arc<dyn SourceDriver>,
        delivery: Arc<dyn DeliveryClient>,
        store: Arc<Store>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            ctx: Arc::new(WorkerContext {
                driver,
                delivery,
                dedup: Deduplicator::new(Arc::clone(&store)),
                store,
                settings,
                state: RuntimeState::default(),
            }),
            worker: Mutex::new(None),
            created_at: Instant::now(),
        }
    }

    /// Begin a run in the background. Returns `false` without side effects
    /// when a run is already active.
    pub async fn start(&self) -> bool {
        let state = &self.ctx.state;
        // Held across the flag flip so `stop` never sees an active run
        // without its worker.
        let mut slot = self.worker.lock().await;
        if state
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("start ignored, forwarding already active");
            return false;
        }

        // A run that ended on its own leaves its finished handle behind.
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }

        state.ready.store(false, Ordering::SeqCst);
        state.set_errors(0);
        state.set_phase(EnginePhase::AcquiringSource);

        let cancel = CancellationToken::new();
        let ctx = Arc::clone(&self.ctx);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { ctx.run(token).await });
        *slot = Some(Worker { cancel, handle });
        info!("forwarding engine started");
        true
    }

    /// Cancel the current run and wait (bounded) until its source session is
    /// released. Safe to call at any time and from several tasks at once.
    /// Returns whether a run was active.
    pub async fn stop(&self) -> bool {
        let mut slot = self.worker.lock().await;
        let was_active = self.ctx.state.active.load(Ordering::SeqCst);
        let Some(worker) = slot.take() else {
            return false;
        };
        worker.cancel.cancel();

        let mut handle = worker.handle;
        if tokio::time::timeout(self.ctx.settings.stop_timeout, &mut handle)
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.ctx.settings.stop_timeout.as_secs(),
                "forwarding worker did not stop in time, aborting"
            );
            handle.abort();
            let _ = handle.await;
            let state = &self.ctx.state;
            state.ready.store(false, Ordering::SeqCst);
            state.set_phase(EnginePhase::Stopped);
            state.active.store(false, Ordering::SeqCst);
            self.ctx.notify_admin(STOPPED_NOTICE).await;
        }
        if was_active {
            info!("forwarding engine stopped");
        }
        was_active
    }

    /// Signal that the operator finished logging in to the source.
    /// Only honoured while a run is waiting for it.
    pub fn mark_ready(&self) -> bool {
        let state = &self.ctx.state;
        if !state.active.load(Ordering::SeqCst) || !state.phase().accepts_ready() {
            return false;
        }
        state.ready.store(true, Ordering::SeqCst);
        state.ready_notify.notify_one();
        info!("source marked ready");
        true
    }

    pub fn status(&self) -> EngineStatus {
        let state = &self.ctx.state;
        EngineStatus {
            forwarding_active: state.active.load(Ordering::SeqCst),
            source_ready: state.ready.load(Ordering::SeqCst),
            consecutive_errors: state.consecutive_errors.load(Ordering::SeqCst),
            total_forwarded: state.total_forwarded.load(Ordering::SeqCst),
            phase: state.phase(),
            uptime: self.created_at.elapsed(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ctx.state.active.load(Ordering::SeqCst)
    }
}

const STOPPED_NOTICE: &str = "🛑 Forwarding stopped";

/// Everything a worker needs; shared between the engine and its task.
struct WorkerContext {
    driver: Arc<dyn SourceDriver>,
    delivery: Arc<dyn DeliveryClient>,
    store: Arc<Store>,
    dedup: Deduplicator,
    settings: EngineSettings,
    state: RuntimeState,
}

#[derive(Debug, Default)]
struct DeliveryTally {
    delivered: u32,
    failed: u32,
}

impl WorkerContext {
    /// Worker entry point. Every exit path, panics included, releases the
    /// source session and clears the runtime flags.
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut session: Option<Box<dyn SourceHandle>> = None;
        let exit = AssertUnwindSafe(self.drive(&mut session, &cancel))
            .catch_unwind()
            .await;

        let failure = match exit {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(panic) => Some(EngineError::Crashed(panic_message(panic.as_ref()))),
        };

        if let Some(handle) = session.take() {
            handle.release().await;
            debug!("source session released");
        }

        if let Some(err) = failure {
            error!(error = %err, "forwarding run failed");
            self.record_error(&err.to_string());
            self.notify_admin(&format!("❌ {err}")).await;
        }

        self.state.ready.store(false, Ordering::SeqCst);
        self.state.set_phase(EnginePhase::Stopped);
        self.notify_admin(STOPPED_NOTICE).await;
        self.state.active.store(false, Ordering::SeqCst);
        info!("forwarding worker exited");
    }

    /// Returns `Ok(())` on cancellation and `Err` when the run must end.
    async fn drive(
        &self,
        session: &mut Option<Box<dyn SourceHandle>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.state.set_phase(EnginePhase::AcquiringSource);
        info!("acquiring source session");
        let handle = session.insert(
            self.driver
                .acquire()
                .await
                .map_err(EngineError::SourceAcquisition)?,
        );

        self.state.set_phase(EnginePhase::AwaitingManualReady);
        self.notify_admin(
            "🔐 Browser opened. Log in to MAX manually, then press \"I have logged in\" in the \
             bot menu.",
        )
        .await;
        if !self.await_ready(cancel).await || cancel.is_cancelled() {
            return Ok(());
        }

        self.state.set_phase(EnginePhase::Navigating);
        handle
            .navigate_to_target()
            .await
            .map_err(EngineError::Navigation)?;
        if cancel.is_cancelled() {
            return Ok(());
        }

        self.state.set_phase(EnginePhase::Forwarding);
        info!("forwarding started");
        self.notify_admin("🚀 Forwarding from MAX started").await;

        self.forward_loop(session, cancel).await
    }

    /// Wait for `mark_ready`, re-checking at least every poll interval.
    /// Returns `false` if cancelled first.
    async fn await_ready(&self, cancel: &CancellationToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            if self.state.ready.load(Ordering::SeqCst) {
                return true;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = self.state.ready_notify.notified() => {},
                _ = tokio::time::sleep(self.settings.ready_poll_interval) => {},
            }
        }
    }

    async fn forward_loop(
        &self,
        session: &mut Option<Box<dyn SourceHandle>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut errors: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let Some(handle) = session.as_deref_mut() else {
                return Err(EngineError::Crashed("source session lost".into()));
            };
            let messages = source::extract_messages(handle).await;
            debug!(count = messages.len(), "snapshot extracted");

            let Some(destination) = self.store.selected_destination() else {
                warn!("no destination selected, skipping iteration");
                if !self.pause(cancel, self.settings.loop_interval).await {
                    return Ok(());
                }
                continue;
            };

            let tally = self.deliver_new(&destination, &messages).await;
            if tally.delivered > 0 {
                errors = 0;
            } else {
                errors = errors.saturating_add(tally.failed);
            }
            self.state.set_errors(errors);

            if errors >= self.settings.error_threshold {
                if !self.recover(session, errors, cancel).await? {
                    return Ok(());
                }
                errors = 0;
            }

            if self.settings.refresh_every > 0
                && messages.len() % self.settings.refresh_every == 0
                && let Some(handle) = session.as_deref_mut()
            {
                debug!(count = messages.len(), "refreshing source");
                if let Err(e) = handle.refresh().await {
                    warn!(error = %e, "source refresh failed");
                    errors = errors.saturating_add(1);
                    self.state.set_errors(errors);
                }
            }

            if !self.pause(cancel, self.settings.loop_interval).await {
                return Ok(());
            }
        }
    }

    /// Forward every message not yet seen for `destination`, in order.
    async fn deliver_new(&self, destination: &DestinationId, messages: &[String]) -> DeliveryTally {
        let mut tally = DeliveryTally::default();
        for text in messages {
            let Classification::New(fingerprint) = self.dedup.classify(destination, text) else {
                continue;
            };
            // Record before sending so an overlapping snapshot never resends.
            if let Err(e) = self.dedup.record_seen(destination, fingerprint) {
                warn!(destination_id = %destination, error = %e, "failed to persist history");
            }

            let payload = format!(
                "{}{}",
                self.settings.forward_prefix,
                truncate_message(text, self.settings.max_message_chars)
            );
            if self.delivery.send(destination, &payload).await {
                tally.delivered += 1;
                self.state.total_forwarded.fetch_add(1, Ordering::SeqCst);
                info!(destination_id = %destination, preview = %preview(text), "message forwarded");
            } else {
                tally.failed += 1;
                warn!(destination_id = %destination, "delivery failed");
            }
        }
        tally
    }

    /// Replace the source session. `Ok(false)` means cancelled mid-way.
    async fn recover(
        &self,
        session: &mut Option<Box<dyn SourceHandle>>,
        errors: u32,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.state.set_phase(EnginePhase::Recovering);
        warn!(errors, "error threshold reached, restarting source");
        self.notify_admin(&format!(
            "⚠️ {errors} consecutive errors, restarting the browser..."
        ))
        .await;

        if let Some(old) = session.take() {
            old.release().await;
        }
        if !self.pause(cancel, self.settings.recovery_delay).await {
            return Ok(false);
        }

        let handle = session.insert(
            self.driver
                .acquire()
                .await
                .map_err(EngineError::Recovery)?,
        );
        handle
            .navigate_to_target()
            .await
            .map_err(EngineError::Recovery)?;

        self.state.set_errors(0);
        self.state.set_phase(EnginePhase::Forwarding);
        info!("source recovered");
        self.notify_admin("✅ Browser restarted, forwarding resumed").await;
        Ok(true)
    }

    /// Sleep unless cancelled. Returns `false` on cancellation.
    async fn pause(&self, cancel: &CancellationToken, duration: Duration) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Best-effort message to the admin chat.
    async fn notify_admin(&self, text: &str) {
        let Some(admin) = self.store.admin_destination() else {
            debug!("no admin chat configured, notification dropped");
            return;
        };
        if !self.delivery.send(&admin, text).await {
            warn!(destination_id = %admin, "admin notification not delivered");
        }
    }

    fn record_error(&self, message: &str) {
        if let Err(e) = self.store.record_error(message) {
            warn!(error = %e, "failed to persist last error");
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
