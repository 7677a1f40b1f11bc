//! Threshold-crossing coordinator.
//!
//! Wires one update source through the evaluator and registry to the
//! notification dispatcher. The coordinator owns the lifecycle: it seeds
//! a baseline from the store on start, consumes normalized updates on a
//! single queue so per-bin ordering is preserved, and tears both tasks
//! down on stop or sign-out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trashtracker_core::{
    evaluate, Direction, ThresholdAlert, ThresholdCatalog, ThresholdRegistry,
};
use trashtracker_store::{BinStore, SessionProvider, UserSession};

use crate::dispatch::NotificationDispatcher;
use crate::error::MonitorError;
use crate::source::{self, BinUpdate, SourceMode};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Poll period used when the store has no change feed.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Capacity of the internal update queue.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Tunables for the monitoring pipeline.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Which update transport to use.
    pub source: SourceMode,
    /// Poll period when the poll source is active.
    pub poll_interval: Duration,
    /// Capacity of the update queue between source and coordinator.
    pub queue_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source: SourceMode::Auto,
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                     | Required | Default | Description                 |
    /// |------------------------------|----------|---------|-----------------------------|
    /// | `MONITOR_SOURCE`             | no       | `auto`  | `auto`, `push`, or `poll`   |
    /// | `MONITOR_POLL_INTERVAL_SECS` | no       | `10`    | Poll period when polling    |
    pub fn from_env() -> Self {
        let source = match std::env::var("MONITOR_SOURCE")
            .ok()
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            Some("push") => SourceMode::Push,
            Some("poll") => SourceMode::Poll,
            Some("auto") | None => SourceMode::Auto,
            Some(other) => {
                tracing::warn!(value = other, "Unknown MONITOR_SOURCE, using auto");
                SourceMode::Auto
            }
        };

        let poll_interval = std::env::var("MONITOR_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        Self {
            source,
            poll_interval,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Lifecycle states, observable through [`Coordinator::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Stopped,
    /// Subscribing and seeding the baseline.
    Starting,
    Running,
}

/// Callback invoked for every upward crossing, after the registry update.
pub type CrossingCallback = Arc<dyn Fn(&ThresholdAlert) + Send + Sync>;

struct RunGuard {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

pub struct Coordinator {
    store: Arc<dyn BinStore>,
    catalog: ThresholdCatalog,
    dispatcher: Arc<NotificationDispatcher>,
    session: Option<Arc<dyn SessionProvider>>,
    config: MonitorConfig,
    callbacks: Vec<CrossingCallback>,
    state_tx: watch::Sender<CoordinatorState>,
    run: Mutex<Option<RunGuard>>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn BinStore>,
        catalog: ThresholdCatalog,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        let (state_tx, _) = watch::channel(CoordinatorState::Stopped);
        Self {
            store,
            catalog,
            dispatcher,
            session: None,
            config: MonitorConfig::default(),
            callbacks: Vec::new(),
            state_tx,
            run: Mutex::new(None),
        }
    }

    /// Gate the coordinator on an authentication session. Without a
    /// provider it runs unconditionally.
    pub fn with_session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a callback for upward crossings. Callbacks run on the
    /// coordinator task after the registry was updated, so they must not
    /// block.
    pub fn on_threshold_crossed(
        mut self,
        callback: impl Fn(&ThresholdAlert) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.push(Arc::new(callback));
        self
    }

    /// Watch lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<CoordinatorState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> CoordinatorState {
        *self.state_tx.borrow()
    }

    /// Start monitoring.
    ///
    /// Subscribes the update source, seeds the registry from a baseline
    /// fetch (existing levels never fire retroactively), and spawns the
    /// pipeline tasks. Fails if the coordinator is already running or the
    /// session gate has no signed-in user.
    pub async fn start(&self) -> Result<(), MonitorError> {
        let mut run = self.run.lock().await;
        if self.current_state() != CoordinatorState::Stopped {
            return Err(MonitorError::AlreadyRunning);
        }
        // A previous run that stopped itself leaves finished tasks behind.
        run.take();

        if let Some(provider) = &self.session {
            if provider.current_user().is_none() {
                return Err(MonitorError::NotAuthenticated);
            }
        }

        self.state_tx.send_replace(CoordinatorState::Starting);

        // Subscribe before the baseline fetch so no write can fall between
        // the two.
        let feed = match self.config.source {
            SourceMode::Poll => None,
            SourceMode::Push => match self.store.subscribe_changes() {
                Some(feed) => Some(feed),
                None => {
                    self.state_tx.send_replace(CoordinatorState::Stopped);
                    return Err(MonitorError::FeedUnavailable);
                }
            },
            SourceMode::Auto => self.store.subscribe_changes(),
        };

        // Baseline: current levels are a starting point, not crossings.
        let bins = match self.store.list_bins().await {
            Ok(bins) => bins,
            Err(e) => {
                self.state_tx.send_replace(CoordinatorState::Stopped);
                return Err(e.into());
            }
        };
        let mut registry = ThresholdRegistry::new();
        for bin in &bins {
            registry.set_last_level(bin.id, bin.fill_level);
        }
        tracing::info!(bins = bins.len(), "Baseline levels seeded");

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);

        let source_task = match feed {
            Some(feed) => {
                tracing::info!("Update source: change feed");
                source::spawn_push_source(self.store.clone(), feed, tx, cancel.clone())
            }
            None => {
                tracing::info!(
                    period_secs = self.config.poll_interval.as_secs(),
                    "Update source: polling"
                );
                source::spawn_poll_source(
                    self.store.clone(),
                    self.config.poll_interval,
                    tx,
                    cancel.clone(),
                )
            }
        };

        let ctx = LoopContext {
            registry,
            catalog: self.catalog.clone(),
            dispatcher: self.dispatcher.clone(),
            callbacks: self.callbacks.clone(),
            cancel: cancel.clone(),
            state_tx: self.state_tx.clone(),
            session_rx: self.session.as_ref().map(|provider| provider.watch()),
        };
        let loop_task = tokio::spawn(run_loop(ctx, rx));

        *run = Some(RunGuard {
            cancel,
            tasks: vec![source_task, loop_task],
        });
        self.state_tx.send_replace(CoordinatorState::Running);
        Ok(())
    }

    /// Stop monitoring and wait for the pipeline to wind down.
    ///
    /// Idempotent. After this returns no further dispatch is attempted; an
    /// update already being processed finishes first.
    pub async fn stop(&self) {
        let guard = self.run.lock().await.take();
        let Some(guard) = guard else { return };

        tracing::info!("Stopping coordinator");
        guard.cancel.cancel();
        for task in guard.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Coordinator task failed");
            }
        }
        self.state_tx.send_replace(CoordinatorState::Stopped);
    }
}

// ---------------------------------------------------------------------------
// Processing loop
// ---------------------------------------------------------------------------

struct LoopContext {
    registry: ThresholdRegistry,
    catalog: ThresholdCatalog,
    dispatcher: Arc<NotificationDispatcher>,
    callbacks: Vec<CrossingCallback>,
    cancel: CancellationToken,
    state_tx: watch::Sender<CoordinatorState>,
    session_rx: Option<watch::Receiver<Option<UserSession>>>,
}

async fn run_loop(mut ctx: LoopContext, mut rx: mpsc::Receiver<BinUpdate>) {
    let mut signed_out = Box::pin(wait_signed_out(ctx.session_rx.take()));

    // `true` when the loop decided to stop on its own and must publish the
    // state change itself; on external cancellation `stop()` does it after
    // joining us.
    let self_stopped = loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break false,
            _ = &mut signed_out => {
                tracing::info!("User signed out, coordinator stopping");
                break true;
            }
            update = rx.recv() => match update {
                Some(update) => {
                    apply_update(
                        &mut ctx.registry,
                        &ctx.catalog,
                        &ctx.dispatcher,
                        &ctx.callbacks,
                        update,
                    )
                    .await;
                }
                None => {
                    tracing::warn!("Update source ended");
                    break true;
                }
            }
        }
    };

    if self_stopped {
        ctx.cancel.cancel();
        ctx.state_tx.send_replace(CoordinatorState::Stopped);
        tracing::info!("Coordinator stopped");
    }
}

/// Resolves when the watched session signs out; pends forever without a
/// session provider.
async fn wait_signed_out(rx: Option<watch::Receiver<Option<UserSession>>>) {
    let Some(mut rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        if rx.borrow_and_update().is_none() {
            return;
        }
        if rx.changed().await.is_err() {
            // Provider dropped; the session can never change again.
            return std::future::pending().await;
        }
    }
}

/// Apply one normalized update to the registry, dispatching alerts for
/// upward crossings. Returns the alerts that were dispatched.
///
/// Ordering per crossing: dispatch, then mark fired, then run callbacks.
/// The fired mark does not depend on the delivery result, so a dead
/// notification channel cannot cause repeated alerts for one crossing.
pub(crate) async fn apply_update(
    registry: &mut ThresholdRegistry,
    catalog: &ThresholdCatalog,
    dispatcher: &NotificationDispatcher,
    callbacks: &[CrossingCallback],
    update: BinUpdate,
) -> Vec<ThresholdAlert> {
    let snapshot = match update {
        BinUpdate::Removed(bin_id) => {
            registry.forget(bin_id);
            tracing::debug!(bin_id, "Dropped registry state for deleted bin");
            return Vec::new();
        }
        BinUpdate::Changed(snapshot) => snapshot,
    };

    let old_level = registry.last_level(snapshot.id);
    let crossings = evaluate(snapshot.id, old_level, snapshot.fill_level, catalog, registry);

    let mut alerts = Vec::new();
    for crossing in &crossings {
        match crossing.direction {
            Direction::Up => {
                let alert = ThresholdAlert::from_crossing(crossing, &snapshot.name);
                tracing::info!(
                    bin_id = alert.bin_id,
                    bin = %alert.bin_name,
                    boundary = alert.boundary,
                    level = alert.level,
                    "Threshold crossed"
                );

                let result = dispatcher.dispatch(&alert).await;
                if !result.delivered() {
                    tracing::warn!(bin_id = alert.bin_id, "Alert could not be shown");
                }
                registry.set_fired(snapshot.id, crossing.threshold.boundary, true);

                for callback in callbacks {
                    callback(&alert);
                }
                alerts.push(alert);
            }
            Direction::Down => {
                registry.set_fired(snapshot.id, crossing.threshold.boundary, false);
                tracing::debug!(
                    bin_id = snapshot.id,
                    boundary = crossing.threshold.boundary,
                    "Threshold reset"
                );
            }
        }
    }

    registry.set_last_level(snapshot.id, snapshot.fill_level);
    alerts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
