//! Update sources feeding the coordinator.
//!
//! Exactly one source runs per coordinator. The push source consumes the
//! store's row change feed and resubscribes with a fixed delay whenever
//! the feed closes; the poll source fetches the full bin list on a timer
//! and diffs it against the previous fetch. Both normalize to
//! [`BinUpdate`] messages on an `mpsc` queue, which keeps updates for any
//! one bin in arrival order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trashtracker_core::{BinId, BinSnapshot};
use trashtracker_store::{BinChange, BinStore, ChangeOp};

/// Delay before resubscribing after the change feed closes.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Which transport feeds bin updates to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Use the store's change feed when it has one, otherwise poll.
    Auto,
    Push,
    Poll,
}

/// A normalized update consumed by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum BinUpdate {
    /// The bin was created or its row changed; carries the new snapshot.
    Changed(BinSnapshot),
    /// The bin disappeared from the store.
    Removed(BinId),
}

/// Map one change-feed message to a coordinator update.
///
/// Malformed messages (missing the row image their operation implies) are
/// logged and dropped rather than poisoning the pipeline.
pub(crate) fn normalize(change: BinChange) -> Option<BinUpdate> {
    match change.op {
        ChangeOp::Insert | ChangeOp::Update => match change.new {
            Some(snapshot) => Some(BinUpdate::Changed(snapshot)),
            None => {
                tracing::warn!(op = ?change.op, "Malformed change message without a new row");
                None
            }
        },
        ChangeOp::Delete => match change.old {
            Some(snapshot) => Some(BinUpdate::Removed(snapshot.id)),
            None => {
                tracing::warn!("Malformed delete message without an old row");
                None
            }
        },
    }
}

/// Diff a fresh fetch against the previous one.
///
/// Emits one `Changed` per new or modified bin and one `Removed` per bin
/// that disappeared. Unchanged bins produce nothing, so a quiet store
/// generates no work downstream.
pub(crate) fn diff_snapshots(
    previous: &HashMap<BinId, BinSnapshot>,
    current: &[BinSnapshot],
) -> Vec<BinUpdate> {
    let mut updates = Vec::new();

    for bin in current {
        if previous.get(&bin.id) != Some(bin) {
            updates.push(BinUpdate::Changed(bin.clone()));
        }
    }

    for id in previous.keys() {
        if !current.iter().any(|bin| bin.id == *id) {
            updates.push(BinUpdate::Removed(*id));
        }
    }

    updates
}

/// Spawn the push source: consume the change feed until cancelled.
///
/// The first subscription is taken by the caller before it seeds its
/// baseline, so no write can fall between the two; this task only
/// resubscribes after later feed closures.
pub(crate) fn spawn_push_source(
    store: Arc<dyn BinStore>,
    feed: broadcast::Receiver<BinChange>,
    tx: mpsc::Sender<BinUpdate>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_push(store, feed, tx, cancel))
}

/// Spawn the poll source: fetch and diff on a fixed interval until cancelled.
pub(crate) fn spawn_poll_source(
    store: Arc<dyn BinStore>,
    period: Duration,
    tx: mpsc::Sender<BinUpdate>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_poll(store, period, tx, cancel))
}

async fn run_push(
    store: Arc<dyn BinStore>,
    mut feed: broadcast::Receiver<BinChange>,
    tx: mpsc::Sender<BinUpdate>,
    cancel: CancellationToken,
) {
    loop {
        // Consume the current subscription until it closes or we are
        // cancelled.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Push source stopping");
                    return;
                }
                msg = feed.recv() => match msg {
                    Ok(change) => {
                        let Some(update) = normalize(change) else { continue };
                        if tx.send(update).await.is_err() {
                            // Consumer gone, nothing left to feed.
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Change feed lagged, updates were dropped");
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!(
                            delay_secs = RESUBSCRIBE_DELAY.as_secs(),
                            "Change feed closed, resubscribing"
                        );
                        break;
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
        }

        match store.subscribe_changes() {
            Some(next) => {
                feed = next;
                tracing::info!("Resubscribed to bin change feed");
            }
            None => {
                tracing::error!("Change feed no longer available, push source stopping");
                return;
            }
        }
    }
}

async fn run_poll(
    store: Arc<dyn BinStore>,
    period: Duration,
    tx: mpsc::Sender<BinUpdate>,
    cancel: CancellationToken,
) {
    tracing::info!(period_secs = period.as_secs(), "Poll source started");

    let mut interval = tokio::time::interval(period);
    let mut previous: HashMap<BinId, BinSnapshot> = HashMap::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Poll source stopping");
                return;
            }
            _ = interval.tick() => {
                match store.list_bins().await {
                    Ok(bins) => {
                        let updates = diff_snapshots(&previous, &bins);
                        previous = bins.into_iter().map(|bin| (bin.id, bin)).collect();
                        for update in updates {
                            if tx.send(update).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        // Transient fetch failures only skip this round.
                        tracing::error!(error = %e, "Poll fetch failed");
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
