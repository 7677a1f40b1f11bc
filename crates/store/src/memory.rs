//! In-memory bin store with a broadcast change feed.
//!
//! Stands in for the managed backend: a map of rows behind an `RwLock`
//! plus a `tokio::sync::broadcast` channel that plays the role of the
//! realtime change feed. Shared via `Arc<MemoryBinStore>`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use trashtracker_core::{BinId, BinSnapshot, CoreError};

use crate::change::BinChange;
use crate::{BinEvent, BinStore};

/// Default buffer capacity for the change feed.
const FEED_CAPACITY: usize = 256;

/// Activity-log entries retained per bin; older entries are dropped.
const EVENT_LOG_CAP: usize = 50;

#[derive(Default)]
struct State {
    rows: HashMap<BinId, BinSnapshot>,
    events: HashMap<BinId, VecDeque<BinEvent>>,
}

pub struct MemoryBinStore {
    state: RwLock<State>,
    feed: broadcast::Sender<BinChange>,
    next_id: AtomicI64,
}

impl MemoryBinStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(FEED_CAPACITY)
    }

    /// Create a store with a specific change-feed buffer capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow subscribers observe a `RecvError::Lagged`.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        Self {
            state: RwLock::new(State::default()),
            feed,
            next_id: AtomicI64::new(1),
        }
    }

    /// Publish a change while the state lock is still held, so the feed
    /// order for any one bin matches its write order.
    fn publish(&self, change: BinChange) {
        // Ignore the SendError, it only means there are zero subscribers.
        let _ = self.feed.send(change);
    }
}

impl Default for MemoryBinStore {
    fn default() -> Self {
        Self::new()
    }
}

fn record_event(state: &mut State, bin_id: BinId, description: String) {
    let log = state.events.entry(bin_id).or_default();
    log.push_back(BinEvent {
        bin_id,
        description,
        created_at: Utc::now(),
    });
    while log.len() > EVENT_LOG_CAP {
        log.pop_front();
    }
}

#[async_trait]
impl BinStore for MemoryBinStore {
    async fn list_bins(&self) -> Result<Vec<BinSnapshot>, CoreError> {
        let state = self.state.read().await;
        let mut bins: Vec<BinSnapshot> = state.rows.values().cloned().collect();
        bins.sort_by(|a, b| {
            b.fill_level
                .total_cmp(&a.fill_level)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(bins)
    }

    async fn create_bin(&self, name: &str) -> Result<BinSnapshot, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation(
                "bin name must not be empty".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let bin = BinSnapshot {
            id,
            name: name.to_string(),
            fill_level: 0.0,
            is_open: false,
            updated_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        state.rows.insert(id, bin.clone());
        record_event(&mut state, id, format!("Bin \"{name}\" created"));
        self.publish(BinChange::inserted(bin.clone()));
        drop(state);

        tracing::debug!(bin_id = id, name, "Bin created");
        Ok(bin)
    }

    async fn delete_bin(&self, id: BinId) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        let old = state
            .rows
            .remove(&id)
            .ok_or(CoreError::NotFound { entity: "bin", id })?;
        state.events.remove(&id);
        self.publish(BinChange::deleted(old));
        drop(state);

        tracing::debug!(bin_id = id, "Bin deleted");
        Ok(())
    }

    async fn set_fill_level(&self, id: BinId, level: f64) -> Result<BinSnapshot, CoreError> {
        if !level.is_finite() || level < 0.0 {
            return Err(CoreError::Validation(format!(
                "fill level must be a non-negative number, got {level}"
            )));
        }

        let mut state = self.state.write().await;
        let row = state
            .rows
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "bin", id })?;
        let old = row.clone();
        row.fill_level = level;
        row.updated_at = Utc::now();
        let new = row.clone();

        let description = if level == 0.0 {
            "Bin emptied".to_string()
        } else {
            format!("Fill level set to {level}%")
        };
        record_event(&mut state, id, description);
        self.publish(BinChange::updated(old, new.clone()));
        drop(state);

        tracing::debug!(bin_id = id, level, "Fill level updated");
        Ok(new)
    }

    async fn set_open(&self, id: BinId, open: bool) -> Result<BinSnapshot, CoreError> {
        let mut state = self.state.write().await;
        let row = state
            .rows
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "bin", id })?;
        let old = row.clone();
        row.is_open = open;
        row.updated_at = Utc::now();
        let new = row.clone();

        let description = if open { "Lid opened" } else { "Lid closed" };
        record_event(&mut state, id, description.to_string());
        self.publish(BinChange::updated(old, new.clone()));
        drop(state);

        Ok(new)
    }

    fn subscribe_changes(&self) -> Option<broadcast::Receiver<BinChange>> {
        Some(self.feed.subscribe())
    }

    async fn recent_events(&self, id: BinId, limit: usize) -> Result<Vec<BinEvent>, CoreError> {
        let state = self.state.read().await;
        if !state.rows.contains_key(&id) {
            return Err(CoreError::NotFound { entity: "bin", id });
        }
        let events = state
            .events
            .get(&id)
            .map(|log| log.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeOp;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn create_assigns_sequential_ids_and_publishes_insert() {
        let store = MemoryBinStore::new();
        let mut feed = store.subscribe_changes().expect("memory store has a feed");

        let first = store.create_bin("Main entrance").await.expect("create");
        let second = store.create_bin("Cafeteria").await.expect("create");
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.fill_level, 0.0);
        assert!(!first.is_open);

        let change = feed.recv().await.expect("insert message");
        assert_eq!(change.op, ChangeOp::Insert);
        assert_eq!(change.bin_id(), Some(1));
    }

    #[tokio::test]
    async fn create_rejects_blank_names() {
        let store = MemoryBinStore::new();
        assert_matches!(
            store.create_bin("   ").await,
            Err(CoreError::Validation(_))
        );
    }

    #[tokio::test]
    async fn list_orders_by_fill_level_descending() {
        let store = MemoryBinStore::new();
        let a = store.create_bin("a").await.expect("create");
        let b = store.create_bin("b").await.expect("create");
        let c = store.create_bin("c").await.expect("create");

        store.set_fill_level(a.id, 30.0).await.expect("update");
        store.set_fill_level(b.id, 90.0).await.expect("update");
        store.set_fill_level(c.id, 30.0).await.expect("update");

        let bins = store.list_bins().await.expect("list");
        let ids: Vec<BinId> = bins.iter().map(|bin| bin.id).collect();
        // Ties keep id order.
        assert_eq!(ids, vec![b.id, a.id, c.id]);
    }

    #[tokio::test]
    async fn set_fill_level_publishes_update_with_both_row_images() {
        let store = MemoryBinStore::new();
        let bin = store.create_bin("Dock").await.expect("create");
        let mut feed = store.subscribe_changes().expect("feed");

        store.set_fill_level(bin.id, 85.0).await.expect("update");
        let change = feed.recv().await.expect("update message");
        assert_eq!(change.op, ChangeOp::Update);
        assert_eq!(change.old.as_ref().map(|b| b.fill_level), Some(0.0));
        assert_eq!(change.new.as_ref().map(|b| b.fill_level), Some(85.0));
    }

    #[tokio::test]
    async fn set_fill_level_rejects_bad_values() {
        let store = MemoryBinStore::new();
        let bin = store.create_bin("Dock").await.expect("create");

        assert_matches!(
            store.set_fill_level(bin.id, -1.0).await,
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            store.set_fill_level(bin.id, f64::NAN).await,
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            store.set_fill_level(999, 10.0).await,
            Err(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn updates_for_one_bin_arrive_in_write_order() {
        let store = MemoryBinStore::new();
        let bin = store.create_bin("Dock").await.expect("create");
        let mut feed = store.subscribe_changes().expect("feed");

        store.set_fill_level(bin.id, 60.0).await.expect("update");
        store.set_fill_level(bin.id, 85.0).await.expect("update");
        store.set_fill_level(bin.id, 100.0).await.expect("update");

        let mut levels = Vec::new();
        for _ in 0..3 {
            let change = feed.recv().await.expect("update message");
            levels.push(change.new.expect("update has new row").fill_level);
        }
        assert_eq!(levels, vec![60.0, 85.0, 100.0]);
    }

    #[tokio::test]
    async fn delete_removes_row_and_activity_log() {
        let store = MemoryBinStore::new();
        let bin = store.create_bin("Dock").await.expect("create");
        let mut feed = store.subscribe_changes().expect("feed");

        store.delete_bin(bin.id).await.expect("delete");

        assert!(store.list_bins().await.expect("list").is_empty());
        assert_matches!(
            store.recent_events(bin.id, 10).await,
            Err(CoreError::NotFound { .. })
        );

        let change = feed.recv().await.expect("delete message");
        assert_eq!(change.op, ChangeOp::Delete);
        assert_eq!(change.bin_id(), Some(bin.id));
    }

    #[tokio::test]
    async fn activity_log_caps_retained_entries() {
        let store = MemoryBinStore::new();
        let bin = store.create_bin("Dock").await.expect("create");

        for level in 1..=60 {
            store
                .set_fill_level(bin.id, f64::from(level))
                .await
                .expect("update");
        }

        let events = store.recent_events(bin.id, 100).await.expect("events");
        assert_eq!(events.len(), EVENT_LOG_CAP);
        // Newest first.
        assert_eq!(events[0].description, "Fill level set to 60%");
    }

    #[tokio::test]
    async fn recent_events_respects_limit_and_order() {
        let store = MemoryBinStore::new();
        let bin = store.create_bin("Dock").await.expect("create");
        store.set_open(bin.id, true).await.expect("open");
        store.set_fill_level(bin.id, 40.0).await.expect("update");

        let events = store.recent_events(bin.id, 2).await.expect("events");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].description, "Fill level set to 40%");
        assert_eq!(events[1].description, "Lid opened");
    }

    #[tokio::test]
    async fn emptying_a_bin_is_logged_as_collection() {
        let store = MemoryBinStore::new();
        let bin = store.create_bin("Dock").await.expect("create");
        store.set_fill_level(bin.id, 100.0).await.expect("update");
        store.set_fill_level(bin.id, 0.0).await.expect("update");

        let events = store.recent_events(bin.id, 1).await.expect("events");
        assert_eq!(events[0].description, "Bin emptied");
    }
}
