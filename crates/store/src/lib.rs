//! External backend seams for the TrashTracker monitor.
//!
//! The production deployment keeps bins, their activity log, and user
//! sessions in a managed backend; this crate models that boundary as
//! traits the monitoring pipeline can be driven against:
//!
//! - [`BinStore`]: read/write access to the bin collection plus an
//!   optional row change feed.
//! - [`SessionProvider`]: whether a user is currently signed in.
//! - [`MemoryBinStore`]: the in-process implementation used by the demo
//!   daemon and the test suites.

pub mod change;
pub mod memory;
pub mod session;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use trashtracker_core::{BinId, BinSnapshot, CoreError, Timestamp};

pub use change::{BinChange, ChangeOp};
pub use memory::MemoryBinStore;
pub use session::{SessionProvider, StaticSession, UserSession};

/// An entry in a bin's activity log.
#[derive(Debug, Clone, Serialize)]
pub struct BinEvent {
    pub bin_id: BinId,
    /// Free-form description ("Fill level set to 85%", "Lid opened", ...).
    pub description: String,
    pub created_at: Timestamp,
}

/// Read/write access to the monitored bin collection.
///
/// Writes publish a [`BinChange`] on the change feed and append to the
/// bin's activity log, mirroring how the managed backend fans out row
/// changes to its realtime subscribers.
#[async_trait]
pub trait BinStore: Send + Sync {
    /// All bins, ordered by fill level descending (the dashboard order).
    async fn list_bins(&self) -> Result<Vec<BinSnapshot>, CoreError>;

    /// Create a bin with the given display name, empty and closed.
    async fn create_bin(&self, name: &str) -> Result<BinSnapshot, CoreError>;

    /// Delete a bin and its activity log.
    async fn delete_bin(&self, id: BinId) -> Result<(), CoreError>;

    /// Set a bin's fill level, in percent.
    async fn set_fill_level(&self, id: BinId, level: f64) -> Result<BinSnapshot, CoreError>;

    /// Open or close a bin's lid.
    async fn set_open(&self, id: BinId, open: bool) -> Result<BinSnapshot, CoreError>;

    /// Subscribe to the row change feed, when this store provides one.
    ///
    /// Stores without push delivery return `None`; consumers fall back to
    /// polling [`list_bins`](Self::list_bins).
    fn subscribe_changes(&self) -> Option<broadcast::Receiver<BinChange>>;

    /// The most recent activity-log entries for a bin, newest first.
    async fn recent_events(&self, id: BinId, limit: usize) -> Result<Vec<BinEvent>, CoreError>;
}
