//! Monitored bin snapshot types.

use serde::{Deserialize, Serialize};

use crate::types::{BinId, Timestamp};

/// A point-in-time view of one monitored trash bin.
///
/// Rows are owned by the backing store; the monitoring pipeline only ever
/// holds copies and never writes them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSnapshot {
    pub id: BinId,
    /// Display name shown in alerts ("Main entrance", ...).
    pub name: String,
    /// Current fill level in percent. Normally 0-100, but sensors may
    /// briefly report values above 100 during compaction.
    pub fill_level: f64,
    /// Whether the lid is currently open.
    pub is_open: bool,
    /// When the row was last written.
    pub updated_at: Timestamp,
}
