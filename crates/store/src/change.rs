//! Row-level change feed messages.
//!
//! The shape mirrors what a managed database pushes over its realtime
//! channel: an operation tag plus the old and new row images where the
//! operation has them. Delivery is at-least-once; messages for one bin
//! arrive in write order, messages for different bins may interleave.

use serde::Serialize;
use trashtracker_core::{BinId, BinSnapshot};

/// Which row operation produced a change message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A single change message for the bin collection.
#[derive(Debug, Clone, Serialize)]
pub struct BinChange {
    pub op: ChangeOp,
    /// Row image before the write. `None` for inserts.
    pub old: Option<BinSnapshot>,
    /// Row image after the write. `None` for deletes.
    pub new: Option<BinSnapshot>,
}

impl BinChange {
    pub fn inserted(new: BinSnapshot) -> Self {
        Self {
            op: ChangeOp::Insert,
            old: None,
            new: Some(new),
        }
    }

    pub fn updated(old: BinSnapshot, new: BinSnapshot) -> Self {
        Self {
            op: ChangeOp::Update,
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn deleted(old: BinSnapshot) -> Self {
        Self {
            op: ChangeOp::Delete,
            old: Some(old),
            new: None,
        }
    }

    /// The id of the row this change concerns.
    pub fn bin_id(&self) -> Option<BinId> {
        self.new.as_ref().or(self.old.as_ref()).map(|bin| bin.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
