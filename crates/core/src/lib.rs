//! TrashTracker domain core.
//!
//! Pure domain logic for the bin monitoring pipeline:
//!
//! - [`BinSnapshot`]: point-in-time view of one monitored bin.
//! - [`ThresholdCatalog`] and [`evaluate`]: which boundaries a level change
//!   crossed, and in which direction.
//! - [`ThresholdRegistry`]: per-bin fired flags and last seen levels.
//! - [`ThresholdAlert`]: a rendered crossing ready for delivery.
//!
//! Nothing in this crate performs I/O; the store and notification seams
//! live in the companion crates.

pub mod alert;
pub mod bin;
pub mod error;
pub mod registry;
pub mod threshold;
pub mod types;

pub use alert::ThresholdAlert;
pub use bin::BinSnapshot;
pub use error::CoreError;
pub use registry::ThresholdRegistry;
pub use threshold::{
    evaluate, Crossing, Direction, Severity, ThresholdCatalog, ThresholdDefinition,
    CRITICAL_BOUNDARY, WARNING_BOUNDARY,
};
pub use types::{BinId, Timestamp};
