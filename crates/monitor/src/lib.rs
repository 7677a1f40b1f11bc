//! TrashTracker threshold monitoring and notification pipeline.
//!
//! This crate watches bin fill levels and raises desktop notifications
//! when a bin crosses a capacity threshold:
//!
//! - [`Coordinator`] -- lifecycle owner wiring an update source through
//!   the threshold evaluator to the dispatcher.
//! - [`BinUpdate`] -- normalized change stream consumed by the
//!   coordinator, produced by a push (change feed) or poll source.
//! - [`NotificationDispatcher`] -- permission lifecycle and delivery
//!   with in-app fallback.
//! - [`DesktopSurface`] -- OS notification backend.
//! - [`sms`] -- simulated SMS escalation for critical alerts.

pub mod coordinator;
pub mod desktop;
pub mod dispatch;
pub mod error;
pub mod sms;
pub mod source;

pub use coordinator::{Coordinator, CoordinatorState, CrossingCallback, MonitorConfig};
pub use desktop::DesktopSurface;
pub use dispatch::{DeliveryResult, NotificationDispatcher, NotificationSurface, Permission};
pub use error::MonitorError;
pub use source::{BinUpdate, SourceMode};
