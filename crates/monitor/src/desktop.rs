//! Desktop notification surface.
//!
//! Talks to the platform notification daemon via `notify-rust` on unix.
//! There is no browser-style permission prompt to forward, so permission
//! is probed instead: if the daemon answers a capabilities query, the
//! system channel is treated as granted. The in-app channel is the
//! daemon's own log output.

use async_trait::async_trait;
use trashtracker_core::Severity;

use crate::dispatch::{NotificationSurface, Permission};
use crate::error::MonitorError;

/// How long a desktop notification stays on screen, in milliseconds.
#[cfg(unix)]
const NOTIFICATION_TIMEOUT_MS: i32 = 5000;

#[derive(Debug, Default)]
pub struct DesktopSurface;

impl DesktopSurface {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSurface for DesktopSurface {
    async fn request_permission(&self) -> Permission {
        #[cfg(unix)]
        {
            match notify_rust::get_capabilities() {
                Ok(_) => Permission::Granted,
                Err(e) => {
                    tracing::warn!(error = %e, "No notification daemon reachable");
                    Permission::Denied
                }
            }
        }

        #[cfg(not(unix))]
        {
            Permission::Denied
        }
    }

    fn show(&self, title: &str, body: &str, severity: Severity) -> Result<(), MonitorError> {
        #[cfg(unix)]
        {
            use notify_rust::{Notification, Urgency};

            let (urgency, icon) = match severity {
                Severity::Critical => (Urgency::Critical, "dialog-error"),
                Severity::Warning => (Urgency::Normal, "dialog-warning"),
            };

            Notification::new()
                .summary(&format!("{title} - TrashTracker"))
                .body(body)
                .icon(icon)
                .urgency(urgency)
                .timeout(NOTIFICATION_TIMEOUT_MS)
                .show()
                .map(|_| ())
                .map_err(|e| MonitorError::Delivery(e.to_string()))
        }

        #[cfg(not(unix))]
        {
            let _ = (title, body, severity);
            Err(MonitorError::Delivery(
                "system notifications are not supported on this platform".to_string(),
            ))
        }
    }

    fn toast(&self, title: &str, body: &str) -> Result<(), MonitorError> {
        tracing::warn!(title, body, "In-app notification");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
