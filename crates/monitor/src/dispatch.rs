//! Notification dispatch with permission handling and fallback.
//!
//! [`NotificationDispatcher`] owns the user-permission lifecycle for the
//! system notification channel: it prompts exactly once on first use,
//! never re-prompts after a denial, and degrades to the in-app channel
//! when the system one is unavailable or fails. Exactly one channel shows
//! any given alert.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use trashtracker_core::{Severity, ThresholdAlert};

use crate::error::MonitorError;

// ---------------------------------------------------------------------------
// Permission and results
// ---------------------------------------------------------------------------

/// User-permission state for the system notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// The user has never been asked.
    NotRequested,
    Granted,
    Denied,
}

/// Which channel ended up showing a dispatched alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Shown by the system notification surface.
    System,
    /// Shown by the in-app fallback.
    Toast,
    /// Every channel failed; the alert was logged and dropped.
    Failed,
}

impl DeliveryResult {
    pub fn delivered(&self) -> bool {
        !matches!(self, DeliveryResult::Failed)
    }
}

// ---------------------------------------------------------------------------
// NotificationSurface
// ---------------------------------------------------------------------------

/// Capability handle to the platform notification machinery.
///
/// Three operations: ask for permission, show through the system surface,
/// and show through the in-app fallback. Implemented by
/// [`DesktopSurface`](crate::desktop::DesktopSurface) in production and by
/// recording doubles in tests.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Ask the user for permission to use the system channel.
    ///
    /// May suspend on user interaction. Returning
    /// [`Permission::NotRequested`] means the prompt was dismissed without
    /// an answer; the dispatcher will ask again on the next alert.
    async fn request_permission(&self) -> Permission;

    /// Show a system-level notification.
    fn show(&self, title: &str, body: &str, severity: Severity) -> Result<(), MonitorError>;

    /// Show an in-app notification.
    fn toast(&self, title: &str, body: &str) -> Result<(), MonitorError>;
}

// ---------------------------------------------------------------------------
// NotificationDispatcher
// ---------------------------------------------------------------------------

const GRANT_TITLE: &str = "Notifications enabled";
const GRANT_BODY: &str = "You will get an alert when a bin reaches a critical fill level.";

const DENIED_TITLE: &str = "Notifications blocked";
const DENIED_BODY: &str = "System notifications are disabled for TrashTracker. Enable them in \
                           your system settings to get bin alerts outside the app.";

const TEST_TITLE: &str = "Test notification";
const TEST_BODY: &str = "This is a delivery test. If you can read this, notifications work.";

#[derive(Debug)]
struct DispatchState {
    permission: Permission,
    /// Whether the one-time "notifications are blocked" notice went out.
    denied_notice_shown: bool,
}

/// Delivers alerts through the system channel with an in-app fallback.
///
/// The surface handle acquired at construction is kept for the life of the
/// process and reused for every delivery; a granted permission therefore
/// applies to all later alerts without further prompting.
pub struct NotificationDispatcher {
    surface: Arc<dyn NotificationSurface>,
    state: Mutex<DispatchState>,
}

impl NotificationDispatcher {
    pub fn new(surface: Arc<dyn NotificationSurface>) -> Self {
        Self {
            surface,
            state: Mutex::new(DispatchState {
                permission: Permission::NotRequested,
                denied_notice_shown: false,
            }),
        }
    }

    /// Deliver a threshold alert through exactly one channel.
    ///
    /// A failed delivery is reported, never retried: the caller records the
    /// crossing as fired either way, so a broken notification daemon cannot
    /// cause an alert storm.
    pub async fn dispatch(&self, alert: &ThresholdAlert) -> DeliveryResult {
        self.deliver(&alert.title, &alert.message, alert.severity)
            .await
    }

    /// Send a canned test notification through the regular delivery chain.
    pub async fn send_test(&self) -> DeliveryResult {
        self.deliver(TEST_TITLE, TEST_BODY, Severity::Warning).await
    }

    /// Current permission state, for status logging.
    pub async fn permission(&self) -> Permission {
        self.state.lock().await.permission
    }

    async fn deliver(&self, title: &str, body: &str, severity: Severity) -> DeliveryResult {
        let mut state = self.state.lock().await;

        if state.permission == Permission::NotRequested {
            let decision = self.surface.request_permission().await;
            state.permission = decision;
            match decision {
                Permission::Granted => {
                    tracing::info!("System notification permission granted");
                    // Confirmation through the fresh surface, like the first
                    // run of the dashboard. Not a delivery of the alert
                    // itself, so a failure here only gets logged.
                    if let Err(e) = self.surface.show(GRANT_TITLE, GRANT_BODY, Severity::Warning) {
                        tracing::warn!(error = %e, "Grant confirmation failed");
                    }
                }
                Permission::Denied => {
                    tracing::info!("System notification permission denied");
                }
                Permission::NotRequested => {
                    tracing::info!("Permission prompt dismissed, will ask again");
                }
            }
        }

        match state.permission {
            Permission::Granted => match self.surface.show(title, body, severity) {
                Ok(()) => DeliveryResult::System,
                Err(e) => {
                    tracing::warn!(error = %e, "System notification failed, falling back to toast");
                    self.toast_or_fail(title, body)
                }
            },
            Permission::Denied => {
                if !state.denied_notice_shown {
                    state.denied_notice_shown = true;
                    if let Err(e) = self.surface.toast(DENIED_TITLE, DENIED_BODY) {
                        tracing::warn!(error = %e, "Denied notice failed");
                    }
                }
                self.toast_or_fail(title, body)
            }
            // Prompt dismissed without an answer: deliver in-app this time.
            Permission::NotRequested => self.toast_or_fail(title, body),
        }
    }

    fn toast_or_fail(&self, title: &str, body: &str) -> DeliveryResult {
        match self.surface.toast(title, body) {
            Ok(()) => DeliveryResult::Toast,
            Err(e) => {
                tracing::error!(error = %e, title, "All notification channels failed");
                DeliveryResult::Failed
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
