use trashtracker_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Coordinator is already running")]
    AlreadyRunning,

    #[error("No active user session")]
    NotAuthenticated,

    #[error("Store does not expose a change feed")]
    FeedUnavailable,

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Store(#[from] CoreError),
}
