//! Session gating seam.
//!
//! Authentication is owned entirely by the external identity provider.
//! The monitor only needs two things from it: whether somebody is signed
//! in right now, and a way to notice sign-out so it can shut down its
//! subscriptions.

use serde::Serialize;
use tokio::sync::watch;

/// Minimal view of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSession {
    /// Opaque identifier assigned by the identity provider.
    pub user_id: String,
    pub email: String,
    /// Phone number from the user's profile metadata, when present.
    pub phone_number: Option<String>,
}

impl UserSession {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            phone_number: None,
        }
    }

    /// Attach a phone number from profile metadata.
    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }
}

/// Read access to the current authentication state.
pub trait SessionProvider: Send + Sync {
    /// The currently signed-in user, if any.
    fn current_user(&self) -> Option<UserSession>;

    /// Watch channel that yields the session on every sign-in or sign-out.
    fn watch(&self) -> watch::Receiver<Option<UserSession>>;
}

/// Process-local session holder backed by a watch channel.
///
/// The demo daemon signs in once at startup; tests flip it to exercise
/// the coordinator's sign-out handling.
pub struct StaticSession {
    tx: watch::Sender<Option<UserSession>>,
}

impl StaticSession {
    pub fn signed_in(user: UserSession) -> Self {
        let (tx, _) = watch::channel(Some(user));
        Self { tx }
    }

    pub fn signed_out() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn sign_in(&self, user: UserSession) {
        self.tx.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<UserSession> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<UserSession>> {
        self.tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_user_reflects_sign_in_and_out() {
        let session = StaticSession::signed_out();
        assert!(session.current_user().is_none());

        session.sign_in(UserSession::new("user-1", "ops@example.com"));
        assert_eq!(
            session.current_user().map(|u| u.email),
            Some("ops@example.com".to_string())
        );

        session.sign_out();
        assert!(session.current_user().is_none());
    }

    #[tokio::test]
    async fn watch_observes_sign_out() {
        let session = StaticSession::signed_in(UserSession::new("user-1", "ops@example.com"));
        let mut rx = session.watch();
        assert!(rx.borrow().is_some());

        session.sign_out();
        rx.changed().await.expect("change notification");
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn phone_number_metadata_is_optional() {
        let plain = UserSession::new("u", "a@b.c");
        assert!(plain.phone_number.is_none());

        let with_phone = UserSession::new("u", "a@b.c").with_phone_number("+15550100");
        assert_eq!(with_phone.phone_number.as_deref(), Some("+15550100"));
    }
}
