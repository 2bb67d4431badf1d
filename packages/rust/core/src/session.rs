//! Session/identity provider.
//!
//! Content is owned by whoever is signed in. The local provider keeps the
//! state in a `watch` channel so callers can react to sign-in changes.

use tokio::sync::watch;
use tracing::info;

use studygen_shared::{ProfileConfig, Result, StudyGenError, UserId};

/// Authentication state broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn(UserId),
}

impl AuthState {
    pub fn user(&self) -> Option<&UserId> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::SignedOut => None,
        }
    }
}

/// Source of the current user identity.
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
    fn sign_in(&self, user: UserId) -> Result<()>;
    fn sign_out(&self);
    /// Receive every subsequent auth state change.
    fn subscribe(&self) -> watch::Receiver<AuthState>;
}

/// In-process session for a single local user.
pub struct LocalSession {
    state: watch::Sender<AuthState>,
}

impl LocalSession {
    /// A session with nobody signed in.
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::SignedOut);
        Self { state }
    }

    /// A session signed in as the profile's user, if one is configured.
    pub fn from_profile(profile: &ProfileConfig) -> Self {
        let session = Self::new();
        let user = profile.user.trim();
        if !user.is_empty() {
            session
                .state
                .send_replace(AuthState::SignedIn(UserId(user.to_string())));
        }
        session
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProvider for LocalSession {
    fn current_user(&self) -> Option<UserId> {
        self.state.borrow().user().cloned()
    }

    fn sign_in(&self, user: UserId) -> Result<()> {
        let id = user.0.trim();
        if id.is_empty() {
            return Err(StudyGenError::validation("user id must not be empty"));
        }
        info!(user = id, "signed in");
        self.state
            .send_replace(AuthState::SignedIn(UserId(id.to_string())));
        Ok(())
    }

    fn sign_out(&self) {
        if self.state.send_replace(AuthState::SignedOut) != AuthState::SignedOut {
            info!("signed out");
        }
    }

    fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_user_is_signed_in() {
        let session = LocalSession::from_profile(&ProfileConfig {
            user: "ada".into(),
        });
        assert_eq!(session.current_user(), Some(UserId("ada".into())));
    }

    #[test]
    fn blank_profile_user_stays_signed_out() {
        let session = LocalSession::from_profile(&ProfileConfig { user: "  ".into() });
        assert_eq!(session.current_user(), None);
    }

    #[test]
    fn blank_sign_in_rejected() {
        let session = LocalSession::new();
        assert!(session.sign_in(UserId(String::new())).is_err());
        assert_eq!(session.current_user(), None);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let session = LocalSession::new();
        let mut rx = session.subscribe();
        assert_eq!(*rx.borrow(), AuthState::SignedOut);

        session.sign_in(UserId("grace".into())).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::SignedIn(UserId("grace".into())));

        session.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::SignedOut);
        assert_eq!(session.current_user(), None);
    }
}
