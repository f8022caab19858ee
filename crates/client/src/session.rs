//! Session context.
//!
//! Holds the bearer token and user profile issued by the auth service. The
//! gateway reads the token on every authenticated call; an absent token means
//! "not signed in" and the call fails before anything goes on the wire.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use pocket_shop_core::{Email, UserId};

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend user id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: Email,
}

/// Current authentication state.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone, Default)]
pub struct Session {
    token: Option<SecretString>,
    user: Option<UserProfile>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user)
            .finish()
    }
}

impl Session {
    /// Whether a token is present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The bearer token, if signed in.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// The signed-in user, if known.
    #[must_use]
    pub const fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }
}

/// Shared handle to the session.
///
/// Cheap to clone; all clones observe the same sign-in state.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Session>>,
}

impl SessionContext {
    /// A signed-out session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A session restored from a stored token, without a profile.
    #[must_use]
    pub fn with_token(token: SecretString) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Session {
                token: Some(token),
                user: None,
            })),
        }
    }

    /// Record a successful sign-in.
    pub fn sign_in(&self, token: SecretString, user: Option<UserProfile>) {
        let mut session = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        session.token = Some(token);
        session.user = user;
        tracing::info!(user_id = ?session.user.as_ref().map(|u| u.id), "Signed in");
    }

    /// Forget the token and profile.
    pub fn sign_out(&self) {
        let mut session = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *session = Session::default();
        tracing::info!("Signed out");
    }

    /// A copy of the current session.
    #[must_use]
    pub fn current(&self) -> Session {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current bearer token, if signed in.
    #[must_use]
    pub fn bearer_token(&self) -> Option<SecretString> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    /// Whether a token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_authenticated()
    }
}
