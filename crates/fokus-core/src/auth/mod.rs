//! The auth collaborator seen from the site.
//!
//! The backend itself is external and opaque: it exchanges credentials and
//! tokens for a session or an error, and announces state changes
//! (`SIGNED_IN`, `SIGNED_OUT`, …) to subscribers. [`AuthClient`] is that
//! contract; `fokus-site` provides an HTTP implementation and
//! [`MemoryAuth`] an in-process one.
//!
//! State changes are delivered over a broadcast channel so a single consumer
//! task can process them strictly in arrival order.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::AuthError;
use crate::location::FragmentParams;

pub use memory::MemoryAuth;

/// Buffered state changes per subscriber before the oldest are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A user as reported by the auth backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: User,
}

/// Named auth state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    PasswordRecovery,
    UserUpdated,
    TokenRefreshed,
    InitialSession,
    /// An event this site does not know. Consumers ignore it.
    Other(String),
}

impl AuthEvent {
    /// Map a wire name such as `SIGNED_IN`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "SIGNED_IN" => Self::SignedIn,
            "SIGNED_OUT" => Self::SignedOut,
            "PASSWORD_RECOVERY" => Self::PasswordRecovery,
            "USER_UPDATED" => Self::UserUpdated,
            "TOKEN_REFRESHED" => Self::TokenRefreshed,
            "INITIAL_SESSION" => Self::InitialSession,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The wire name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
            Self::UserUpdated => "USER_UPDATED",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::InitialSession => "INITIAL_SESSION",
            Self::Other(name) => name,
        }
    }
}

/// One notification: the event and the session as of that event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

/// Fan-out of [`AuthStateChange`]s to subscribers.
#[derive(Debug, Clone)]
pub struct AuthEventHub {
    tx: broadcast::Sender<AuthStateChange>,
}

impl AuthEventHub {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.tx.subscribe()
    }

    /// Deliver a change to current subscribers. Having none is fine.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let name = event.name().to_owned();
        if self.tx.send(AuthStateChange { event, session }).is_err() {
            debug!(event = %name, "auth event emitted with no subscribers");
        }
    }
}

impl Default for AuthEventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription state of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub status: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Source of subscription status, refreshed after sign-in.
#[async_trait]
pub trait SubscriptionSource: Send + Sync + 'static {
    /// Fetch the current status for `user_id`.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] from the backend.
    async fn fetch_status(&self, user_id: &str) -> Result<SubscriptionRecord, AuthError>;
}

/// The auth backend's contract.
///
/// All operations are asynchronous and may fail with an [`AuthError`]; no
/// timeout is applied here.
#[async_trait]
pub trait AuthClient: Send + Sync + 'static {
    /// The hub this client announces state changes on.
    fn events(&self) -> &AuthEventHub;

    /// Listen for state changes from now on.
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events().subscribe()
    }

    /// Resolve an access token to its user.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidToken`] for rejected tokens, or a transport error.
    async fn get_user(&self, access_token: &str) -> Result<User, AuthError>;

    /// Change the signed-in user's password. Emits `USER_UPDATED`.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingSession`] without a session, or a backend error.
    async fn update_user(&self, password: &str) -> Result<User, AuthError>;

    /// The current session, if any.
    ///
    /// # Errors
    ///
    /// A backend error while restoring the session.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Make `session` the current one.
    async fn set_session(&self, session: Option<Session>);

    /// End the session. Emits `SIGNED_OUT`.
    ///
    /// # Errors
    ///
    /// A backend error while revoking the session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Adopt the session a redirect carries in its fragment.
    ///
    /// Fragments without an `access_token` are ignored. Otherwise the token is
    /// verified, the session stored, and `PASSWORD_RECOVERY` (for
    /// `type=recovery`) or `SIGNED_IN` emitted.
    ///
    /// # Errors
    ///
    /// Whatever [`get_user`](AuthClient::get_user) returns for the token.
    async fn detect_session_in_url(
        &self,
        params: &FragmentParams,
    ) -> Result<Option<Session>, AuthError> {
        let Some(access_token) = params.get("access_token") else {
            return Ok(None);
        };

        let user = self.get_user(access_token).await?;
        let session = Session {
            access_token: access_token.to_owned(),
            refresh_token: params.get("refresh_token").map(str::to_owned),
            expires_in: params.get("expires_in").and_then(|v| v.parse().ok()),
            user,
        };
        self.set_session(Some(session.clone())).await;

        let event = if params.get("type") == Some("recovery") {
            AuthEvent::PasswordRecovery
        } else {
            AuthEvent::SignedIn
        };
        self.events().emit(event, Some(session.clone()));
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip() {
        for name in [
            "SIGNED_IN",
            "SIGNED_OUT",
            "PASSWORD_RECOVERY",
            "USER_UPDATED",
            "TOKEN_REFRESHED",
            "INITIAL_SESSION",
            "MFA_CHALLENGE_VERIFIED",
        ] {
            assert_eq!(AuthEvent::from_name(name).name(), name);
        }
        assert_eq!(
            AuthEvent::from_name("MFA_CHALLENGE_VERIFIED"),
            AuthEvent::Other("MFA_CHALLENGE_VERIFIED".to_owned())
        );
    }

    #[test]
    fn user_decodes_backend_json() {
        let user: User = serde_json::from_str(
            r#"{"id":"u1","email":"ada@example.com","email_confirmed_at":"2024-05-01T10:00:00Z","role":"authenticated"}"#,
        )
        .unwrap();
        assert_eq!(user.id, "u1");
        assert!(user.email_confirmed_at.is_some());
    }

    #[tokio::test]
    async fn hub_delivers_in_order() {
        let hub = AuthEventHub::new();
        let mut rx = hub.subscribe();
        hub.emit(AuthEvent::SignedIn, None);
        hub.emit(AuthEvent::SignedOut, None);

        assert_eq!(rx.recv().await.unwrap().event, AuthEvent::SignedIn);
        assert_eq!(rx.recv().await.unwrap().event, AuthEvent::SignedOut);
    }
}
