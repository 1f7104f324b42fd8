//! In-process auth collaborator.
//!
//! Holds users keyed by access token and a single current session. Used by
//! tests and by the headless shell when no remote auth backend is
//! configured. Failures can be injected per operation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    AuthClient, AuthEvent, AuthEventHub, Session, SubscriptionRecord, SubscriptionSource, User,
};
use crate::error::AuthError;

/// An auth backend that lives in memory.
#[derive(Debug, Default)]
pub struct MemoryAuth {
    hub: AuthEventHub,
    users: RwLock<HashMap<String, User>>,
    session: RwLock<Option<Session>>,
    update_failure: RwLock<Option<AuthError>>,
    subscriptions: RwLock<HashMap<String, SubscriptionRecord>>,
}

impl MemoryAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user and return a fresh access token for it.
    pub async fn issue_token(&self, email: &str, confirmed: bool) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_owned()),
            email_confirmed_at: confirmed.then(Utc::now),
        };
        self.users.write().await.insert(token.clone(), user);
        token
    }

    /// Register `user` under a caller-chosen token.
    pub async fn insert_token(&self, token: &str, user: User) {
        self.users.write().await.insert(token.to_owned(), user);
    }

    /// Sign in with a previously issued token. Emits `SIGNED_IN`.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidToken`] for unknown tokens.
    pub async fn sign_in(&self, access_token: &str) -> Result<Session, AuthError> {
        let user = self.get_user(access_token).await?;
        let session = Session {
            access_token: access_token.to_owned(),
            refresh_token: None,
            expires_in: Some(3600),
            user,
        };
        *self.session.write().await = Some(session.clone());
        self.hub.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Make the next `update_user` call fail with `error`.
    pub async fn fail_next_update(&self, error: AuthError) {
        *self.update_failure.write().await = Some(error);
    }

    /// Set the subscription status reported for `user_id`.
    pub async fn set_subscription(&self, user_id: &str, record: SubscriptionRecord) {
        self.subscriptions
            .write()
            .await
            .insert(user_id.to_owned(), record);
    }

    /// The signed-in user, if any.
    pub async fn current_user(&self) -> Option<User> {
        self.session.read().await.as_ref().map(|s| s.user.clone())
    }
}

#[async_trait]
impl AuthClient for MemoryAuth {
    fn events(&self) -> &AuthEventHub {
        &self.hub
    }

    async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        self.users
            .read()
            .await
            .get(access_token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }

    async fn update_user(&self, password: &str) -> Result<User, AuthError> {
        if let Some(err) = self.update_failure.write().await.take() {
            return Err(err);
        }
        if password.is_empty() {
            return Err(AuthError::Api {
                status: 422,
                message: "password cannot be empty".to_owned(),
            });
        }

        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(AuthError::MissingSession)?;

        self.hub.emit(AuthEvent::UserUpdated, Some(session.clone()));
        Ok(session.user)
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.session.read().await.clone())
    }

    async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.session.write().await = None;
        self.hub.emit(AuthEvent::SignedOut, None);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionSource for MemoryAuth {
    async fn fetch_status(&self, user_id: &str) -> Result<SubscriptionRecord, AuthError> {
        self.subscriptions
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| AuthError::Api {
                status: 404,
                message: format!("no subscription for user {user_id}"),
            })
    }
}
