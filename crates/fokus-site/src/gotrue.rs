//! HTTP client for a GoTrue-compatible auth backend (e.g. Supabase Auth).
//!
//! Only the handful of endpoints the site needs:
//!
//! - `GET  /auth/v1/user` — resolve an access token to its user
//! - `PUT  /auth/v1/user` — change the signed-in user's password
//! - `POST /auth/v1/logout` — revoke the session
//! - `GET  /rest/v1/subscriptions` — subscription status after sign-in
//!
//! The session itself is held in memory; it arrives through
//! [`AuthClient::detect_session_in_url`] when a redirect lands.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use fokus_core::auth::{
    AuthClient, AuthEvent, AuthEventHub, Session, SubscriptionRecord, SubscriptionSource, User,
};
use fokus_core::error::AuthError;

use crate::config::AuthBackendConfig;

/// Error body shapes GoTrue and PostgREST answer with.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self, fallback: String) -> String {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or(fallback)
    }
}

/// Auth collaborator speaking GoTrue's REST API.
pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    hub: AuthEventHub,
    session: RwLock<Option<Session>>,
}

impl std::fmt::Debug for GoTrueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GoTrueClient {
    #[must_use]
    pub fn new(config: &AuthBackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
            hub: AuthEventHub::new(),
            session: RwLock::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str, bearer: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn bearer(&self) -> Result<String, AuthError> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(AuthError::MissingSession)
    }
}

fn network(e: &reqwest::Error) -> AuthError {
    AuthError::Network {
        reason: e.to_string(),
    }
}

/// Map a non-success response to an [`AuthError`].
async fn failure(resp: reqwest::Response) -> AuthError {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return AuthError::InvalidToken;
    }
    let body: ErrorBody = resp.json().await.unwrap_or_default();
    AuthError::Api {
        status: status.as_u16(),
        message: body.into_message(status.to_string()),
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, AuthError> {
    resp.json().await.map_err(|e| AuthError::Decode {
        reason: e.to_string(),
    })
}

#[async_trait]
impl AuthClient for GoTrueClient {
    fn events(&self) -> &AuthEventHub {
        &self.hub
    }

    async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        let resp = self
            .request(reqwest::Method::GET, "/auth/v1/user", access_token)
            .send()
            .await
            .map_err(|e| network(&e))?;

        if !resp.status().is_success() {
            return Err(failure(resp).await);
        }
        decode(resp).await
    }

    async fn update_user(&self, password: &str) -> Result<User, AuthError> {
        let bearer = self.bearer().await?;
        let resp = self
            .request(reqwest::Method::PUT, "/auth/v1/user", &bearer)
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await
            .map_err(|e| network(&e))?;

        if !resp.status().is_success() {
            return Err(failure(resp).await);
        }
        let user: User = decode(resp).await?;

        let session = {
            let mut guard = self.session.write().await;
            guard.as_mut().map(|s| {
                s.user = user.clone();
                s.clone()
            })
        };
        self.hub.emit(AuthEvent::UserUpdated, session);
        Ok(user)
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.session.read().await.clone())
    }

    async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.session.write().await.take() else {
            debug!("sign-out without a session");
            self.hub.emit(AuthEvent::SignedOut, None);
            return Ok(());
        };

        let result = self
            .request(reqwest::Method::POST, "/auth/v1/logout", &session.access_token)
            .send()
            .await;

        // The local session is gone either way; a token the backend already
        // forgot is not a failure.
        self.hub.emit(AuthEvent::SignedOut, None);
        match result {
            Ok(resp)
                if resp.status().is_success()
                    || resp.status() == reqwest::StatusCode::UNAUTHORIZED =>
            {
                Ok(())
            }
            Ok(resp) => Err(failure(resp).await),
            Err(e) => {
                warn!(error = %e, "logout request failed");
                Err(network(&e))
            }
        }
    }
}

#[async_trait]
impl SubscriptionSource for GoTrueClient {
    async fn fetch_status(&self, user_id: &str) -> Result<SubscriptionRecord, AuthError> {
        let bearer = self.bearer().await.unwrap_or_else(|_| self.anon_key.clone());
        let path = format!(
            "/rest/v1/subscriptions?user_id=eq.{}&select=status,plan,current_period_end&limit=1",
            urlencoding::encode(user_id)
        );
        let resp = self
            .request(reqwest::Method::GET, &path, &bearer)
            .send()
            .await
            .map_err(|e| network(&e))?;

        if !resp.status().is_success() {
            return Err(failure(resp).await);
        }
        let rows: Vec<SubscriptionRecord> = decode(resp).await?;
        rows.into_iter().next().ok_or_else(|| AuthError::Api {
            status: 404,
            message: format!("no subscription for user {user_id}"),
        })
    }
}
