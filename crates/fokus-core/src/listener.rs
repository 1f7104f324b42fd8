//! Auth session listener.
//!
//! One task consumes the auth collaborator's state changes in arrival order
//! and turns them into cache writes and navigations:
//!
//! | event               | effect                                                      |
//! |---------------------|-------------------------------------------------------------|
//! | `SIGNED_IN`         | cache the session record, refresh subscription status        |
//! | `SIGNED_OUT`        | drop cached records, leave protected routes for `/`          |
//! | `PASSWORD_RECOVERY` | go to the password-reset page                                |
//! | `USER_UPDATED`      | overwrite the cached session record                          |
//!
//! Anything else is ignored.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{AuthEvent, AuthStateChange, SubscriptionSource};
use crate::cache::KvCache;
use crate::router::{Dispatch, Router};
use crate::session::{SUBSCRIPTION_KEY, SessionRecord};

/// What handling one state change did.
#[derive(Debug, Default)]
pub struct Reaction {
    /// The navigation it triggered, if any.
    pub navigation: Option<Dispatch>,
    /// The detached subscription refresh it started, if any.
    pub refresh: Option<JoinHandle<()>>,
}

/// Consumes auth state changes.
pub struct SessionListener {
    cache: KvCache,
    router: Arc<Router>,
    protected: HashSet<String>,
    subscriptions: Option<Arc<dyn SubscriptionSource>>,
}

impl std::fmt::Debug for SessionListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionListener")
            .field("protected", &self.protected)
            .field("refreshes_subscription", &self.subscriptions.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionListener {
    #[must_use]
    pub fn new(cache: KvCache, router: Arc<Router>) -> Self {
        Self {
            cache,
            router,
            protected: HashSet::new(),
            subscriptions: None,
        }
    }

    /// Routes a signed-out user must not stay on.
    #[must_use]
    pub fn with_protected_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected = routes.into_iter().map(Into::into).collect();
        self
    }

    /// Refresh subscription status from `source` after every sign-in.
    #[must_use]
    pub fn with_subscription_source(mut self, source: Arc<dyn SubscriptionSource>) -> Self {
        self.subscriptions = Some(source);
        self
    }

    /// Run the listener on its own task.
    pub fn spawn(self, rx: broadcast::Receiver<AuthStateChange>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Handle changes until the sending side goes away.
    pub async fn run(self, mut rx: broadcast::Receiver<AuthStateChange>) {
        info!("auth session listener started");
        loop {
            match rx.recv().await {
                Ok(change) => {
                    self.handle(change).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth session listener fell behind, events dropped");
                }
                Err(RecvError::Closed) => {
                    info!("auth event stream closed, listener stopping");
                    return;
                }
            }
        }
    }

    /// Apply one state change.
    pub async fn handle(&self, change: AuthStateChange) -> Reaction {
        let AuthStateChange { event, session } = change;
        debug!(event = event.name(), has_session = session.is_some(), "auth state change");

        match event {
            AuthEvent::SignedIn => {
                let Some(session) = session else {
                    warn!("SIGNED_IN without a session");
                    return Reaction::default();
                };
                SessionRecord::store(&self.cache, &session.user).await;
                Reaction {
                    navigation: None,
                    refresh: self.refresh_subscription(session.user.id),
                }
            }
            AuthEvent::SignedOut => {
                SessionRecord::clear(&self.cache).await;
                let current = self.router.current_route().await;
                let navigation = if self.protected.contains(&current) {
                    info!(route = %current, "signed out on a protected route, leaving");
                    Some(self.router.navigate("/").await)
                } else {
                    None
                };
                Reaction {
                    navigation,
                    refresh: None,
                }
            }
            AuthEvent::PasswordRecovery => {
                let reset = self.router.interpreter().paths().reset_password.clone();
                // The recovery redirect itself may already resolve to the reset
                // page before the router has dispatched it.
                let live = self.router.interpreter().resolve(&self.router.history().location());
                let navigation = if live.route == reset || self.router.is_route(&reset).await {
                    None
                } else {
                    Some(self.router.navigate(&reset).await)
                };
                Reaction {
                    navigation,
                    refresh: None,
                }
            }
            AuthEvent::UserUpdated => {
                match session {
                    Some(session) => {
                        SessionRecord::store(&self.cache, &session.user).await;
                    }
                    None => warn!("USER_UPDATED without a session"),
                }
                Reaction::default()
            }
            other => {
                debug!(event = other.name(), "auth event ignored");
                Reaction::default()
            }
        }
    }

    /// Fire-and-forget fetch of the user's subscription status.
    fn refresh_subscription(&self, user_id: String) -> Option<JoinHandle<()>> {
        let source = Arc::clone(self.subscriptions.as_ref()?);
        let cache = self.cache.clone();
        Some(tokio::spawn(async move {
            match source.fetch_status(&user_id).await {
                Ok(record) => {
                    cache.set(SUBSCRIPTION_KEY, &record).await;
                    debug!(user_id = %user_id, status = %record.status, "subscription status refreshed");
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "subscription status refresh failed");
                }
            }
        }))
    }
}
