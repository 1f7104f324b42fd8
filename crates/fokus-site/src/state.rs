//! Composition root.
//!
//! A single [`AppState`] is built at startup. It owns the router (with every
//! page registered), the cache, the auth collaborator, and the error
//! reporter, and starts the background tasks: the auth session listener
//! and the error reporter.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use fokus_core::auth::{AuthClient, SubscriptionSource};
use fokus_core::cache::KvCache;
use fokus_core::callback::AuthCallbackInterpreter;
use fokus_core::error::RouterError;
use fokus_core::error_log::{ErrorReporter, ReportContext};
use fokus_core::history::History;
use fokus_core::listener::SessionListener;
use fokus_core::location::Location;
use fokus_core::router::{Dispatch, Router, WILDCARD};
use fokus_core::viewport::Viewport;
use fokus_storage::StorageBackend;

use crate::config::SiteConfig;
use crate::pages::{ConfirmEmailPage, LandingPage, NotFoundPage, ResetPasswordPage};

/// Shared application state.
pub struct AppState {
    pub router: Arc<Router>,
    pub auth: Arc<dyn AuthClient>,
    pub cache: KvCache,
    pub reporter: ErrorReporter,
    /// Kept separately from the router so the shell can submit its form.
    pub reset_page: Arc<ResetPasswordPage>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

/// Handles of the background tasks started by [`AppState::build`].
#[derive(Debug)]
pub struct Background {
    pub listener: JoinHandle<()>,
    pub reporter: JoinHandle<()>,
}

impl Background {
    /// Stop the background tasks. A listener that already died is reported,
    /// and every queued error record is stored before this returns.
    pub async fn shutdown(self, reporter: &ErrorReporter) {
        if self.listener.is_finished() {
            if let Err(e) = self.listener.await {
                reporter.report(format!("auth session listener crashed: {e}"), String::new());
            }
        } else {
            self.listener.abort();
        }

        reporter.close();
        if let Err(e) = self.reporter.await {
            warn!(error = %e, "error reporter task failed");
        }
        info!("background tasks stopped");
    }
}

/// Collaborators the state is built from.
pub struct Collaborators {
    pub storage: Arc<dyn StorageBackend>,
    pub auth: Arc<dyn AuthClient>,
    pub subscriptions: Option<Arc<dyn SubscriptionSource>>,
    pub history: Arc<dyn History>,
}

impl AppState {
    /// Wire pages, router, listener, and reporter together.
    ///
    /// Nothing is dispatched yet; call [`AppState::start`].
    pub fn build(config: &SiteConfig, parts: Collaborators) -> (Arc<Self>, Background) {
        let Collaborators {
            storage,
            auth,
            subscriptions,
            history,
        } = parts;

        let cache = KvCache::new(storage);
        let viewport = Arc::new(Viewport::new());
        let paths = config.callback_paths.clone();

        let reset_page = Arc::new(ResetPasswordPage::new(
            Arc::clone(&auth),
            Arc::clone(&viewport),
        ));

        let router = Router::new(Arc::clone(&history))
            .with_interpreter(AuthCallbackInterpreter::new(paths.clone()))
            .with_viewport(viewport)
            .route("/", Arc::new(LandingPage))
            .route(paths.reset_password.clone(), reset_page.clone())
            .route(
                paths.confirm_email.clone(),
                Arc::new(ConfirmEmailPage::new(Arc::clone(&auth), cache.clone())),
            )
            .route(WILDCARD, Arc::new(NotFoundPage))
            .shared();

        let mut listener = SessionListener::new(cache.clone(), Arc::clone(&router))
            .with_protected_routes(config.protected_routes.iter().cloned());
        if config.refresh_subscription {
            if let Some(source) = subscriptions {
                listener = listener.with_subscription_source(source);
            }
        }
        let listener = listener.spawn(auth.subscribe());

        let (reporter, reporter_task) = ErrorReporter::spawn(
            cache.clone(),
            history,
            ReportContext {
                environment: config.environment,
                origin: config.site_origin.clone(),
                user_agent: config.user_agent.clone(),
            },
        );

        let state = Arc::new(Self {
            router,
            auth,
            cache,
            reporter,
            reset_page,
        });
        let background = Background {
            listener,
            reporter: reporter_task,
        };
        (state, background)
    }

    /// Adopt any session in the start URL, then dispatch it.
    ///
    /// # Errors
    ///
    /// [`RouterError::AlreadyInitialized`] if called twice.
    pub async fn start(&self) -> Result<Dispatch, RouterError> {
        self.detect_session(&self.router.history().location()).await;
        self.router.init().await
    }

    /// Treat `url` as an external navigation (a link followed from an email,
    /// a typed address) and dispatch it.
    pub async fn open(&self, url: &str) -> Dispatch {
        let location = Location::parse(url);
        self.detect_session(&location).await;
        self.router.history().push(location);
        self.router.on_location_change().await
    }

    async fn detect_session(&self, location: &Location) {
        if let Err(e) = self.auth.detect_session_in_url(&location.params()).await {
            // The callback page reports the failure to the user.
            warn!(error = %e, "session in URL rejected");
        }
    }
}
