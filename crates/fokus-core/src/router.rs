//! Client-side router.
//!
//! A table of exact-match paths to [`Page`]s with a `*` fallback. Every
//! dispatch reads the current location from the [`History`], lets the
//! [`AuthCallbackInterpreter`] classify it, and renders the page for the
//! resulting route.
//!
//! The router is an explicit value built once by the composition root and
//! handed to pages by reference; there is no ambient router.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::callback::{AuthCallbackInterpreter, Intent};
use crate::error::RouterError;
use crate::history::History;
use crate::location::Location;
use crate::page::{Activation, Page};
use crate::viewport::{MountToken, Viewport};

/// Route key of the catch-all page.
pub const WILDCARD: &str = "*";

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A page was rendered.
    Handled {
        /// The path recorded as the current route.
        route: String,
        /// Name of the page that rendered.
        page: &'static str,
        intent: Intent,
    },
    /// Nothing is registered for the path and there is no fallback. The
    /// viewport is left blank.
    Unmatched { path: String },
}

impl Dispatch {
    /// Name of the rendered page, if any.
    #[must_use]
    pub fn page(&self) -> Option<&'static str> {
        match self {
            Self::Handled { page, .. } => Some(*page),
            Self::Unmatched { .. } => None,
        }
    }
}

/// The route table and its dispatch loop.
pub struct Router {
    routes: HashMap<String, Arc<dyn Page>>,
    history: Arc<dyn History>,
    interpreter: AuthCallbackInterpreter,
    viewport: Arc<Viewport>,
    current: RwLock<Option<String>>,
    initialized: AtomicBool,
    /// Set by [`Router::shared`]; empty for a router that is not behind an `Arc`.
    this: Weak<Router>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<_> = self.routes.keys().collect();
        paths.sort();
        f.debug_struct("Router")
            .field("routes", &paths)
            .field("interpreter", &self.interpreter)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// An empty router reading locations from `history`.
    #[must_use]
    pub fn new(history: Arc<dyn History>) -> Self {
        Self {
            routes: HashMap::new(),
            history,
            interpreter: AuthCallbackInterpreter::default(),
            viewport: Arc::new(Viewport::new()),
            current: RwLock::new(None),
            initialized: AtomicBool::new(false),
            this: Weak::new(),
        }
    }

    /// Finish building and put the router behind an `Arc`.
    ///
    /// Only a shared router can schedule [`redirect_after`](Self::redirect_after).
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            ..self
        })
    }

    /// A handle that does not keep the router alive. Empty unless the router
    /// was built with [`shared`](Self::shared).
    #[must_use]
    pub fn downgrade(&self) -> Weak<Self> {
        self.this.clone()
    }

    /// Use `interpreter` (and its callback paths) instead of the default.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: AuthCallbackInterpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Render into `viewport` instead of a private one.
    #[must_use]
    pub fn with_viewport(mut self, viewport: Arc<Viewport>) -> Self {
        self.viewport = viewport;
        self
    }

    /// Register `page` under the exact path `path`. Registering a path
    /// twice keeps the later page.
    #[must_use]
    pub fn route(mut self, path: impl Into<String>, page: Arc<dyn Page>) -> Self {
        let path = path.into();
        if let Some(previous) = self.routes.insert(path.clone(), page) {
            debug!(path = %path, replaced = previous.name(), "route re-registered");
        }
        self
    }

    #[must_use]
    pub fn viewport(&self) -> &Arc<Viewport> {
        &self.viewport
    }

    #[must_use]
    pub fn history(&self) -> &Arc<dyn History> {
        &self.history
    }

    #[must_use]
    pub fn interpreter(&self) -> &AuthCallbackInterpreter {
        &self.interpreter
    }

    /// Whether a page is registered under exactly `path`.
    #[must_use]
    pub fn has_route(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    /// Dispatch the current location once. Call after all routes are
    /// registered.
    ///
    /// # Errors
    ///
    /// [`RouterError::AlreadyInitialized`] on a second call; nothing is
    /// dispatched in that case.
    pub async fn init(&self) -> Result<Dispatch, RouterError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(RouterError::AlreadyInitialized);
        }
        if !self.has_route(WILDCARD) {
            warn!("no '*' route registered; unknown paths will render nothing");
        }
        info!(routes = self.routes.len(), location = %self.history.location(), "router started");
        Ok(self.handle_route().await)
    }

    /// Go to `path` and dispatch.
    ///
    /// A path pushes a history entry. A fragment-only target (`#…`) replaces
    /// the current entry's fragment instead, so auth redirects do not leave
    /// extra entries behind.
    pub async fn navigate(&self, path: &str) -> Dispatch {
        if path.starts_with('#') {
            self.history.set_fragment(path);
        } else {
            self.history.push(Location::parse(path));
        }
        self.handle_route().await
    }

    /// Re-dispatch after the location changed underneath the router
    /// (back/forward, fragment edits).
    pub async fn on_location_change(&self) -> Dispatch {
        self.handle_route().await
    }

    /// Step back in history and re-dispatch. `None` at the start of history.
    pub async fn back(&self) -> Option<Dispatch> {
        if self.history.back() {
            Some(self.on_location_change().await)
        } else {
            None
        }
    }

    /// Step forward in history and re-dispatch. `None` at the end of history.
    pub async fn forward(&self) -> Option<Dispatch> {
        if self.history.forward() {
            Some(self.on_location_change().await)
        } else {
            None
        }
    }

    /// The last dispatched route, or the live pathname before any dispatch.
    pub async fn current_route(&self) -> String {
        match self.current.read().await.as_ref() {
            Some(route) => route.clone(),
            None => self.history.location().pathname,
        }
    }

    /// Whether `path` is the current route.
    pub async fn is_route(&self, path: &str) -> bool {
        self.current_route().await == path
    }

    /// Navigate to `path` after `delay`, unless the view behind `token` has
    /// been replaced by then.
    ///
    /// Returns `None` when the router is not shared, in which case nothing
    /// is scheduled.
    pub fn redirect_after(
        &self,
        token: &MountToken,
        delay: Duration,
        path: &str,
    ) -> Option<JoinHandle<()>> {
        if self.this.strong_count() == 0 {
            debug!(page = token.page(), path, "router not shared; redirect skipped");
            return None;
        }

        let router = self.this.clone();
        let token = token.clone();
        let path = path.to_owned();
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(router) = router.upgrade() else {
                return;
            };
            if router.viewport.is_mounted(&token).await {
                debug!(page = token.page(), path = %path, "redirecting");
                router.navigate(&path).await;
            } else {
                debug!(page = token.page(), path = %path, "page replaced; redirect dropped");
            }
        }))
    }

    /// Dispatch the current location.
    pub async fn handle_route(&self) -> Dispatch {
        let location = self.history.location();
        let resolution = self.interpreter.resolve(&location);

        let page = self
            .routes
            .get(&resolution.route)
            .or_else(|| self.routes.get(WILDCARD))
            .map(Arc::clone);

        let Some(page) = page else {
            debug!(path = %resolution.route, "no route and no fallback");
            self.viewport.clear().await;
            return Dispatch::Unmatched {
                path: resolution.route,
            };
        };

        *self.current.write().await = Some(resolution.route.clone());

        debug!(
            route = %resolution.route,
            page = page.name(),
            intent = resolution.intent.label(),
            "dispatching"
        );

        let activation = Activation {
            route: resolution.route,
            location,
            intent: resolution.intent,
        };

        if let Err(e) = page.render(&activation, self).await {
            warn!(page = page.name(), route = %activation.route, error = %e, "page render failed");
        }

        Dispatch::Handled {
            route: activation.route,
            page: page.name(),
            intent: activation.intent,
        }
    }
}
