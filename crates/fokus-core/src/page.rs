//! The capability every routable page implements.

use async_trait::async_trait;

use crate::callback::Intent;
use crate::error::PageError;
use crate::location::Location;
use crate::router::Router;

/// Why a page is being shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    /// Route key the page was found under (or the requested path when the
    /// page is the `*` fallback).
    pub route: String,
    /// The location that triggered the dispatch.
    pub location: Location,
    pub intent: Intent,
}

/// A renderable page.
///
/// `render` mounts the page into the router's viewport and runs whatever
/// auth calls it needs. It may navigate through `router`. Errors are logged
/// by the router and otherwise ignored; anything the user should see is the
/// page's own job to put in the viewport.
#[async_trait]
pub trait Page: Send + Sync + 'static {
    /// Stable identifier, also used as the view's page name.
    fn name(&self) -> &'static str;

    /// Show the page.
    ///
    /// # Errors
    ///
    /// Any [`PageError`] the page could not recover from.
    async fn render(&self, activation: &Activation, router: &Router) -> Result<(), PageError>;
}
