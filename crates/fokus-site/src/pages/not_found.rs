//! Catch-all page registered under `*`.

use async_trait::async_trait;
use fokus_core::error::PageError;
use fokus_core::page::{Activation, Page};
use fokus_core::router::Router;
use fokus_core::viewport::View;

#[derive(Debug, Default)]
pub struct NotFoundPage;

#[async_trait]
impl Page for NotFoundPage {
    fn name(&self) -> &'static str {
        "not-found"
    }

    async fn render(&self, activation: &Activation, router: &Router) -> Result<(), PageError> {
        let view = View::new(self.name(), "Page not found").with_body([
            format!("Nothing lives at {}.", activation.location.pathname),
            "Head back to the home page.".to_owned(),
        ]);
        router.viewport().mount(view).await;
        Ok(())
    }
}
