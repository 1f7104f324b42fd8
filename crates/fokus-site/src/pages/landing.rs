//! Landing page at `/`.

use async_trait::async_trait;
use fokus_core::error::PageError;
use fokus_core::page::{Activation, Page};
use fokus_core::router::Router;
use fokus_core::viewport::View;

/// The marketing landing page.
#[derive(Debug, Default)]
pub struct LandingPage;

#[async_trait]
impl Page for LandingPage {
    fn name(&self) -> &'static str {
        "landing"
    }

    async fn render(&self, activation: &Activation, router: &Router) -> Result<(), PageError> {
        let mut body = vec![
            "Block distracting sites and keep your browser on task.".to_owned(),
            "Install the Fokus extension to get started.".to_owned(),
        ];
        // In-page anchors such as `#pricing` scroll rather than route.
        if activation.location.has_fragment() {
            body.push(format!("Section: {}", activation.location.fragment));
        }

        router
            .viewport()
            .mount(View::new(self.name(), "Fokus").with_body(body))
            .await;
        Ok(())
    }
}
