//! Password-reset page.
//!
//! Reached from a recovery email. The auth backend has already exchanged the
//! link's token for a session by the time this renders, so the page only
//! checks that a session exists and then accepts a new password. After a
//! successful update it sends the user home.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use fokus_core::auth::AuthClient;
use fokus_core::callback::Intent;
use fokus_core::error::PageError;
use fokus_core::page::{Activation, Page};
use fokus_core::router::Router;
use fokus_core::viewport::{MountToken, Notice, View, Viewport};

const PAGE: &str = "reset-password";

/// Shortest password the form accepts, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// How long the success notice stays up before going home.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(3);

/// The view this page currently owns and the router that showed it.
struct Mounted {
    token: MountToken,
    router: Weak<Router>,
}

/// The password-reset form.
pub struct ResetPasswordPage {
    auth: Arc<dyn AuthClient>,
    viewport: Arc<Viewport>,
    mounted: Mutex<Option<Mounted>>,
}

impl std::fmt::Debug for ResetPasswordPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetPasswordPage").finish_non_exhaustive()
    }
}

impl ResetPasswordPage {
    /// `viewport` must be the one the router renders into.
    #[must_use]
    pub fn new(auth: Arc<dyn AuthClient>, viewport: Arc<Viewport>) -> Self {
        Self {
            auth,
            viewport,
            mounted: Mutex::new(None),
        }
    }

    /// Handle the form: set `password` if it matches `confirmation` and is
    /// at least [`MIN_PASSWORD_LEN`] characters long.
    ///
    /// The form's controls are disabled while the backend call runs and
    /// re-enabled if it fails so the user can retry. On success the page
    /// goes home after [`REDIRECT_DELAY`] unless the user has moved on.
    ///
    /// # Errors
    ///
    /// - [`PageError::NotMounted`] if the page is not showing.
    /// - [`PageError::Validation`] for empty, mismatched, or short passwords.
    /// - [`PageError::Auth`] if the backend rejects the update.
    pub async fn submit(&self, password: &str, confirmation: &str) -> Result<(), PageError> {
        let (token, router) = self.current_token().await?;

        if let Some(reason) = validate(password, confirmation) {
            self.viewport
                .update(&token, |v| v.notice = Some(Notice::error(reason.clone())))
                .await;
            return Err(PageError::Validation { reason });
        }

        self.viewport
            .update(&token, |v| {
                v.controls_enabled = false;
                v.notice = Some(Notice::info("Updating your password…"));
            })
            .await;

        match self.auth.update_user(password).await {
            Ok(user) => {
                info!(user_id = %user.id, "password updated");
                self.viewport
                    .update(&token, |v| {
                        v.notice = Some(Notice::success(
                            "Password updated. You can sign in from the Fokus extension. Redirecting…",
                        ));
                    })
                    .await;
                if let Some(router) = router.upgrade() {
                    router.redirect_after(&token, REDIRECT_DELAY, "/");
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "password update failed");
                let text = format!("Could not update your password: {e}");
                self.viewport
                    .update(&token, |v| {
                        v.controls_enabled = true;
                        v.notice = Some(Notice::error(text));
                    })
                    .await;
                Err(e.into())
            }
        }
    }

    async fn current_token(&self) -> Result<(MountToken, Weak<Router>), PageError> {
        let guard = self.mounted.lock().await;
        match guard.as_ref() {
            Some(mounted) if self.viewport.is_mounted(&mounted.token).await => {
                Ok((mounted.token.clone(), mounted.router.clone()))
            }
            _ => Err(PageError::NotMounted {
                page: PAGE.to_owned(),
            }),
        }
    }
}

/// The first problem with the form's input, if any.
fn validate(password: &str, confirmation: &str) -> Option<String> {
    if password.is_empty() {
        Some("Please enter a new password.".to_owned())
    } else if password != confirmation {
        Some("Passwords do not match.".to_owned())
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        Some(format!("Password must be at least {MIN_PASSWORD_LEN} characters."))
    } else {
        None
    }
}

#[async_trait]
impl Page for ResetPasswordPage {
    fn name(&self) -> &'static str {
        PAGE
    }

    async fn render(&self, activation: &Activation, router: &Router) -> Result<(), PageError> {
        let view = View::new(PAGE, "Reset your password")
            .with_body(["Choose a new password for your Fokus account."])
            .with_notice(Notice::info("Checking your reset link…"));
        let token = self.viewport.mount(view).await;
        *self.mounted.lock().await = Some(Mounted {
            token: token.clone(),
            router: router.downgrade(),
        });

        if let Intent::Error { message } = &activation.intent {
            let text = format!("Verification failed: {message}");
            self.viewport
                .update(&token, |v| v.notice = Some(Notice::error(text)))
                .await;
            return Ok(());
        }

        match self.auth.get_session().await {
            Ok(Some(_)) => {
                self.viewport
                    .update(&token, |v| {
                        v.controls_enabled = true;
                        v.notice = None;
                    })
                    .await;
                Ok(())
            }
            Ok(None) => {
                self.viewport
                    .update(&token, |v| {
                        v.notice = Some(Notice::error(
                            "This reset link is invalid or has expired. Request a new one from the extension.",
                        ));
                    })
                    .await;
                Ok(())
            }
            Err(e) => {
                let text = format!("Could not verify your reset link: {e}");
                self.viewport
                    .update(&token, |v| v.notice = Some(Notice::error(text)))
                    .await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fokus_core::auth::MemoryAuth;
    use fokus_core::error::AuthError;
    use fokus_core::history::{History, MemoryHistory};
    use fokus_core::viewport::NoticeKind;

    use super::*;
    use crate::pages::LandingPage;

    struct Fixture {
        auth: Arc<MemoryAuth>,
        page: Arc<ResetPasswordPage>,
        router: Arc<Router>,
    }

    fn fixture(url: &str) -> Fixture {
        let auth = Arc::new(MemoryAuth::new());
        let viewport = Arc::new(Viewport::new());
        let page = Arc::new(ResetPasswordPage::new(auth.clone(), viewport.clone()));
        let router = Router::new(Arc::new(MemoryHistory::at(url)))
            .with_viewport(viewport)
            .route("/", Arc::new(LandingPage))
            .route("/reset-password", page.clone())
            .shared();
        Fixture { auth, page, router }
    }

    async fn signed_in(fx: &Fixture) {
        let token = fx.auth.issue_token("ada@example.com", true).await;
        fx.auth.sign_in(&token).await.unwrap();
    }

    async fn view(fx: &Fixture) -> View {
        fx.router.viewport().snapshot().await.unwrap()
    }

    #[tokio::test]
    async fn session_enables_the_form() {
        let fx = fixture("/reset-password");
        signed_in(&fx).await;
        fx.router.init().await.unwrap();

        let view = view(&fx).await;
        assert!(view.controls_enabled);
        assert_eq!(view.notice, None);
    }

    #[tokio::test]
    async fn missing_session_reports_expired_link() {
        let fx = fixture("/reset-password");
        fx.router.init().await.unwrap();

        let view = view(&fx).await;
        assert!(!view.controls_enabled);
        assert_eq!(view.notice.unwrap().kind, NoticeKind::Error);
    }

    #[tokio::test]
    async fn error_fragment_is_shown_inline() {
        let fx = fixture("/reset-password#error=access_denied&error_description=Link+expired");
        fx.router.init().await.unwrap();

        let notice = view(&fx).await.notice.unwrap();
        assert_eq!(notice.text, "Verification failed: Link expired");
    }

    #[tokio::test]
    async fn mismatched_passwords_are_rejected_before_calling_out() {
        let fx = fixture("/reset-password");
        signed_in(&fx).await;
        fx.router.init().await.unwrap();

        let err = fx.page.submit("hunter22", "hunter23").await.unwrap_err();
        assert!(matches!(err, PageError::Validation { .. }));
        let view = view(&fx).await;
        assert!(view.controls_enabled);
        assert_eq!(view.notice.unwrap().text, "Passwords do not match.");
    }

    #[tokio::test]
    async fn successful_update_shows_success() {
        let fx = fixture("/reset-password");
        signed_in(&fx).await;
        fx.router.init().await.unwrap();

        fx.page.submit("hunter22", "hunter22").await.unwrap();
        let view = view(&fx).await;
        assert!(!view.controls_enabled);
        assert_eq!(view.notice.unwrap().kind, NoticeKind::Success);
    }

    #[tokio::test]
    async fn failed_update_reenables_the_form() {
        let fx = fixture("/reset-password");
        signed_in(&fx).await;
        fx.router.init().await.unwrap();
        fx.auth
            .fail_next_update(AuthError::Api {
                status: 422,
                message: "password is too weak".to_owned(),
            })
            .await;

        let err = fx
            .page
            .submit("correct horse", "correct horse")
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::Auth(_)));
        let view = view(&fx).await;
        assert!(view.controls_enabled);
        let notice = view.notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.text.contains("password is too weak"));

        fx.page
            .submit("correct horse", "correct horse")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_calling_out() {
        let fx = fixture("/reset-password");
        signed_in(&fx).await;
        fx.router.init().await.unwrap();
        fx.auth
            .fail_next_update(AuthError::Api {
                status: 500,
                message: "should not be reached".to_owned(),
            })
            .await;

        let err = fx.page.submit("short", "short").await.unwrap_err();
        assert!(matches!(err, PageError::Validation { .. }));
        let view = view(&fx).await;
        assert!(view.controls_enabled);
        assert_eq!(
            view.notice.unwrap().text,
            "Password must be at least 8 characters."
        );

        // The queued failure is still pending, so the backend was never called.
        assert!(fx.page.submit("12345678", "12345678").await.is_err());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(validate("pässwörd", "pässwörd").is_none());
        assert!(validate("äöüäöüä", "äöüäöüä").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_update_goes_home_after_delay() {
        let fx = fixture("/reset-password");
        signed_in(&fx).await;
        fx.router.init().await.unwrap();

        fx.page.submit("hunter22", "hunter22").await.unwrap();
        tokio::time::sleep(REDIRECT_DELAY - Duration::from_millis(100)).await;
        assert!(fx.router.is_route("/reset-password").await);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(fx.router.is_route("/").await);
        assert_eq!(view(&fx).await.page, "landing");
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_before_the_delay_cancels_the_redirect() {
        let fx = fixture("/reset-password");
        signed_in(&fx).await;
        fx.router.init().await.unwrap();

        fx.page.submit("hunter22", "hunter22").await.unwrap();
        fx.router.navigate("/").await;
        let entries = fx.router.history().len();
        tokio::time::sleep(REDIRECT_DELAY * 2).await;

        assert_eq!(fx.router.history().len(), entries);
    }

    #[tokio::test]
    async fn submit_when_not_showing_is_refused() {
        let fx = fixture("/reset-password");
        assert!(matches!(
            fx.page.submit("a", "a").await,
            Err(PageError::NotMounted { .. })
        ));

        signed_in(&fx).await;
        fx.router.init().await.unwrap();
        fx.router.viewport().clear().await;
        assert!(matches!(
            fx.page.submit("a", "a").await,
            Err(PageError::NotMounted { .. })
        ));
    }
}
