//! Email-confirmation page.
//!
//! Verifies the access token a confirmation link carries and caches the
//! confirmed session record. Without a token it accepts an existing session
//! instead. The verification call may finish after the user has moved on;
//! its result is then dropped by the viewport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use fokus_core::auth::AuthClient;
use fokus_core::cache::KvCache;
use fokus_core::callback::Intent;
use fokus_core::error::PageError;
use fokus_core::page::{Activation, Page};
use fokus_core::router::Router;
use fokus_core::session::SessionRecord;
use fokus_core::viewport::{Notice, View};

const PAGE: &str = "confirm-email";

/// How long the confirmation stays up before going home.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(5);

const NO_SESSION_MESSAGE: &str = "No valid session found.";

/// The email-confirmation landing spot.
pub struct ConfirmEmailPage {
    auth: Arc<dyn AuthClient>,
    cache: KvCache,
}

impl std::fmt::Debug for ConfirmEmailPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmEmailPage").finish_non_exhaustive()
    }
}

impl ConfirmEmailPage {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthClient>, cache: KvCache) -> Self {
        Self { auth, cache }
    }
}

fn failed(reason: impl std::fmt::Display) -> Notice {
    Notice::error(format!("Verification failed: {reason}"))
}

#[async_trait]
impl Page for ConfirmEmailPage {
    fn name(&self) -> &'static str {
        PAGE
    }

    async fn render(&self, activation: &Activation, router: &Router) -> Result<(), PageError> {
        let viewport = router.viewport();
        let view = View::new(PAGE, "Confirming your email")
            .with_notice(Notice::info("Verifying your email address…"));
        let token = viewport.mount(view).await;

        let verified = match &activation.intent {
            Intent::EmailConfirmation {
                access_token: Some(access_token),
            } => self.auth.get_user(access_token).await.map(Some),
            Intent::Error { message } => {
                let notice = failed(message);
                viewport.update(&token, |v| v.notice = Some(notice)).await;
                return Ok(());
            }
            // No token to check; a session the backend already holds counts.
            _ => self
                .auth
                .get_session()
                .await
                .map(|session| session.map(|s| s.user)),
        };

        match verified {
            Ok(Some(user)) => {
                if !SessionRecord::store(&self.cache, &user).await {
                    warn!(user_id = %user.id, "confirmed user could not be cached");
                }
                info!(user_id = %user.id, "email confirmed");
                let shown = viewport
                    .update(&token, |v| {
                        v.heading = "Email confirmed".to_owned();
                        v.notice = Some(Notice::success(
                            "Your email is confirmed. You can close this tab and return to Fokus.",
                        ));
                    })
                    .await;
                if shown {
                    router.redirect_after(&token, REDIRECT_DELAY, "/");
                }
                Ok(())
            }
            Ok(None) => {
                let notice = failed(NO_SESSION_MESSAGE);
                viewport.update(&token, |v| v.notice = Some(notice)).await;
                Ok(())
            }
            Err(e) => {
                let notice = failed(&e);
                viewport.update(&token, |v| v.notice = Some(notice)).await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use fokus_core::auth::{AuthEventHub, Session, User};
    use fokus_core::callback::MISSING_TOKEN_MESSAGE;
    use fokus_core::error::AuthError;
    use fokus_core::history::MemoryHistory;
    use fokus_core::viewport::NoticeKind;
    use fokus_storage::MemoryBackend;
    use tokio::sync::Notify;

    use super::*;
    use fokus_core::auth::MemoryAuth;

    fn router(auth: Arc<dyn AuthClient>, cache: KvCache, url: &str) -> Arc<Router> {
        Router::new(Arc::new(MemoryHistory::at(url)))
            .route("/confirm-email", Arc::new(ConfirmEmailPage::new(auth, cache)))
            .route("/", Arc::new(crate::pages::LandingPage))
            .shared()
    }

    fn cache() -> KvCache {
        KvCache::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn valid_token_confirms_and_caches() {
        let auth = Arc::new(MemoryAuth::new());
        let token = auth.issue_token("ada@example.com", true).await;
        let cache = cache();
        let router = router(auth, cache.clone(), &format!("/#access_token={token}&type=signup"));

        router.init().await.unwrap();

        let view = router.viewport().snapshot().await.unwrap();
        assert_eq!(view.page, PAGE);
        assert_eq!(view.notice.unwrap().kind, NoticeKind::Success);
        let record = SessionRecord::load(&cache).await.unwrap();
        assert!(record.confirmed);
        assert_eq!(record.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn rejected_token_shows_failure() {
        let cache = cache();
        let router = router(
            Arc::new(MemoryAuth::new()),
            cache.clone(),
            "/confirm-email#access_token=bogus&type=signup",
        );

        router.init().await.unwrap();

        let notice = router.viewport().snapshot().await.unwrap().notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.text.starts_with("Verification failed"));
        assert!(SessionRecord::load(&cache).await.is_none());
    }

    #[tokio::test]
    async fn missing_token_shows_failure() {
        let router = router(Arc::new(MemoryAuth::new()), cache(), "/#type=signup");
        router.init().await.unwrap();

        let notice = router.viewport().snapshot().await.unwrap().notice.unwrap();
        assert_eq!(notice.text, format!("Verification failed: {MISSING_TOKEN_MESSAGE}"));
    }

    #[tokio::test]
    async fn direct_visit_with_session_confirms() {
        let auth = Arc::new(MemoryAuth::new());
        let token = auth.issue_token("ada@example.com", true).await;
        auth.sign_in(&token).await.unwrap();
        let cache = cache();
        let router = router(auth, cache.clone(), "/confirm-email");

        router.init().await.unwrap();

        let view = router.viewport().snapshot().await.unwrap();
        assert_eq!(view.heading, "Email confirmed");
        assert_eq!(
            SessionRecord::load(&cache).await.unwrap().email.as_deref(),
            Some("ada@example.com")
        );
    }

    #[tokio::test]
    async fn direct_visit_without_session_fails() {
        let cache = cache();
        let router = router(Arc::new(MemoryAuth::new()), cache.clone(), "/confirm-email");

        router.init().await.unwrap();

        let notice = router.viewport().snapshot().await.unwrap().notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.text, "Verification failed: No valid session found.");
        assert!(SessionRecord::load(&cache).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_goes_home_after_delay() {
        let auth = Arc::new(MemoryAuth::new());
        let token = auth.issue_token("ada@example.com", true).await;
        let router = router(auth, cache(), &format!("/#access_token={token}&type=signup"));
        router.init().await.unwrap();

        tokio::time::sleep(REDIRECT_DELAY - Duration::from_millis(100)).await;
        assert!(router.is_route("/confirm-email").await);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(router.is_route("/").await);
        assert_eq!(router.viewport().snapshot().await.unwrap().page, "landing");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_confirmation_stays_put() {
        let router = router(
            Arc::new(MemoryAuth::new()),
            cache(),
            "/confirm-email#access_token=bogus&type=signup",
        );
        router.init().await.unwrap();

        tokio::time::sleep(REDIRECT_DELAY * 2).await;
        assert!(router.is_route("/confirm-email").await);
    }

    /// Auth backend whose `get_user` waits until released.
    struct Gated {
        hub: AuthEventHub,
        release: Notify,
        started: AtomicBool,
    }

    #[async_trait]
    impl AuthClient for Gated {
        fn events(&self) -> &AuthEventHub {
            &self.hub
        }

        async fn get_user(&self, _: &str) -> Result<User, AuthError> {
            self.started.store(true, Ordering::SeqCst);
            self.release.notified().await;
            Ok(User {
                id: "u1".to_owned(),
                email: None,
                email_confirmed_at: None,
            })
        }

        async fn update_user(&self, _: &str) -> Result<User, AuthError> {
            Err(AuthError::MissingSession)
        }

        async fn get_session(&self) -> Result<Option<Session>, AuthError> {
            Ok(None)
        }

        async fn set_session(&self, _: Option<Session>) {}

        async fn sign_out(&self) -> Result<(), AuthError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn late_verification_does_not_overwrite_next_page() {
        let auth = Arc::new(Gated {
            hub: AuthEventHub::new(),
            release: Notify::new(),
            started: AtomicBool::new(false),
        });
        let router = router(auth.clone(), cache(), "/#access_token=slow&type=signup");

        let pending = tokio::spawn({
            let router = Arc::clone(&router);
            async move { router.init().await }
        });
        while !auth.started.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        router.navigate("/").await;
        auth.release.notify_one();
        pending.await.unwrap().unwrap();

        let view = router.viewport().snapshot().await.unwrap();
        assert_eq!(view.page, "landing");
        assert_eq!(view.notice, None);
    }
}
