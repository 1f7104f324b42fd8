//! The render target page handlers draw into.
//!
//! There is one viewport. Mounting a page bumps a generation counter and
//! hands the page a [`MountToken`]; later writes must present that token.
//! When a slow auth call completes after the user has navigated away, its
//! token is stale and the write is dropped instead of clobbering whatever
//! page is showing now.

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// An inline status message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// What a page currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    /// Name of the page that owns the view.
    pub page: String,
    pub heading: String,
    pub body: Vec<String>,
    pub notice: Option<Notice>,
    /// Whether the page's form controls accept input.
    pub controls_enabled: bool,
}

impl View {
    #[must_use]
    pub fn new(page: impl Into<String>, heading: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            heading: heading.into(),
            body: Vec::new(),
            notice: None,
            controls_enabled: false,
        }
    }

    #[must_use]
    pub fn with_body<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body = lines.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notice = Some(notice);
        self
    }

    #[must_use]
    pub fn with_controls(mut self, enabled: bool) -> Self {
        self.controls_enabled = enabled;
        self
    }
}

/// Proof that a page mounted a view, valid until the next mount or clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountToken {
    generation: u64,
    page: String,
}

impl MountToken {
    #[must_use]
    pub fn page(&self) -> &str {
        &self.page
    }
}

#[derive(Debug, Default)]
struct Screen {
    generation: u64,
    view: Option<View>,
}

/// The single render target.
#[derive(Debug, Default)]
pub struct Viewport {
    screen: RwLock<Screen>,
}

impl Viewport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is showing with `view`.
    pub async fn mount(&self, view: View) -> MountToken {
        let mut screen = self.screen.write().await;
        screen.generation = screen.generation.wrapping_add(1);
        let token = MountToken {
            generation: screen.generation,
            page: view.page.clone(),
        };
        screen.view = Some(view);
        token
    }

    /// Blank the viewport.
    pub async fn clear(&self) {
        let mut screen = self.screen.write().await;
        screen.generation = screen.generation.wrapping_add(1);
        screen.view = None;
    }

    /// Apply `edit` to the mounted view if `token` is still current.
    ///
    /// Returns `false`, leaving the viewport untouched, for a stale token.
    pub async fn update(&self, token: &MountToken, edit: impl FnOnce(&mut View) + Send) -> bool {
        let mut screen = self.screen.write().await;
        if screen.generation != token.generation {
            debug!(page = %token.page, "dropping write from an unmounted page");
            return false;
        }
        match screen.view.as_mut() {
            Some(view) => {
                edit(view);
                true
            }
            None => false,
        }
    }

    /// Whether `token` still owns the viewport.
    pub async fn is_mounted(&self, token: &MountToken) -> bool {
        self.screen.read().await.generation == token.generation
    }

    /// A copy of the current view. `None` when blank.
    pub async fn snapshot(&self) -> Option<View> {
        self.screen.read().await.view.clone()
    }
}
