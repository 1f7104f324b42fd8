//! Capped error-log buffer and the background reporter that feeds it.
//!
//! Uncaught failures (panics, crashed tasks) are a diagnostic concern only:
//! they are logged, and outside development appended to a buffer of at most
//! [`MAX_ERROR_RECORDS`] entries kept in the cache for later inspection. The
//! oldest entry is evicted first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::cache::KvCache;
use crate::history::History;
use crate::session::ERROR_LOG_KEY;

/// Capacity of the error-log buffer.
pub const MAX_ERROR_RECORDS: usize = 10;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development: errors are logged but not persisted.
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Parse `development`/`dev`/`local`; anything else is production.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Self::Development,
            _ => Self::Production,
        }
    }
}

/// One captured failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    pub stack: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
}

/// Load the buffer. A missing or unreadable buffer is empty.
pub async fn load(cache: &KvCache) -> Vec<ErrorRecord> {
    cache.get(ERROR_LOG_KEY).await.unwrap_or_default()
}

/// Append `record`, evict the oldest entries beyond [`MAX_ERROR_RECORDS`],
/// and persist. Returns whether the buffer was stored.
pub async fn append(cache: &KvCache, record: ErrorRecord) -> bool {
    let mut records = load(cache).await;
    records.push(record);
    if records.len() > MAX_ERROR_RECORDS {
        let excess = records.len() - MAX_ERROR_RECORDS;
        records.drain(..excess);
    }
    cache.set(ERROR_LOG_KEY, &records).await
}

/// Where captured errors are stamped from.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub environment: Environment,
    /// Scheme and host prefixed to the current location, e.g. `https://fokus.app`.
    pub origin: String,
    pub user_agent: String,
}

enum Message {
    Record(ErrorRecord),
    Close,
}

/// Handle to the background error reporter.
///
/// Cloning is cheap. Reports are queued on an unbounded channel so they can
/// be sent from synchronous contexts such as a panic hook; a single task
/// drains the queue in order.
#[derive(Clone)]
pub struct ErrorReporter {
    tx: mpsc::UnboundedSender<Message>,
    history: Arc<dyn History>,
    context: Arc<ReportContext>,
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl ErrorReporter {
    /// Start the reporter task. It exits after [`close`](Self::close) or once
    /// every handle is dropped, having stored everything queued before.
    pub fn spawn(
        cache: KvCache,
        history: Arc<dyn History>,
        context: ReportContext,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let environment = context.environment;

        let task = tokio::spawn(async move {
            while let Some(Message::Record(record)) = rx.recv().await {
                error!(
                    message = %record.message,
                    url = %record.url,
                    "uncaught error"
                );
                if environment == Environment::Development {
                    continue;
                }
                if !append(&cache, record).await {
                    warn!("error record could not be persisted");
                }
            }
            debug!("error reporter stopped");
        });

        let reporter = Self {
            tx,
            history,
            context: Arc::new(context),
        };
        (reporter, task)
    }

    /// Queue a failure stamped with the current location and time.
    pub fn report(&self, message: impl Into<String>, stack: impl Into<String>) {
        let record = ErrorRecord {
            message: message.into(),
            stack: stack.into(),
            url: format!("{}{}", self.context.origin, self.history.location()),
            timestamp: Utc::now(),
            user_agent: self.context.user_agent.clone(),
        };
        if self.tx.send(Message::Record(record)).is_err() {
            warn!("error reporter is gone, dropping record");
        }
    }

    /// Ask the task to stop once the reports queued so far are stored.
    /// Later reports are dropped.
    pub fn close(&self) {
        if self.tx.send(Message::Close).is_err() {
            debug!("error reporter already stopped");
        }
    }

    /// Report panics through this reporter, then run the previous hook.
    pub fn install_panic_hook(&self) {
        let reporter = self.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let payload = info.payload();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic with non-string payload".to_owned());
            let location = info
                .location()
                .map(|l| format!("at {}:{}:{}\n", l.file(), l.line(), l.column()))
                .unwrap_or_default();
            let backtrace = std::backtrace::Backtrace::force_capture();
            reporter.report(message, format!("{location}{backtrace}"));
            previous(info);
        }));
    }
}
