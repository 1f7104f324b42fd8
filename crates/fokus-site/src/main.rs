//! `fokus-site` entry point.
//!
//! Bootstraps the cache backend, the auth collaborator, and the application
//! state, dispatches the start URL (first argument, default `/`), then runs
//! the headless shell over stdin/stdout until `quit`, end of input, or
//! Ctrl-C.
//!
//! The runtime is single-threaded: navigation events and auth state changes
//! interleave only at await points, the way browser callbacks do.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tracing::{info, warn};

use fokus_core::auth::{AuthClient, MemoryAuth, SubscriptionSource};
use fokus_core::history::{History, MemoryHistory};
use fokus_storage::{FileBackend, MemoryBackend, StorageBackend};

use fokus_site::config::{CacheBackendType, SiteConfig};
use fokus_site::shell::{self, Report};
use fokus_site::state::{AppState, Collaborators};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment.
    let config = SiteConfig::from_env();

    // Structured logs go to stderr; stdout carries shell output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!(environment = ?config.environment, cache = ?config.cache, "Fokus site starting");

    let storage = open_storage(&config).await?;
    let (auth, subscriptions) = build_auth(&config);

    let start_url = std::env::args().nth(1).unwrap_or_else(|| "/".to_owned());
    let history: Arc<dyn History> = Arc::new(MemoryHistory::at(&start_url));

    let (state, background) = AppState::build(
        &config,
        Collaborators {
            storage,
            auth,
            subscriptions,
            history,
        },
    );
    state.reporter.install_panic_hook();

    let dispatch = state.start().await.context("router failed to start")?;
    let mut stdout = tokio::io::stdout();
    shell::write_report(&mut stdout, &Report::dispatched(&state, dispatch).await).await?;

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = shell::run(&state, stdin, &mut stdout) => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    background.shutdown(&state.reporter).await;
    info!("Fokus site stopped");
    Ok(())
}

/// Open the configured cache backend.
async fn open_storage(config: &SiteConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    let storage: Arc<dyn StorageBackend> = match &config.cache {
        CacheBackendType::Memory => {
            info!("using in-memory cache (data will not persist)");
            Arc::new(MemoryBackend::with_quota(config.cache_quota_bytes))
        }
        CacheBackendType::File { path } => {
            info!(path = %path, "using file cache");
            Arc::new(
                FileBackend::open_with_quota(path, config.cache_quota_bytes)
                    .await
                    .context("failed to open file cache")?,
            )
        }
    };
    Ok(storage)
}

type AuthParts = (Arc<dyn AuthClient>, Option<Arc<dyn SubscriptionSource>>);

/// Pick the auth collaborator: the remote backend when configured, else an
/// in-memory stand-in.
fn build_auth(config: &SiteConfig) -> AuthParts {
    #[cfg(feature = "remote-auth")]
    if let Some(backend) = &config.auth {
        info!(url = %backend.url, "using remote auth backend");
        let client = Arc::new(fokus_site::gotrue::GoTrueClient::new(backend));
        let subscriptions: Arc<dyn SubscriptionSource> = client.clone();
        return (client, Some(subscriptions));
    }

    #[cfg(not(feature = "remote-auth"))]
    if config.auth.is_some() {
        warn!("FOKUS_AUTH_URL set but feature 'remote-auth' is not enabled");
    }

    warn!("no auth backend configured, using in-memory auth (no link will verify)");
    let auth = Arc::new(MemoryAuth::new());
    let subscriptions: Arc<dyn SubscriptionSource> = auth.clone();
    (auth, Some(subscriptions))
}
