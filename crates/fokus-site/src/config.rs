//! Site configuration.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `FOKUS_*` environment variables.

use fokus_core::callback::{CONFIRM_EMAIL_PATH, CallbackPaths, RESET_PASSWORD_PATH};
use fokus_core::error_log::Environment;
use fokus_storage::DEFAULT_QUOTA_BYTES;

/// Site configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Development keeps captured errors out of the persisted error log.
    pub environment: Environment,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Remote auth backend (without it an in-memory backend is used).
    pub auth: Option<AuthBackendConfig>,
    /// Where cached records live.
    pub cache: CacheBackendType,
    /// Byte quota of the cache backend.
    pub cache_quota_bytes: usize,
    /// Paths of the password-reset and email-confirmation pages.
    pub callback_paths: CallbackPaths,
    /// Routes a signed-out user is sent away from.
    pub protected_routes: Vec<String>,
    /// Origin prefixed to locations in error records.
    pub site_origin: String,
    /// User agent stamped on error records.
    pub user_agent: String,
    /// Whether sign-in triggers a subscription-status refresh.
    pub refresh_subscription: bool,
}

/// Connection settings for a GoTrue-compatible auth backend.
#[derive(Debug, Clone)]
pub struct AuthBackendConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
}

/// Supported cache backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackendType {
    /// In-memory (data lost on exit).
    Memory,
    /// JSON document on disk.
    File { path: String },
}

impl SiteConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FOKUS_ENV` — `development` or `production` (default: `production`)
    /// - `FOKUS_LOG_LEVEL` — log filter (default: `info`)
    /// - `FOKUS_AUTH_URL` / `FOKUS_AUTH_ANON_KEY` — remote auth backend
    /// - `FOKUS_CACHE` — `memory` or `file` (default: `memory`)
    /// - `FOKUS_CACHE_PATH` — file backend path (default: `./fokus-cache.json`)
    /// - `FOKUS_CACHE_QUOTA_BYTES` — cache quota (default: 5 MiB)
    /// - `FOKUS_RESET_PASSWORD_PATH` (default: `/reset-password`)
    /// - `FOKUS_CONFIRM_EMAIL_PATH` (default: `/confirm-email`)
    /// - `FOKUS_PROTECTED_ROUTES` — comma-separated paths (default: none)
    /// - `FOKUS_SITE_ORIGIN` (default: `https://fokus.app`)
    /// - `FOKUS_USER_AGENT` (default: `fokus-site/<version>`)
    /// - `FOKUS_REFRESH_SUBSCRIPTION` — `false`/`0` disables (default: `true`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = lookup("FOKUS_ENV")
            .map_or(Environment::Production, |v| Environment::from_name(&v));

        let log_level = lookup("FOKUS_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let auth = lookup("FOKUS_AUTH_URL").map(|url| AuthBackendConfig {
            url: url.trim_end_matches('/').to_owned(),
            anon_key: lookup("FOKUS_AUTH_ANON_KEY").unwrap_or_default(),
        });

        let cache = match lookup("FOKUS_CACHE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "file" => CacheBackendType::File {
                path: lookup("FOKUS_CACHE_PATH")
                    .unwrap_or_else(|| "./fokus-cache.json".to_owned()),
            },
            _ => CacheBackendType::Memory,
        };

        let cache_quota_bytes = lookup("FOKUS_CACHE_QUOTA_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_QUOTA_BYTES);

        let callback_paths = CallbackPaths {
            reset_password: lookup("FOKUS_RESET_PASSWORD_PATH")
                .unwrap_or_else(|| RESET_PASSWORD_PATH.to_owned()),
            confirm_email: lookup("FOKUS_CONFIRM_EMAIL_PATH")
                .unwrap_or_else(|| CONFIRM_EMAIL_PATH.to_owned()),
        };

        let protected_routes = lookup("FOKUS_PROTECTED_ROUTES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let site_origin = lookup("FOKUS_SITE_ORIGIN")
            .map(|v| v.trim_end_matches('/').to_owned())
            .unwrap_or_else(|| "https://fokus.app".to_owned());

        let user_agent = lookup("FOKUS_USER_AGENT")
            .unwrap_or_else(|| format!("fokus-site/{}", env!("CARGO_PKG_VERSION")));

        let refresh_subscription = lookup("FOKUS_REFRESH_SUBSCRIPTION")
            .is_none_or(|v| v != "false" && v != "0");

        Self {
            environment,
            log_level,
            auth,
            cache,
            cache_quota_bytes,
            callback_paths,
            protected_routes,
            site_origin,
            user_agent,
            refresh_subscription,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> SiteConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        SiteConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = SiteConfig::default();
        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.cache, CacheBackendType::Memory);
        assert_eq!(cfg.cache_quota_bytes, DEFAULT_QUOTA_BYTES);
        assert_eq!(cfg.callback_paths, CallbackPaths::default());
        assert!(cfg.protected_routes.is_empty());
        assert!(cfg.auth.is_none());
        assert!(cfg.refresh_subscription);
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("FOKUS_ENV", "development"),
            ("FOKUS_AUTH_URL", "https://abc.supabase.co/"),
            ("FOKUS_AUTH_ANON_KEY", "anon"),
            ("FOKUS_CACHE", "file"),
            ("FOKUS_CACHE_PATH", "/tmp/cache.json"),
            ("FOKUS_PROTECTED_ROUTES", "/account, /billing,,"),
            ("FOKUS_REFRESH_SUBSCRIPTION", "0"),
        ]);
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.auth.unwrap().url, "https://abc.supabase.co");
        assert_eq!(
            cfg.cache,
            CacheBackendType::File {
                path: "/tmp/cache.json".to_owned()
            }
        );
        assert_eq!(cfg.protected_routes, vec!["/account", "/billing"]);
        assert!(!cfg.refresh_subscription);
    }
}
