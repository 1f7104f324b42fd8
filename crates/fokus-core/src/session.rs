//! Cached session record and the fixed cache keys.

use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::cache::KvCache;

/// Cache key of the [`SessionRecord`].
pub const USER_KEY: &str = "fokus_user";
/// Cache key of the last fetched subscription status.
pub const SUBSCRIPTION_KEY: &str = "fokus_subscription";
/// Cache key of the error-log buffer.
pub const ERROR_LOG_KEY: &str = "fokus_errors";

/// Minimal identity kept locally for quick checks without a round-trip to
/// the auth backend. At most one exists, under [`USER_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub email: Option<String>,
    pub confirmed: bool,
}

impl From<&User> for SessionRecord {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            confirmed: user.email_confirmed_at.is_some(),
        }
    }
}

impl SessionRecord {
    /// The cached record, if any.
    pub async fn load(cache: &KvCache) -> Option<Self> {
        cache.get(USER_KEY).await
    }

    /// Overwrite the cached record with `user`'s current state.
    pub async fn store(cache: &KvCache, user: &User) -> bool {
        cache.set(USER_KEY, &Self::from(user)).await
    }

    /// Drop the cached record and the subscription status that belongs to it.
    pub async fn clear(cache: &KvCache) -> bool {
        let user = cache.remove(USER_KEY).await;
        let subscription = cache.remove(SUBSCRIPTION_KEY).await;
        user && subscription
    }
}
