//! Per-route login token cache.
//!
//! A token is served from cache while `now < expires_at`. Once it has expired
//! (or was never fetched) the caller-supplied login future runs and, on
//! success, its token is stored with a lifetime of [`TOKEN_TTL_HOURS`].
//! Concurrent refreshes for the same route are not serialized: two requests
//! racing past an expired token may both log in, and the last one to finish
//! wins. A failed login leaves the cache untouched so the next call retries.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use tokio::sync::RwLock;

/// Upstream tokens live 48 hours; refresh an hour early.
pub const TOKEN_TTL_HOURS: i64 = 47;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Token state owned by a single route. The lock is never held across the
/// login call.
#[derive(Debug, Default)]
pub struct TokenCache {
    state: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Return the cached token, or run `login` and cache what it returns.
    pub async fn get_or_refresh<F, Fut, E>(&self, login: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(token) = self.current(Utc::now()).await {
            return Ok(token);
        }

        let token = login().await?;
        self.store(token.clone(), Utc::now()).await;
        Ok(token)
    }

    /// Expiry of the cached token, if any.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.as_ref().map(|t| t.expires_at)
    }

    async fn current(&self, now: DateTime<Utc>) -> Option<String> {
        let state = self.state.read().await;
        state
            .as_ref()
            .filter(|t| now < t.expires_at)
            .map(|t| t.value.clone())
    }

    async fn store(&self, value: String, now: DateTime<Utc>) -> DateTime<Utc> {
        let expires_at = now + Duration::hours(TOKEN_TTL_HOURS);
        *self.state.write().await = Some(CachedToken { value, expires_at });
        expires_at
    }

    /// Push the cached token's expiry into the past.
    #[cfg(test)]
    pub async fn expire(&self) {
        if let Some(token) = self.state.write().await.as_mut() {
            token.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}
