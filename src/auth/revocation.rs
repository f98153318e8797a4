//! Token revocation store
//!
//! In-memory TTL store of revoked token ids. Entries expire on
//! their own; there is no cleanup pass. Uses Moka for concurrent
//! per-entry expiration.

use std::time::{Duration, Instant};

use moka::future::Cache;

const MAX_REVOKED_ENTRIES: u64 = 100_000;

/// Per-entry expiry: each revocation carries its own TTL.
struct RevocationExpiry;

impl moka::Expiry<String, Duration> for RevocationExpiry {
    fn expire_after_create(
        &self,
        _token_id: &String,
        ttl: &Duration,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(*ttl)
    }
}

/// Revocation list for issued tokens, keyed by token id.
pub struct RevocationStore {
    entries: Cache<String, Duration>,
}

impl RevocationStore {
    /// Create an empty revocation store.
    pub fn new() -> Self {
        let entries = Cache::builder()
            .max_capacity(MAX_REVOKED_ENTRIES)
            .expire_after(RevocationExpiry)
            .build();

        Self { entries }
    }

    /// Mark a token id revoked for `ttl`.
    ///
    /// The TTL should cover the remaining token lifetime; after it
    /// elapses the token is expired anyway and the entry lapses.
    pub async fn mark_revoked(&self, token_id: &str, ttl: Duration) {
        self.entries.insert(token_id.to_string(), ttl).await;
    }

    /// Whether a token id has been revoked.
    pub async fn is_revoked(&self, token_id: &str) -> bool {
        self.entries.get(token_id).await.is_some()
    }
}

impl Default for RevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marked_token_is_revoked() {
        let store = RevocationStore::new();
        store
            .mark_revoked("token-1", Duration::from_secs(3600))
            .await;

        assert!(store.is_revoked("token-1").await);
        assert!(!store.is_revoked("token-2").await);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let store = RevocationStore::new();
        store
            .mark_revoked("token-1", Duration::from_millis(50))
            .await;

        assert!(store.is_revoked("token-1").await);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!store.is_revoked("token-1").await);
    }
}
