//! In-process cache of installation access tokens.
//!
//! Process-lifetime only: entries are never persisted and the cache starts
//! empty after a restart. Expiry is enforced on every `get`; the periodic
//! sweep only reclaims memory for entries nothing asks for anymore.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct CacheEntry {
    token: String,
    expires_at: DateTime<Utc>,
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Token cache keyed by installation id, guarded by a read/write lock.
/// Constructor-created and injected so tests can control clock and contents.
pub struct TokenCache {
    entries: RwLock<HashMap<i64, CacheEntry>>,
    clock: Clock,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::with_clock(Box::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the cached token iff it has not expired.
    pub fn get(&self, installation_id: i64) -> Option<String> {
        let now = (self.clock)();
        let entries = self.entries.read();
        entries
            .get(&installation_id)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.token.clone())
    }

    pub fn set(&self, installation_id: i64, token: String, expires_at: DateTime<Utc>) {
        let mut entries = self.entries.write();
        entries.insert(installation_id, CacheEntry { token, expires_at });
    }

    /// Remove expired entries. Driven by an explicit timer owned by the
    /// process lifecycle; correctness does not depend on it running.
    pub fn clean(&self) {
        let now = (self.clock)();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| now < entry.expires_at);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the periodic sweep for expired entries.
pub fn spawn_sweep_task(cache: Arc<TokenCache>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            cache.clean();
            tracing::debug!(entries = cache.len(), "Token cache sweep complete");
        }
    });
}
