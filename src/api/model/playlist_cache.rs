use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

struct PlaylistCacheEntry {
    body: String,
    fetched_at: Instant,
}

/// Rewritten playlist bodies keyed by the exact decoded upstream url.
/// The ttl is short enough to track live-stream drift while still absorbing
/// bursts of near-simultaneous requests for the same channel.
pub struct PlaylistCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, PlaylistCacheEntry>>,
}

impl PlaylistCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub async fn get(&self, upstream_url: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(upstream_url)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.body.clone())
    }

    /// Last writer wins on a key. The sweep rides on writes; entries expire in
    /// seconds, so there is no background timer to manage.
    pub async fn store(&self, upstream_url: &str, body: String) {
        let mut entries = self.entries.write().await;
        let purge_age = self.ttl * 10;
        entries.retain(|_, entry| entry.fetched_at.elapsed() < purge_age);
        entries.insert(upstream_url.to_string(), PlaylistCacheEntry { body, fetched_at: Instant::now() });
    }

    #[cfg(test)]
    pub(crate) async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}
