//! Single-process backend, used in development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{AppError, AppResult};
use crate::store::EphemeralStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Sweep expired entries in the background so keys that are never read again
    /// do not accumulate.
    pub fn spawn_purger(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = store.purge_expired().await;
                if removed > 0 {
                    log::debug!("Purged {removed} expired ephemeral entries");
                }
            }
        })
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[&str]) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> AppResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                let count: u64 = entry.value.parse().map_err(|_| {
                    AppError::StoreUnavailable(format!("value at {key} is not a counter"))
                })?;
                let count = count + 1;
                entry.value = count.to_string();
                Ok(count)
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let store = MemoryStore::new();
        store
            .set_ex("otp:+1", "hash".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("otp:+1").await.unwrap().as_deref(), Some("hash"));

        store.del(&["otp:+1", "missing"]).await.unwrap();
        assert_eq!(store.get("otp:+1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v".to_string(), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_expiry_is_fixed_on_first_increment() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.incr_with_expiry("c", ttl).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(store.incr_with_expiry("c", ttl).await.unwrap(), 2);

        // The second increment did not push the expiry out.
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.incr_with_expiry("c", ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .incr_with_expiry("c", Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get("c").await.unwrap().as_deref(), Some("50"));
    }
}
