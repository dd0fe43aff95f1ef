use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::StoreError;

use super::KvStore;

struct Entry {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn deadline(ttl: Option<u64>) -> Option<Instant> {
    ttl.map(|secs| Instant::now() + Duration::from_secs(secs))
}

/// In-process session store.
///
/// Entries expire after their ttl and vanish with the process. Fine for
/// tests and single-instance development servers, not for production.
///
/// Expired entries are dropped when they are next read or kept alive.
/// Entries nobody touches again stay in memory until [`MemoryStore::purge_expired`]
/// runs, so long-lived processes should call it periodically.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until they are purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        match self.entries.get(id) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.bytes.clone())),
            Some(_) => {}
        }
        self.entries.remove_if(id, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn save(&self, id: &str, bytes: &[u8], ttl: Option<u64>) -> Result<(), StoreError> {
        self.entries.insert(
            id.to_string(),
            Entry {
                bytes: bytes.to_vec(),
                expires_at: deadline(ttl),
            },
        );
        Ok(())
    }

    async fn keep_alive(&self, id: &str, ttl: Option<u64>) -> Result<(), StoreError> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(id) {
            if !entry.is_expired(now) {
                entry.expires_at = deadline(ttl);
                return Ok(());
            }
        }
        // Expired entries stay expired.
        self.entries.remove_if(id, |_, entry| entry.is_expired(now));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.entries.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_save_and_load() {
        let store = MemoryStore::new();
        assert!(store.load("a").await.unwrap().is_none());
        store.save("a", b"hello", None).await.unwrap();
        assert_eq!(store.load("a").await.unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_expiry() {
        let store = MemoryStore::new();
        store.save("a", b"x", Some(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.load("a").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.load("a").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_keep_alive_extends() {
        let store = MemoryStore::new();
        store.save("a", b"x", Some(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        store.keep_alive("a", Some(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(store.load("a").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_keep_alive_does_not_revive_expired() {
        let store = MemoryStore::new();
        store.save("a", b"secret", Some(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        store.keep_alive("a", Some(10)).await.unwrap();

        assert!(store.is_empty());
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryStore::new();
        store.save("a", b"x", None).await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("missing").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_purge() {
        let store = MemoryStore::new();
        store.save("short", b"x", Some(1)).await.unwrap();
        store.save("forever", b"y", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
