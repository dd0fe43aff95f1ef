pub mod memory;

#[cfg(feature = "file-backend")]
pub mod file;

#[cfg(feature = "redis-backend")]
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

/// Byte-level key-value storage engine behind store-backed sessions.
///
/// Identifiers arrive already namespaced. `ttl` is the backend's max age in
/// seconds; engines without expiry support ignore it.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read an entry. A missing or expired entry is `None`, not an error.
    async fn load(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn save(&self, id: &str, bytes: &[u8], ttl: Option<u64>) -> Result<(), StoreError>;

    /// Remove an entry. Removing a missing entry is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Push an entry's expiry out by `ttl` without rewriting it.
    async fn keep_alive(&self, _id: &str, _ttl: Option<u64>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    async fn load(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.as_ref().load(id).await
    }

    async fn save(&self, id: &str, bytes: &[u8], ttl: Option<u64>) -> Result<(), StoreError> {
        self.as_ref().save(id, bytes, ttl).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.as_ref().delete(id).await
    }

    async fn keep_alive(&self, id: &str, ttl: Option<u64>) -> Result<(), StoreError> {
        self.as_ref().keep_alive(id, ttl).await
    }
}
