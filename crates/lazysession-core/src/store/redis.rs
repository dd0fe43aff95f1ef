use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::error::StoreError;

use super::KvStore;

/// Redis-backed session store. Entries expire through Redis key TTLs.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to the server at `url`, e.g. `redis://127.0.0.1/`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis session store at {}", url);
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn load(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let bytes: Option<Vec<u8>> = conn.get(id).await?;
        Ok(bytes)
    }

    async fn save(&self, id: &str, bytes: &[u8], ttl: Option<u64>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(id, bytes, ttl).await?,
            None => conn.set::<_, _, ()>(id, bytes).await?,
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(id).await?;
        Ok(())
    }

    async fn keep_alive(&self, id: &str, ttl: Option<u64>) -> Result<(), StoreError> {
        if let Some(ttl) = ttl {
            let mut conn = self.conn.clone();
            let ttl = i64::try_from(ttl).unwrap_or(i64::MAX);
            conn.expire::<_, ()>(id, ttl).await?;
        }
        Ok(())
    }
}
