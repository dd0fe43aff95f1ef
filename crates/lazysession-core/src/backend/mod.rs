//! Backends for identifier-indirect sessions.
//!
//! A [`SessionBackend`] owns the lifecycle operations of stored sessions:
//! issuing identifiers, loading, saving and keeping entries alive. Wrapped in
//! an `Arc` it becomes a [`SessionFactory`] producing [`BoundSession`]s.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::codec::{Codec, JsonCodec};
use crate::error::Result;
use crate::session::{BoundSession, Session, SessionFactory};
use crate::store::KvStore;
use crate::types::{CommitPolicy, SessionData, DEFAULT_MAX_AGE};

pub const DEFAULT_KEY_PREFIX: &str = "session:";

/// Generate a new unguessable session identifier (32 hex chars).
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Storage operations behind store-backed sessions.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Max age of every session this backend manages, `None` if they never expire.
    fn max_age(&self) -> Option<u64>;

    /// Whether unmodified sessions are saved or only kept alive.
    fn commit_policy(&self) -> CommitPolicy {
        CommitPolicy::Always
    }

    /// Issue a fresh identifier together with empty content.
    async fn new_session(&self) -> Result<(String, SessionData)> {
        Ok((new_session_id(), SessionData::new()))
    }

    /// Load a stored session. `None` means there is no such session.
    async fn load_session(&self, sid: &str) -> Result<Option<SessionData>>;

    async fn save_session(&self, sid: &str, data: &SessionData) -> Result<()>;

    /// Refresh a session's expiry without reading or rewriting it.
    async fn keep_alive(&self, _sid: &str) -> Result<()> {
        Ok(())
    }
}

impl<B: SessionBackend + ?Sized + 'static> SessionFactory for Arc<B> {
    fn open(&self, token: Option<String>) -> Box<dyn Session> {
        Box::new(BoundSession::new(Arc::clone(self), token))
    }

    fn max_age(&self) -> Option<u64> {
        SessionBackend::max_age(self.as_ref())
    }
}

/// [`SessionBackend`] over any byte-oriented [`KvStore`].
///
/// Encodes content with a [`Codec`] and namespaces identifiers with a key
/// prefix before they reach the store.
pub struct StoreBackend<S> {
    store: S,
    codec: Box<dyn Codec>,
    max_age: Option<u64>,
    key_prefix: String,
    commit_policy: CommitPolicy,
}

impl<S: KvStore> StoreBackend<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            codec: Box::new(JsonCodec),
            max_age: Some(DEFAULT_MAX_AGE),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            commit_policy: CommitPolicy::default(),
        }
    }

    pub fn with_max_age(mut self, max_age: Option<u64>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn store_key(&self, sid: &str) -> String {
        format!("{}{}", self.key_prefix, sid)
    }
}

#[async_trait]
impl<S: KvStore> SessionBackend for StoreBackend<S> {
    fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    fn commit_policy(&self) -> CommitPolicy {
        self.commit_policy
    }

    async fn load_session(&self, sid: &str) -> Result<Option<SessionData>> {
        let key = self.store_key(sid);
        let Some(bytes) = self.store.load(&key).await? else {
            return Ok(None);
        };
        match self.codec.decode(&bytes) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                // An unreadable entry is replaced by a fresh session under a new id.
                warn!("Discarding undecodable session {}: {}", key, e);
                self.store.delete(&key).await?;
                Ok(None)
            }
        }
    }

    async fn save_session(&self, sid: &str, data: &SessionData) -> Result<()> {
        let bytes = self.codec.encode(data)?;
        self.store
            .save(&self.store_key(sid), &bytes, self.max_age)
            .await?;
        Ok(())
    }

    async fn keep_alive(&self, sid: &str) -> Result<()> {
        self.store
            .keep_alive(&self.store_key(sid), self.max_age)
            .await?;
        Ok(())
    }
}
