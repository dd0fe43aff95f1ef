//! Store-backed session bound to an optional identifier.
//!
//! The cookie carries only the session identifier. Content is joined from
//! the backend on first use, or created fresh when there is nothing to join,
//! and written back once when the request finalizes the session.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::backend::SessionBackend;
use crate::error::Result;
use crate::session::Session;
use crate::types::{CommitPolicy, SessionCookie, SessionData};

enum State {
    /// No identifier: the client presented no token and nothing was written.
    Unbound,
    /// Identifier known, content not loaded yet.
    Pending { sid: String },
    /// Content available, joined from the backend or freshly created.
    Materialized { sid: String, data: SessionData },
}

/// Session whose content lives in a [`SessionBackend`], keyed by identifier.
pub struct BoundSession<B: ?Sized> {
    backend: Arc<B>,
    state: State,
    accessed: bool,
    modified: bool,
}

impl<B: SessionBackend + ?Sized> BoundSession<B> {
    /// Bind to `sid`, the identifier a previous response issued. Does no I/O.
    pub fn new(backend: Arc<B>, sid: Option<String>) -> Self {
        let state = match sid.filter(|s| !s.is_empty()) {
            Some(sid) => State::Pending { sid },
            None => State::Unbound,
        };
        Self {
            backend,
            state,
            accessed: false,
            modified: false,
        }
    }

    /// Current identifier. Changes when a stale identifier is replaced by a new session.
    pub fn session_id(&self) -> Option<&str> {
        match &self.state {
            State::Unbound => None,
            State::Pending { sid } | State::Materialized { sid, .. } => Some(sid),
        }
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self.state, State::Materialized { .. })
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    /// Join the stored session, or create a new one when there is none.
    ///
    /// Runs at most one load per session; later calls return the same map.
    pub async fn materialize(&mut self) -> Result<&mut SessionData> {
        if let State::Pending { sid } = &self.state {
            match self.backend.load_session(sid).await? {
                Some(data) => {
                    debug!("Joined session {}", sid);
                    let sid = sid.clone();
                    self.state = State::Materialized { sid, data };
                }
                None => debug!("Session {} not found, creating a new one", sid),
            }
        }

        if !self.is_materialized() {
            let (sid, data) = self.backend.new_session().await?;
            debug!("Created session {}", sid);
            self.state = State::Materialized { sid, data };
        }

        match &mut self.state {
            State::Materialized { data, .. } => Ok(data),
            State::Unbound | State::Pending { .. } => {
                unreachable!("join-or-create always leaves content bound to an identifier")
            }
        }
    }
}

#[async_trait]
impl<B: SessionBackend + ?Sized> Session for BoundSession<B> {
    async fn get(&mut self, key: &str) -> Result<Option<serde_json::Value>> {
        self.accessed = true;
        if matches!(self.state, State::Unbound) {
            return Ok(None);
        }
        Ok(self.materialize().await?.get(key).cloned())
    }

    async fn insert(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        self.accessed = true;
        self.materialize().await?.insert(key.to_string(), value);
        self.modified = true;
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> Result<Option<serde_json::Value>> {
        self.accessed = true;
        if matches!(self.state, State::Unbound) {
            return Ok(None);
        }
        let removed = self.materialize().await?.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        Ok(removed)
    }

    async fn keys(&mut self) -> Result<Vec<String>> {
        self.accessed = true;
        if matches!(self.state, State::Unbound) {
            return Ok(Vec::new());
        }
        Ok(self.materialize().await?.keys().cloned().collect())
    }

    async fn len(&mut self) -> Result<usize> {
        self.accessed = true;
        if matches!(self.state, State::Unbound) {
            return Ok(0);
        }
        Ok(self.materialize().await?.len())
    }

    fn clear(&mut self) {
        if let State::Materialized { data, .. } = &mut self.state {
            data.clear();
            self.modified = true;
        }
    }

    fn touch(&mut self) {
        self.accessed = true;
    }

    fn max_age(&self) -> Option<u64> {
        self.backend.max_age()
    }

    fn accessed(&self) -> bool {
        self.accessed || self.modified
    }

    async fn finalize(self: Box<Self>) -> Result<SessionCookie> {
        let accessed = self.accessed();
        let BoundSession {
            backend,
            state,
            modified,
            ..
        } = *self;

        let content = match state {
            State::Materialized { sid, data } => {
                if modified || backend.commit_policy() == CommitPolicy::Always {
                    debug!("Saving session {} (modified: {})", sid, modified);
                    backend.save_session(&sid, &data).await?;
                } else {
                    debug!("Session {} unmodified, keeping alive", sid);
                    backend.keep_alive(&sid).await?;
                }
                Some(sid)
            }
            State::Pending { sid } => {
                debug!("Session {} never loaded, keeping alive", sid);
                backend.keep_alive(&sid).await?;
                Some(sid)
            }
            State::Unbound => None,
        };

        Ok(SessionCookie {
            accessed,
            content,
            max_age: backend.max_age(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StoreBackend;
    use crate::store::memory::MemoryStore;

    fn backend() -> Arc<StoreBackend<MemoryStore>> {
        Arc::new(StoreBackend::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_untouched_session_issues_nothing() {
        let session = Box::new(BoundSession::new(backend(), None));
        assert!(!session.accessed());
        let cookie = session.finalize().await.unwrap();
        assert!(!cookie.accessed);
        assert_eq!(cookie.content, None);
    }

    #[tokio::test]
    async fn test_read_without_token_does_not_create() {
        let mut session = BoundSession::new(backend(), None);
        assert_eq!(session.get("user").await.unwrap(), None);
        assert_eq!(session.len().await.unwrap(), 0);
        assert!(session.keys().await.unwrap().is_empty());
        assert_eq!(session.remove("user").await.unwrap(), None);
        assert!(session.accessed());
        assert!(session.session_id().is_none());
        assert!(!session.is_materialized());

        let cookie = Box::new(session).finalize().await.unwrap();
        assert!(cookie.accessed);
        assert_eq!(cookie.content, None);
    }

    #[tokio::test]
    async fn test_insert_creates_session() {
        let backend = backend();
        let mut session = BoundSession::new(backend.clone(), None);
        session.insert("user", serde_json::json!("alice")).await.unwrap();
        assert!(session.modified());
        let sid = session.session_id().unwrap().to_string();
        assert_eq!(sid.len(), 32);

        let cookie = Box::new(session).finalize().await.unwrap();
        assert_eq!(cookie.content.as_deref(), Some(sid.as_str()));

        let mut next = BoundSession::new(backend, Some(sid.clone()));
        assert_eq!(next.get("user").await.unwrap(), Some(serde_json::json!("alice")));
        assert_eq!(next.session_id(), Some(sid.as_str()));
        assert!(!next.modified());
    }

    #[tokio::test]
    async fn test_unknown_sid_is_replaced() {
        let mut session = BoundSession::new(backend(), Some("stale".to_string()));
        assert_eq!(session.get("user").await.unwrap(), None);
        let sid = session.session_id().unwrap();
        assert_ne!(sid, "stale");
        assert!(session.is_materialized());
    }

    #[tokio::test]
    async fn test_empty_token_is_no_token() {
        let session = BoundSession::new(backend(), Some(String::new()));
        assert!(session.session_id().is_none());
    }

    #[tokio::test]
    async fn test_clear_before_materialize_is_noop() {
        let mut session = BoundSession::new(backend(), Some("abc".to_string()));
        session.clear();
        assert!(!session.modified());
        assert!(!session.accessed());
        assert!(!session.is_materialized());
    }

    #[tokio::test]
    async fn test_clear_after_materialize_marks_modified() {
        let mut session = BoundSession::new(backend(), None);
        session.insert("a", serde_json::json!(1)).await.unwrap();
        session.clear();
        assert_eq!(session.len().await.unwrap(), 0);
        assert!(session.modified());
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_not_a_modification() {
        let mut session = BoundSession::new(backend(), Some("abc".to_string()));
        assert_eq!(session.remove("nope").await.unwrap(), None);
        assert!(!session.modified());
        assert!(session.accessed());
    }
}
