pub mod bound;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, Result};
use crate::types::SessionCookie;

pub use bound::BoundSession;

/// Per-request session state, as seen by request handlers.
///
/// Construction never touches a backend. Storage is reached lazily on the
/// first key access, and once more by [`Session::finalize`] at the end of the
/// request.
#[async_trait]
pub trait Session: Send {
    /// Look up a key.
    async fn get(&mut self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Set a key, replacing any previous value.
    async fn insert(&mut self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Remove a key, returning its value if it was present.
    async fn remove(&mut self, key: &str) -> Result<Option<serde_json::Value>>;

    /// All keys currently in the session, in no particular order.
    async fn keys(&mut self) -> Result<Vec<String>>;

    async fn len(&mut self) -> Result<usize>;

    async fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove every key.
    fn clear(&mut self);

    /// Mark the session accessed without reading it.
    ///
    /// The boundary reissues the cookie with a fresh max age, and
    /// store-backed sessions refresh their entry's expiry instead of loading it.
    fn touch(&mut self);

    /// Seconds until the session expires, `None` if it never does.
    fn max_age(&self) -> Option<u64>;

    /// Whether anything observable happened to the session this request.
    fn accessed(&self) -> bool;

    /// Persist what needs persisting and hand back the outbound cookie state.
    ///
    /// Called exactly once, by the request/response layer, when the request
    /// is done with the session.
    async fn finalize(self: Box<Self>) -> Result<SessionCookie>;
}

/// Typed access on top of [`Session`].
#[async_trait]
pub trait SessionExt: Session {
    /// Look up a key and deserialize its value.
    async fn get_as<T>(&mut self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| CodecError::Deserialize(e.to_string()).into()),
            None => Ok(None),
        }
    }

    /// Serialize a value and set it under a key.
    async fn insert_as<T>(&mut self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let value =
            serde_json::to_value(value).map_err(|e| CodecError::Serialize(e.to_string()))?;
        self.insert(key, value).await
    }
}

impl<S: Session + ?Sized> SessionExt for S {}

/// Opens one session per inbound request.
///
/// `token` is the cookie value the client presented, if any.
pub trait SessionFactory: Send + Sync {
    fn open(&self, token: Option<String>) -> Box<dyn Session>;

    /// Max age applied uniformly to every session this factory opens.
    fn max_age(&self) -> Option<u64>;
}
