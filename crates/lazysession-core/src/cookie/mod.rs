//! Self-contained sessions: the whole content travels in the cookie.
//!
//! Content is serialized, signed and base64url-encoded into the cookie value,
//! and decoded the same way in reverse when the next request presents it.
//! Nothing is stored server side. A token that fails any step of decoding is
//! treated as if the client had sent none.

pub mod signer;

use std::sync::Arc;

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use tracing::warn;

use crate::codec::{Codec, JsonCodec};
use crate::error::{CodecError, Result, TokenError};
use crate::session::{Session, SessionFactory};
use crate::types::{SessionCookie, SessionData};

pub use signer::{PlainSigner, Signer, TimestampSigner};

/// Emits unpadded base64url, accepts padded and unpadded input.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Cookie sessions whose content anyone can read and edit.
pub type PlainCookieBackend = CookieBackend<PlainSigner>;

/// Cookie sessions protected by a timestamped HMAC that also enforces max age.
pub type SignedCookieBackend = CookieBackend<TimestampSigner>;

/// Factory for cookie-content sessions. Cheap to clone.
pub struct CookieBackend<S> {
    signer: Arc<S>,
    codec: Arc<dyn Codec>,
    max_age: Option<u64>,
}

impl<S> Clone for CookieBackend<S> {
    fn clone(&self) -> Self {
        Self {
            signer: Arc::clone(&self.signer),
            codec: Arc::clone(&self.codec),
            max_age: self.max_age,
        }
    }
}

impl CookieBackend<PlainSigner> {
    pub fn plain(max_age: Option<u64>) -> Self {
        Self::new(PlainSigner, max_age)
    }
}

impl CookieBackend<TimestampSigner> {
    pub fn signed(secret: impl AsRef<[u8]>, max_age: Option<u64>) -> Self {
        Self::new(TimestampSigner::new(secret), max_age)
    }
}

impl<S: Signer> CookieBackend<S> {
    pub fn new(signer: S, max_age: Option<u64>) -> Self {
        Self {
            signer: Arc::new(signer),
            codec: Arc::new(JsonCodec),
            max_age,
        }
    }

    pub fn with_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Turn session content into a cookie value.
    pub fn save_content(&self, data: &SessionData) -> std::result::Result<String, CodecError> {
        let serialized = self.codec.encode(data)?;
        let signed = self.signer.sign(&serialized);
        Ok(TOKEN_ENGINE.encode(signed))
    }

    /// Turn a cookie value back into session content, reporting why it failed.
    pub fn try_load_content(&self, token: &str) -> std::result::Result<SessionData, TokenError> {
        let decoded = TOKEN_ENGINE.decode(token.trim())?;
        let unsigned = self.signer.unsign(&decoded, self.max_age)?;
        Ok(self.codec.decode(&unsigned)?)
    }

    /// Turn a cookie value back into session content, empty if it is unusable.
    pub fn load_content(&self, token: &str) -> SessionData {
        match self.try_load_content(token) {
            Ok(data) => data,
            Err(e) => {
                warn!("Ignoring session cookie: {}", e);
                SessionData::new()
            }
        }
    }
}

impl<S: Signer + 'static> SessionFactory for CookieBackend<S> {
    fn open(&self, token: Option<String>) -> Box<dyn Session> {
        Box::new(CookieSession::new(self.clone(), token.as_deref()))
    }

    fn max_age(&self) -> Option<u64> {
        self.max_age
    }
}

/// Session decoded from, and re-encoded into, the cookie value.
pub struct CookieSession<S> {
    backend: CookieBackend<S>,
    data: SessionData,
    accessed: bool,
    cleared: bool,
}

impl<S: Signer> CookieSession<S> {
    /// Decode `token` eagerly. Unusable tokens give an empty session.
    pub fn new(backend: CookieBackend<S>, token: Option<&str>) -> Self {
        let data = match token {
            Some(token) if !token.is_empty() => backend.load_content(token),
            _ => SessionData::new(),
        };
        Self {
            backend,
            data,
            accessed: false,
            cleared: false,
        }
    }

    /// Cookie value for the current content, recomputed on every call.
    ///
    /// `None` once the session was cleared and nothing was written since.
    pub fn content(&self) -> std::result::Result<Option<String>, CodecError> {
        if self.cleared {
            return Ok(None);
        }
        self.backend.save_content(&self.data).map(Some)
    }
}

#[async_trait]
impl<S: Signer + 'static> Session for CookieSession<S> {
    async fn get(&mut self, key: &str) -> Result<Option<serde_json::Value>> {
        self.accessed = true;
        Ok(self.data.get(key).cloned())
    }

    async fn insert(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        self.accessed = true;
        self.data.insert(key.to_string(), value);
        self.cleared = false;
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> Result<Option<serde_json::Value>> {
        self.accessed = true;
        Ok(self.data.remove(key))
    }

    async fn keys(&mut self) -> Result<Vec<String>> {
        self.accessed = true;
        Ok(self.data.keys().cloned().collect())
    }

    async fn len(&mut self) -> Result<usize> {
        self.accessed = true;
        Ok(self.data.len())
    }

    fn clear(&mut self) {
        self.accessed = true;
        self.data.clear();
        self.cleared = true;
    }

    fn touch(&mut self) {
        self.accessed = true;
    }

    fn max_age(&self) -> Option<u64> {
        self.backend.max_age
    }

    fn accessed(&self) -> bool {
        self.accessed
    }

    async fn finalize(self: Box<Self>) -> Result<SessionCookie> {
        Ok(SessionCookie {
            accessed: self.accessed,
            content: self.content()?,
            max_age: self.backend.max_age,
        })
    }
}
