use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::SignatureError;
use crate::util::unix_now;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SALT: &str = "cookie-session";

const SEPARATOR: u8 = b'.';

/// Sign and verify serialized session bytes.
pub trait Signer: Send + Sync {
    fn sign(&self, payload: &[u8]) -> Vec<u8>;

    /// Verify `signed` and return the original payload.
    ///
    /// `max_age` is the session max age in seconds; signers that embed a
    /// signing time reject payloads older than that.
    fn unsign(&self, signed: &[u8], max_age: Option<u64>) -> Result<Vec<u8>, SignatureError>;
}

/// Passes bytes through untouched.
///
/// Anyone can read and edit content protected by this signer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainSigner;

impl Signer for PlainSigner {
    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        payload.to_vec()
    }

    fn unsign(&self, signed: &[u8], _max_age: Option<u64>) -> Result<Vec<u8>, SignatureError> {
        Ok(signed.to_vec())
    }
}

/// HMAC-SHA256 signer that embeds the signing time.
///
/// Output layout: `payload.b64(timestamp).b64(mac)`, where the MAC covers
/// `payload.b64(timestamp)` and the timestamp is big-endian Unix seconds with
/// leading zero bytes dropped. Fields are split from the right, so the
/// payload itself may contain separators.
#[derive(Clone)]
pub struct TimestampSigner {
    mac: HmacSha256,
}

impl TimestampSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_salt(secret, DEFAULT_SALT)
    }

    /// Different salts give independent keys from the same secret.
    pub fn with_salt(secret: impl AsRef<[u8]>, salt: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_ref());
        hasher.update(b"signer");
        hasher.update(secret.as_ref());
        let key = hasher.finalize();

        let mac = HmacSha256::new_from_slice(&key).expect("HMAC accepts keys of any length");
        Self { mac }
    }

    /// Sign as of `timestamp` (Unix seconds).
    pub fn sign_at(&self, payload: &[u8], timestamp: u64) -> Vec<u8> {
        let ts = timestamp.to_be_bytes();
        let first = ts.iter().position(|b| *b != 0).unwrap_or(ts.len() - 1);

        let mut out = Vec::with_capacity(payload.len() + 64);
        out.extend_from_slice(payload);
        out.push(SEPARATOR);
        out.extend_from_slice(URL_SAFE_NO_PAD.encode(&ts[first..]).as_bytes());

        let mut mac = self.mac.clone();
        mac.update(&out);
        let signature = mac.finalize().into_bytes();

        out.push(SEPARATOR);
        out.extend_from_slice(URL_SAFE_NO_PAD.encode(signature).as_bytes());
        out
    }

    /// Verify as of `now` (Unix seconds).
    pub fn unsign_at(
        &self,
        signed: &[u8],
        max_age: Option<u64>,
        now: u64,
    ) -> Result<Vec<u8>, SignatureError> {
        let (message, signature) =
            rsplit_once(signed).ok_or(SignatureError::Malformed("missing signature"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignatureError::Malformed("signature is not base64"))?;

        let mut mac = self.mac.clone();
        mac.update(message);
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::BadSignature)?;

        let (payload, timestamp) =
            rsplit_once(message).ok_or(SignatureError::Malformed("missing timestamp"))?;
        let timestamp = decode_timestamp(timestamp)?;

        if let Some(max_age) = max_age {
            // Clock skew can put the signing time in the future; that counts as fresh.
            let age = now.saturating_sub(timestamp);
            if age > max_age {
                return Err(SignatureError::Expired { age, max_age });
            }
        }
        Ok(payload.to_vec())
    }
}

impl Signer for TimestampSigner {
    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.sign_at(payload, unix_now())
    }

    fn unsign(&self, signed: &[u8], max_age: Option<u64>) -> Result<Vec<u8>, SignatureError> {
        self.unsign_at(signed, max_age, unix_now())
    }
}

fn rsplit_once(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let at = bytes.iter().rposition(|b| *b == SEPARATOR)?;
    Some((&bytes[..at], &bytes[at + 1..]))
}

fn decode_timestamp(encoded: &[u8]) -> Result<u64, SignatureError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| SignatureError::Malformed("timestamp is not base64"))?;
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(SignatureError::Malformed("timestamp has wrong length"));
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}
