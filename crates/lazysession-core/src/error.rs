use std::path::PathBuf;

/// Core error types for lazysession.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures of the storage engine behind identifier-indirect sessions.
///
/// These always propagate: a store fault means the infrastructure is
/// unavailable, which is different from a session being absent.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read session: {0}")]
    Read(String),

    #[error("Failed to write session: {0}")]
    Write(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "redis-backend")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to serialize session: {0}")]
    Serialize(String),

    #[error("Failed to deserialize session: {0}")]
    Deserialize(String),
}

/// Reasons a signed payload is rejected.
///
/// Only ever logged. Every variant leads to the same outcome for the caller:
/// the token is treated as absent and the session starts empty.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Malformed token: {0}")]
    Malformed(&'static str),

    #[error("Signature does not match")]
    BadSignature,

    #[error("Signature age {age}s exceeds max age {max_age}s")]
    Expired { age: u64, max_age: u64 },
}

/// Why a cookie token could not be turned back into session content.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Payload(#[from] CodecError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No secret key configured for signed cookies")]
    MissingSecret,
}

pub type Result<T> = std::result::Result<T, SessionError>;
