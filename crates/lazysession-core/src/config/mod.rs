use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{StoreBackend, DEFAULT_KEY_PREFIX};
use crate::cookie::signer::DEFAULT_SALT;
use crate::cookie::{CookieBackend, TimestampSigner};
use crate::error::{ConfigError, Result};
use crate::session::SessionFactory;
use crate::store::memory::MemoryStore;
use crate::store::KvStore;
use crate::types::{CommitPolicy, DEFAULT_MAX_AGE};

/// Which kind of session backend to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    Memory,
    File,
    Redis,
    Cookie,
    #[default]
    SignedCookie,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::File => write!(f, "file"),
            BackendKind::Redis => write!(f, "redis"),
            BackendKind::Cookie => write!(f, "cookie"),
            BackendKind::SignedCookie => write!(f, "signedCookie"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_string()))
            .map_err(|_| ConfigError::Invalid(format!("unknown backend: {}", s)))
    }
}

/// Root configuration for lazysession.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub backend: BackendKind,
    /// Seconds until sessions expire; `null` for sessions that never expire.
    pub max_age: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    pub salt: String,
    pub key_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<String>,
    pub redis_url: String,
    pub commit_policy: CommitPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            max_age: Some(DEFAULT_MAX_AGE),
            secret_key: None,
            salt: DEFAULT_SALT.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            store_dir: None,
            redis_url: "redis://127.0.0.1/".to_string(),
            commit_policy: CommitPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Directory for the file backend, with `~/` expanded.
    pub fn store_path(&self) -> PathBuf {
        match &self.store_dir {
            Some(dir) if dir.starts_with("~/") || dir.starts_with("~\\") => dirs::home_dir()
                .map(|home| home.join(&dir[2..]))
                .unwrap_or_else(|| PathBuf::from(dir)),
            Some(dir) => PathBuf::from(dir),
            None => get_data_dir().join("sessions"),
        }
    }

    /// Check the settings the configured backend depends on.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.backend == BackendKind::SignedCookie
            && self.secret_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::MissingSecret);
        }
        if matches!(self.backend, BackendKind::Memory | BackendKind::File | BackendKind::Redis)
            && self.key_prefix.contains(char::is_whitespace)
        {
            return Err(ConfigError::Invalid(format!(
                "key prefix must not contain whitespace: {:?}",
                self.key_prefix
            )));
        }
        Ok(())
    }

    fn store_backend<S: KvStore>(&self, store: S) -> StoreBackend<S> {
        StoreBackend::new(store)
            .with_max_age(self.max_age)
            .with_key_prefix(self.key_prefix.clone())
            .with_commit_policy(self.commit_policy)
    }
}

/// Build the session factory the configuration describes.
///
/// Store connections are made here, from explicit settings only.
pub async fn build_factory(config: &SessionConfig) -> Result<Arc<dyn SessionFactory>> {
    config.validate()?;

    let factory: Arc<dyn SessionFactory> = match config.backend {
        BackendKind::Memory => Arc::new(Arc::new(config.store_backend(MemoryStore::new()))),
        BackendKind::File => file_factory(config)?,
        BackendKind::Redis => redis_factory(config).await?,
        BackendKind::Cookie => Arc::new(CookieBackend::plain(config.max_age)),
        BackendKind::SignedCookie => {
            let secret = config.secret_key.as_deref().unwrap_or_default();
            let signer = TimestampSigner::with_salt(secret, &config.salt);
            Arc::new(CookieBackend::new(signer, config.max_age))
        }
    };

    tracing::debug!("Built {} session factory", config.backend);
    Ok(factory)
}

#[cfg(feature = "file-backend")]
fn file_factory(config: &SessionConfig) -> Result<Arc<dyn SessionFactory>> {
    let store = crate::store::file::FileStore::new(config.store_path());
    Ok(Arc::new(Arc::new(config.store_backend(store))))
}

#[cfg(not(feature = "file-backend"))]
fn file_factory(_config: &SessionConfig) -> Result<Arc<dyn SessionFactory>> {
    Err(ConfigError::Invalid("built without the file-backend feature".to_string()).into())
}

#[cfg(feature = "redis-backend")]
async fn redis_factory(config: &SessionConfig) -> Result<Arc<dyn SessionFactory>> {
    let store = crate::store::redis::RedisStore::connect(&config.redis_url).await?;
    Ok(Arc::new(Arc::new(config.store_backend(store))))
}

#[cfg(not(feature = "redis-backend"))]
async fn redis_factory(_config: &SessionConfig) -> Result<Arc<dyn SessionFactory>> {
    Err(ConfigError::Invalid("built without the redis-backend feature".to_string()).into())
}

// ====== Config loading/saving ======

/// Load configuration from environment variables.
///
/// Priority:
/// 1. `LAZYSESSION_CONFIG` env var, full JSON config
/// 2. Individual env vars (merged on top of the file config)
/// 3. File fallback (`~/.lazysession/config.json`)
pub fn load_config_from_env() -> SessionConfig {
    if let Ok(json) = std::env::var("LAZYSESSION_CONFIG") {
        match serde_json::from_str::<SessionConfig>(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to parse LAZYSESSION_CONFIG: {}", e);
            }
        }
    }

    let mut cfg = load_config(None);

    if let Ok(v) = std::env::var("LAZYSESSION_BACKEND") {
        match v.parse() {
            Ok(kind) => cfg.backend = kind,
            Err(e) => tracing::warn!("Ignoring LAZYSESSION_BACKEND: {}", e),
        }
    }
    if let Ok(v) = std::env::var("LAZYSESSION_MAX_AGE") {
        match v.trim() {
            "" | "none" | "never" => cfg.max_age = None,
            n => match n.parse::<u64>() {
                Ok(secs) => cfg.max_age = Some(secs),
                Err(e) => tracing::warn!("Ignoring LAZYSESSION_MAX_AGE={}: {}", v, e),
            },
        }
    }
    if let Ok(v) = std::env::var("LAZYSESSION_SECRET_KEY") {
        cfg.secret_key = Some(v);
    }
    if let Ok(v) = std::env::var("LAZYSESSION_REDIS_URL") {
        cfg.redis_url = v;
    }

    cfg
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Get the lazysession data directory.
pub fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lazysession")
}

/// Load configuration from file or fall back to defaults.
pub fn load_config(config_path: Option<&Path>) -> SessionConfig {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match read_config(&path) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    SessionConfig::default()
}

/// Read a configuration file, failing if it is missing or invalid.
pub fn read_config(path: &Path) -> std::result::Result<SessionConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(ConfigError::Invalid(e.to_string())),
    };
    Ok(serde_json::from_str(&content)?)
}

/// Save configuration to file.
pub fn save_config(
    config: &SessionConfig,
    config_path: Option<&Path>,
) -> std::result::Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::session::Session;

    #[test]
    fn test_default_config() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.backend, BackendKind::SignedCookie);
        assert_eq!(cfg.max_age, Some(1_209_600));
        assert_eq!(cfg.key_prefix, "session:");
        assert_eq!(cfg.commit_policy, CommitPolicy::Always);
        assert!(cfg.secret_key.is_none());
    }

    #[test]
    fn test_config_camelcase_compat() {
        let json = r#"{
            "backend": "memory",
            "maxAge": null,
            "keyPrefix": "app:",
            "commitPolicy": "modified"
        }"#;
        let cfg: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.backend, BackendKind::Memory);
        assert_eq!(cfg.max_age, None);
        assert_eq!(cfg.key_prefix, "app:");
        assert_eq!(cfg.commit_policy, CommitPolicy::Modified);
        assert_eq!(cfg.salt, DEFAULT_SALT);
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("signedCookie".parse::<BackendKind>().unwrap(), BackendKind::SignedCookie);
        assert_eq!(" redis ".parse::<BackendKind>().unwrap(), BackendKind::Redis);
        assert!("postgres".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_validate_requires_secret() {
        let mut cfg = SessionConfig::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingSecret)));
        cfg.secret_key = Some(String::new());
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingSecret)));
        cfg.secret_key = Some("s3cret".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_store_path_expansion() {
        let cfg = SessionConfig {
            store_dir: Some("~/sessions".to_string()),
            ..SessionConfig::default()
        };
        assert!(!cfg.store_path().to_str().unwrap().starts_with("~/"));
        assert!(SessionConfig::default().store_path().ends_with("sessions"));
    }

    #[test]
    fn test_save_and_load_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let cfg = SessionConfig {
            backend: BackendKind::File,
            max_age: Some(60),
            ..SessionConfig::default()
        };
        save_config(&cfg, Some(&path)).unwrap();

        assert!(path.exists());
        let loaded = load_config(Some(&path));
        assert_eq!(loaded.backend, BackendKind::File);
        assert_eq!(loaded.max_age, Some(60));
    }

    #[test]
    fn test_load_config_missing_file() {
        let path = Path::new("/tmp/nonexistent_lazysession_test.json");
        let cfg = load_config(Some(path));
        assert_eq!(cfg.backend, BackendKind::SignedCookie);
        assert!(matches!(read_config(path), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_config_invalid_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_config(&path), Err(ConfigError::Parse(_))));
        assert_eq!(load_config(Some(&path)).backend, BackendKind::SignedCookie);
    }

    #[test]
    fn test_load_config_from_env() {
        std::env::set_var("LAZYSESSION_CONFIG", r#"{"backend": "cookie", "maxAge": 5}"#);
        let cfg = load_config_from_env();
        assert_eq!(cfg.backend, BackendKind::Cookie);
        assert_eq!(cfg.max_age, Some(5));
        std::env::remove_var("LAZYSESSION_CONFIG");

        std::env::set_var("LAZYSESSION_BACKEND", "memory");
        std::env::set_var("LAZYSESSION_MAX_AGE", "never");
        std::env::set_var("LAZYSESSION_SECRET_KEY", "from-env");
        let cfg = load_config_from_env();
        assert_eq!(cfg.backend, BackendKind::Memory);
        assert_eq!(cfg.max_age, None);
        assert_eq!(cfg.secret_key.as_deref(), Some("from-env"));
        std::env::remove_var("LAZYSESSION_BACKEND");
        std::env::remove_var("LAZYSESSION_MAX_AGE");
        std::env::remove_var("LAZYSESSION_SECRET_KEY");
    }

    #[tokio::test]
    async fn test_build_factory_signed_cookie() {
        let cfg = SessionConfig {
            secret_key: Some("s3cret".to_string()),
            max_age: Some(30),
            ..SessionConfig::default()
        };
        let factory = build_factory(&cfg).await.unwrap();
        assert_eq!(factory.max_age(), Some(30));

        let mut session = factory.open(None);
        session.insert("k", serde_json::json!(1)).await.unwrap();
        let token = session.finalize().await.unwrap().content.unwrap();

        let mut session = factory.open(Some(token));
        assert_eq!(session.get("k").await.unwrap(), Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn test_build_factory_missing_secret() {
        let err = build_factory(&SessionConfig::default()).await.err().unwrap();
        assert!(matches!(err, SessionError::Config(ConfigError::MissingSecret)));
    }

    #[cfg(feature = "file-backend")]
    #[tokio::test]
    async fn test_build_factory_file_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SessionConfig {
            backend: BackendKind::File,
            store_dir: Some(tmp.path().to_string_lossy().into_owned()),
            ..SessionConfig::default()
        };
        let factory = build_factory(&cfg).await.unwrap();

        let mut session = factory.open(None);
        session.insert("k", serde_json::json!("v")).await.unwrap();
        let sid = session.finalize().await.unwrap().content.unwrap();

        let mut session = factory.open(Some(sid));
        assert_eq!(session.get("k").await.unwrap(), Some(serde_json::json!("v")));
    }
}
