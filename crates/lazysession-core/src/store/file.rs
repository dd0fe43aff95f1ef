use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;
use crate::util::safe_filename;

use super::KvStore;

/// File-based session store, one file per session.
///
/// Does not expire entries; the cookie's max age is the only expiry.
pub struct FileStore {
    sessions_dir: PathBuf,
}

impl FileStore {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn session_path(&self, id: &str) -> PathBuf {
        let safe_id = safe_filename(&id.replace(':', "_"));
        self.sessions_dir.join(format!("{}.session", safe_id))
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn load(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.session_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read(format!("{}: {}", id, e))),
        }
    }

    async fn save(&self, id: &str, bytes: &[u8], _ttl: Option<u64>) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.sessions_dir).await?;

        // Write then rename so readers never see a partial file.
        let path = self.session_path(id);
        let tmp = path.with_extension("session.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::Write(format!("{}: {}", id, e)))?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Wrote session file {}", path.display());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.session_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Write(format!("{}: {}", id, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("sessions"));

        assert!(store.load("session:abc").await.unwrap().is_none());
        store.save("session:abc", b"{\"a\":1}", Some(60)).await.unwrap();

        let path = store.session_path("session:abc");
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "session_abc.session");
        assert_eq!(
            store.load("session:abc").await.unwrap().as_deref(),
            Some(&b"{\"a\":1}"[..])
        );
    }

    #[tokio::test]
    async fn test_file_store_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        store.save("s", b"one", None).await.unwrap();
        store.save("s", b"two", None).await.unwrap();
        assert_eq!(store.load("s").await.unwrap().as_deref(), Some(&b"two"[..]));
    }

    #[tokio::test]
    async fn test_file_store_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        store.save("session:abc", b"x", None).await.unwrap();
        store.delete("session:abc").await.unwrap();
        assert!(!store.session_path("session:abc").exists());
        store.delete("session:abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_sanitises_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        store.save("../escape", b"x", None).await.unwrap();
        assert!(store.session_path("../escape").starts_with(tmp.path()));
        assert!(store.load("../escape").await.unwrap().is_some());
    }
}
