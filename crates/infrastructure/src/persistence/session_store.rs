//! Session store implementations
//!
//! The file-backed store is the durable analog of a browser's session
//! storage: one small JSON document holding what the silent session check
//! replays. Keep the file out of anything that syncs or commits.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_application::ports::{SessionStore, SessionStoreError};
use warden_domain::StoredSession;

/// File-backed session store.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Creates a store over the given file path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a store under the platform's per-user data directory, or
    /// `None` when the platform offers none.
    #[must_use]
    pub fn in_user_data_dir(app_name: &str) -> Option<Self> {
        dirs::data_local_dir().map(|dir| Self::new(dir.join(app_name).join("session.json")))
    }

    /// The file this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<StoredSession>, SessionStoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| SessionStoreError::Serialization(e.to_string())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(SessionStoreError::Io(error.to_string())),
        }
    }

    async fn save(&self, session: &StoredSession) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionStoreError::Io(e.to_string()))?;
        }

        let bytes = serde_json::to_vec_pretty(session)
            .map_err(|e| SessionStoreError::Serialization(e.to_string()))?;

        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| SessionStoreError::Io(e.to_string()))
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(SessionStoreError::Io(error.to_string())),
        }
    }
}

/// In-memory session store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<StoredSession>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<StoredSession>, SessionStoreError> {
        Ok(self.session.read().await.clone())
    }

    async fn save(&self, session: &StoredSession) -> Result<(), SessionStoreError> {
        *self.session.write().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        *self.session.write().await = None;
        Ok(())
    }
}
