//! Persisted-session port

use async_trait::async_trait;
use thiserror::Error;
use warden_domain::StoredSession;

/// Errors from the persisted-session store.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// The underlying storage failed.
    #[error("session store I/O error: {0}")]
    Io(String),

    /// The stored document could not be encoded or decoded.
    #[error("session store serialization error: {0}")]
    Serialization(String),
}

/// Port for durable session persistence between process runs.
///
/// The silent session check replays what this store holds; clearing it is
/// part of logout. A missing entry is not an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the persisted session, if any.
    async fn load(&self) -> Result<Option<StoredSession>, SessionStoreError>;

    /// Persists the session, replacing any previous entry.
    async fn save(&self, session: &StoredSession) -> Result<(), SessionStoreError>;

    /// Removes the persisted session. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), SessionStoreError>;
}
