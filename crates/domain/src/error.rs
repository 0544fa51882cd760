//! Authentication error types

use thiserror::Error;

/// Errors produced by the authentication session manager.
///
/// All variants carry owned strings so errors can be recorded in the shared
/// session state and cloned out to every consumer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The provider handshake failed during initialization.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// An operation requiring a live session was called while unauthenticated.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The provider rejected a token refresh; the session has been ended.
    #[error("token refresh rejected: {0}")]
    TokenRefresh(String),

    /// The user profile could not be loaded after exhausting retries.
    #[error("profile load failed: {0}")]
    ProfileLoad(String),

    /// login/logout was called before the provider client was constructed.
    #[error("identity provider not ready")]
    ProviderNotReady,

    /// A token could not be decoded into claims.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// An opaque downstream transport failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Result type alias for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
