//! Warden Application - Session orchestration
//!
//! This crate owns everything between the domain types and the wire: the
//! port traits external systems plug into, the shared observable session
//! state, the identity-provider capability, the profile loader's retry
//! machinery, the background refresh scheduler, the facade, the route
//! guard, and the request interceptor.

pub mod guard;
pub mod interceptor;
pub mod ports;
pub mod profile;
pub mod provider;
pub mod scheduler;
pub mod service;
pub mod state;

pub use guard::RouteGuard;
pub use interceptor::{AuthHttpClient, RequestError};
pub use profile::ProfileLoader;
pub use provider::{
    AuthorizationRedirect, DEFAULT_MIN_TOKEN_VALIDITY_SECS, IdentityProvider,
};
pub use scheduler::{RefreshHandle, TokenRefreshScheduler};
pub use service::AuthService;
pub use state::AuthStateHandle;
