//! Warden Infrastructure - Adapters and implementations
//!
//! Concrete implementations of the ports defined in the application layer:
//! the system clock and timer, the reqwest transport, the OIDC wire
//! client, the identity-provider variants, and durable session
//! persistence.

pub mod adapters;
pub mod oidc;
pub mod persistence;
pub mod providers;

pub use adapters::{ReqwestTransport, SystemClock, TokioSleeper};
pub use oidc::{GrantError, OidcHttpClient};
pub use persistence::{FileSessionStore, MemorySessionStore};
pub use providers::{
    KeycloakProvider, OidcSessionProvider, ProviderDeps, SessionEvent, build_auth_service,
    build_provider,
};
