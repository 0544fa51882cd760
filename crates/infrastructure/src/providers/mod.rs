//! Identity-provider variants and their factory

mod factory;
mod keycloak;
mod oidc;

pub use factory::{ProviderDeps, build_auth_service, build_provider};
pub use keycloak::KeycloakProvider;
pub use oidc::{OidcSessionProvider, SessionEvent};
