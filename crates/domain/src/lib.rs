//! Warden Domain - Core session types
//!
//! This crate defines the domain model for the Warden authentication
//! session manager. All types here are pure Rust with no I/O dependencies;
//! anything time-dependent takes the current instant as a parameter.

pub mod config;
pub mod error;
pub mod profile;
pub mod route;
pub mod state;
pub mod token;

pub use config::{Endpoints, ProviderConfig, ProviderType};
pub use error::{AuthError, AuthResult};
pub use profile::UserProfile;
pub use route::{NavigationDecision, NavigationRequest, Route, RouteTable};
pub use state::{AuthState, ProfileLoadStatus};
pub use token::{RealmAccess, StoredSession, TokenClaims, TokenSet, decode_claims};
