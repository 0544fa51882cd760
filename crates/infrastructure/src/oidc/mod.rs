//! OIDC wire protocol

mod client;

pub use client::{GrantError, OidcHttpClient};
