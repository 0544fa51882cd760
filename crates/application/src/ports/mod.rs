//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the session manager's core and
//! external systems. Each port is a trait implemented by an adapter in the
//! infrastructure layer, or by a test double.

mod clock;
mod http;
mod session_store;
mod sleep;

pub use clock::Clock;
pub use http::{HttpClientError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use session_store::{SessionStore, SessionStoreError};
pub use sleep::Sleeper;
