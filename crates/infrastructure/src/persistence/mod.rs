//! Durable session persistence

mod session_store;

pub use session_store::{FileSessionStore, MemorySessionStore};
