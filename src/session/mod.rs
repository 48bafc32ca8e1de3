//! Per-session key/value state.
//!
//! Sessions are addressed by a client-supplied (or generated) identifier and
//! outlive any single connection. A session created on one connection is
//! visible to every later request that carries its identifier.
//!
//! # Example
//!
//! ```rust
//! use urs_mcp::session::SessionStore;
//! use serde_json::json;
//!
//! let store = SessionStore::new();
//! store.set("s1", "k", json!("v"));
//!
//! assert_eq!(store.get("s1", "k"), Some(json!("v")));
//! assert_eq!(store.get("s1", "missing"), None);
//! assert_eq!(store.get("unknown", "k"), None);
//! ```

mod store;

pub use store::{Session, SessionStore};
