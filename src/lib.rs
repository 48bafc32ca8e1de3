//! Tool-dispatch server
//!
//! Exposes a set of named tools (search, extraction, summarization, analysis,
//! session storage) through a JSON-RPC shaped protocol over two transports: a
//! persistent WebSocket and a stateless HTTP call.
//!
//! # Modules
//!
//! - [`mcp`]: protocol engine (envelopes, dispatcher, registry, connections, remote delegate)
//! - [`session`]: per-session key/value state
//! - [`tools`]: built-in tools
//! - [`server`]: axum router and bootstrap
//! - [`config`]: CLI and layered configuration
//! - [`telemetry`]: logging setup

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod mcp;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod tools;

use std::sync::Arc;

use crate::config::AppConfig;
use mcp::{ConnectionManager, ProtocolDispatcher, RemoteDelegate, StatelessGateway};

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Method routing shared by both transports.
    pub dispatcher: ProtocolDispatcher,
    /// Active persistent connections.
    pub connections: ConnectionManager,
    /// Single-shot HTTP entry point.
    pub gateway: StatelessGateway,
    /// Remote peer for the delegate routes, if one is configured.
    pub remote: Option<RemoteDelegate>,
    pub config: Arc<AppConfig>,
}
