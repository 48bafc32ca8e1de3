//! Tool-dispatch protocol engine.
//!
//! Requests arrive either over a persistent WebSocket ([`connection`]) or as
//! a single HTTP body ([`gateway`]); both go through the same
//! [`dispatcher::ProtocolDispatcher`], which routes to the
//! [`registry::ToolRegistry`].
//!
//! ```text
//! envelope -> ConnectionManager | StatelessGateway
//!          -> ProtocolDispatcher
//!          -> ToolRegistry (built-in tools, SessionStore) | RemoteDelegate
//!          -> envelope
//! ```
//!
//! # Wire format
//!
//! ```json
//! {"jsonrpc":"2.0","id":2,"method":"tool/call",
//!  "params":{"name":"store","arguments":{"session_id":"abc","key":"x","value":42}}}
//! ```

pub mod connection;
pub mod dispatcher;
pub mod gateway;
pub mod registry;
pub mod remote;
pub mod types;

pub use connection::{CloseReason, Connection, ConnectionManager, ConnectionState};
pub use dispatcher::{ProtocolDispatcher, ServerInfo};
pub use gateway::StatelessGateway;
pub use registry::{FnTool, NativeTool, RegistryError, ToolRegistry};
pub use remote::RemoteDelegate;
pub use types::{ErrorObject, RequestEnvelope, ResponseEnvelope, ToolDescriptor};
