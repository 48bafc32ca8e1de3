//! Method routing.
//!
//! [`ProtocolDispatcher`] owns the method table:
//!
//! | method       | result                                             |
//! |--------------|----------------------------------------------------|
//! | `initialize` | `{capabilities: {tools, features}, version}`       |
//! | `tool/list`  | `{tools: [{name, description, parameters}]}`       |
//! | `tool/call`  | whatever the named tool returns                    |
//! | `ping`       | `{pong: true, timestamp}`                          |
//!
//! Anything else is `METHOD_NOT_FOUND`. Tool failures never escape the
//! dispatcher; they become `INTERNAL_ERROR` responses.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use serde_json::{Map, Value, json};
use tracing::{debug, error};

use crate::mcp::registry::ToolRegistry;
use crate::mcp::types::{ErrorObject, RequestEnvelope, ResponseEnvelope};
use crate::session::SessionStore;

/// Capability list advertised by `initialize` when none is configured.
pub const DEFAULT_FEATURES: [&str; 4] = ["search", "extract", "ai_skills", "session_storage"];

/// Server version reported by `initialize` when none is configured.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Static description of this server, reported by `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub version: String,
    pub features: Vec<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            features: DEFAULT_FEATURES.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Method<'a> {
    Initialize,
    ToolList,
    ToolCall,
    Ping,
    Unknown(&'a str),
}

impl<'a> Method<'a> {
    fn parse(method: &'a str) -> Self {
        match method {
            "initialize" => Self::Initialize,
            "tool/list" => Self::ToolList,
            "tool/call" => Self::ToolCall,
            "ping" => Self::Ping,
            other => Self::Unknown(other),
        }
    }
}

/// Routes request envelopes to the tool registry.
///
/// Cheap to clone; the registry, session store and server info are shared.
#[derive(Debug, Clone)]
pub struct ProtocolDispatcher {
    registry: ToolRegistry,
    sessions: SessionStore,
    info: Arc<ServerInfo>,
}

impl ProtocolDispatcher {
    pub fn new(registry: ToolRegistry, sessions: SessionStore, info: ServerInfo) -> Self {
        Self {
            registry,
            sessions,
            info: Arc::new(info),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Decode one raw frame and dispatch it.
    ///
    /// Malformed input is answered with a `PARSE_ERROR` / `INVALID_REQUEST`
    /// envelope rather than dispatched.
    pub async fn handle_raw(&self, bytes: &[u8]) -> ResponseEnvelope {
        match RequestEnvelope::decode(bytes) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                tracing::warn!(name: "mcp.request.malformed", error = %e, "Malformed request envelope");
                e.into_response()
            }
        }
    }

    /// Produce the response for one request. The request `id` is echoed
    /// verbatim, including its absence.
    pub async fn dispatch(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let id = request.id.clone();
        debug!(name: "mcp.request", method = %request.method, id = ?id, "Dispatching request");

        let outcome = match Method::parse(&request.method) {
            Method::Initialize => Ok(self.initialize()),
            Method::ToolList => Ok(self.tool_list()),
            Method::ToolCall => self.tool_call(request.params_object()).await,
            Method::Ping => Ok(ping()),
            Method::Unknown(method) => Err(ErrorObject::method_not_found(method)),
        };

        match outcome {
            Ok(result) => ResponseEnvelope::success(id, result),
            Err(err) => ResponseEnvelope::failure(id, err),
        }
    }

    fn initialize(&self) -> Value {
        json!({
            "capabilities": {
                "tools": self.registry.names(),
                "features": self.info.features,
            },
            "version": self.info.version,
        })
    }

    fn tool_list(&self) -> Value {
        json!({ "tools": self.registry.list() })
    }

    async fn tool_call(&self, params: Map<String, Value>) -> Result<Value, ErrorObject> {
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        let arguments = params
            .get("arguments")
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let Some(tool) = self.registry.get(name) else {
            return Err(ErrorObject::tool_not_found(name));
        };

        match AssertUnwindSafe(tool.call(arguments)).catch_unwind().await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                error!(name: "mcp.tool.failed", tool = %name, error = %format!("{e:#}"), "Tool invocation failed");
                // Only the outermost message crosses the wire; the chain stays in the log.
                Err(ErrorObject::internal(e.to_string()))
            }
            Err(_) => {
                error!(name: "mcp.tool.panicked", tool = %name, "Tool invocation panicked");
                Err(ErrorObject::internal(format!("Tool '{name}' panicked")))
            }
        }
    }
}

fn ping() -> Value {
    json!({ "pong": true, "timestamp": Utc::now().to_rfc3339() })
}
