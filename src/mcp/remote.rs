//! Client for a remote peer speaking the same tool-call protocol.
//!
//! [`RemoteDelegate`] never raises to its caller: listing degrades to an empty
//! list and invocation degrades to a `{"error": "..."}` result, so call sites
//! can inspect the payload and fall back to a local tool.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{error, warn};
use url::Url;

use crate::mcp::registry::ToolRegistry;
use crate::mcp::types::{ErrorObject, RequestEnvelope};

pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("MCP call failed: {status}")]
    Status { status: u16, body: String },

    #[error("remote error {code}: {message}")]
    Rpc { code: i32, message: String },
}

#[derive(Debug, Clone)]
pub struct RemoteDelegate {
    endpoint: Url,
    http: reqwest::Client,
    list_timeout: Duration,
    call_timeout: Duration,
    next_id: Arc<AtomicU64>,
}

impl RemoteDelegate {
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self, RemoteError> {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    /// Create a delegate with a custom reqwest client.
    pub fn with_client(endpoint: impl AsRef<str>, http: reqwest::Client) -> Result<Self, RemoteError> {
        Ok(Self {
            endpoint: Url::parse(endpoint.as_ref())?,
            http,
            list_timeout: DEFAULT_LIST_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    #[must_use]
    pub fn with_timeouts(mut self, list: Duration, call: Duration) -> Self {
        self.list_timeout = list;
        self.call_timeout = call;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `<endpoint>/tools`, keeping the endpoint's query string.
    pub fn tools_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        let path = format!("{}/tools", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url
    }

    /// Tool descriptors advertised by the remote. Empty if it is unreachable
    /// or answers with a non-success status.
    pub async fn list_remote_tools(&self) -> Vec<Value> {
        match self.try_list_tools().await {
            Ok(tools) => tools,
            Err(RemoteError::Status { status, .. }) => {
                warn!(name: "mcp.remote.list.status", status, "MCP server returned non-success status");
                Vec::new()
            }
            Err(e) => {
                error!(name: "mcp.remote.list.failed", error = %e, "Failed to get tools from MCP server");
                Vec::new()
            }
        }
    }

    async fn try_list_tools(&self) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .http
            .get(self.tools_url())
            .timeout(self.list_timeout)
            .send()
            .await?;
        let body: Value = Self::check_status(response).await?.json().await?;

        Ok(body
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Invoke `tool/call` on the remote and return its `result`.
    ///
    /// Any failure comes back as `{"error": "<message>"}`.
    pub async fn invoke(&self, tool_name: &str, params: Value) -> Value {
        match self.try_invoke(tool_name, params).await {
            Ok(result) => result,
            Err(e) => {
                if let RemoteError::Status { status, body } = &e {
                    error!(name: "mcp.remote.call.status", tool = %tool_name, status, body = %body, "MCP call failed");
                } else {
                    error!(name: "mcp.remote.call.failed", tool = %tool_name, error = %e, "Error calling MCP tool");
                }
                json!({ "error": e.to_string() })
            }
        }
    }

    async fn try_invoke(&self, tool_name: &str, params: Value) -> Result<Value, RemoteError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RequestEnvelope::new(
            Some(json!(id)),
            "tool/call",
            Some(json!({ "name": tool_name, "arguments": params })),
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .timeout(self.call_timeout)
            .send()
            .await?;
        let mut body: Value = Self::check_status(response).await?.json().await?;

        // Peers are not held to strict envelopes: a missing `result` reads as `{}`.
        if let Some(result) = body.get_mut("result").map(Value::take) {
            return Ok(result);
        }
        match body.get("error").cloned().map(serde_json::from_value::<ErrorObject>) {
            Some(Ok(err)) => Err(RemoteError::Rpc {
                code: err.code,
                message: err.message,
            }),
            Some(Err(_)) | None => Ok(Value::Object(Map::new())),
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Search through the remote's advanced search tool.
    pub async fn search_advanced(&self, query: &str, extra: Map<String, Value>) -> Value {
        let mut params = Map::new();
        params.insert(
            "what_is_your_intent".into(),
            json!("Search for information using Tavily Expert MCP"),
        );
        params.insert("query".into(), json!(query));
        params.extend(extra);
        self.invoke("tavily_search_tool", Value::Object(params)).await
    }

    /// Extract page content through the remote's advanced extraction tool.
    pub async fn extract_advanced(&self, urls: &[String], extra: Map<String, Value>) -> Value {
        let mut params = Map::new();
        params.insert(
            "what_is_your_intent".into(),
            json!("Extract content using Tavily Expert MCP"),
        );
        params.insert("urls".into(), json!(urls));
        params.extend(extra);
        self.invoke("tavily_extract_tool", Value::Object(params)).await
    }
}

/// Whether a delegate result carries an error indication.
pub fn is_error_result(result: &Value) -> bool {
    result.get("error").is_some_and(|e| !e.is_null())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Remote,
    Local,
}

#[derive(Debug, Clone, Serialize)]
pub struct FallbackOutcome {
    pub source: ResultSource,
    pub result: Value,
}

/// Try the remote first; on any error indication (or no remote at all),
/// run the local tool instead.
pub async fn invoke_with_fallback<F, Fut>(
    remote: Option<&RemoteDelegate>,
    remote_call: F,
    registry: &ToolRegistry,
    local_tool: &str,
    local_params: Value,
) -> anyhow::Result<FallbackOutcome>
where
    F: FnOnce(RemoteDelegate) -> Fut,
    Fut: Future<Output = Value>,
{
    if let Some(remote) = remote {
        let result = remote_call(remote.clone()).await;
        if !is_error_result(&result) {
            return Ok(FallbackOutcome {
                source: ResultSource::Remote,
                result,
            });
        }
        warn!(
            name: "mcp.remote.fallback",
            tool = %local_tool,
            error = %result["error"],
            "Remote delegate failed, falling back to local tool"
        );
    }

    let tool = registry
        .get(local_tool)
        .ok_or_else(|| anyhow::anyhow!("unknown tool: {local_tool}"))?;
    let result = tool.call(local_params).await?;
    Ok(FallbackOutcome {
        source: ResultSource::Local,
        result,
    })
}
