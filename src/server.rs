use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::config::AppConfig;
use crate::mcp::remote::invoke_with_fallback;
use crate::mcp::{
    ConnectionManager, ProtocolDispatcher, RemoteDelegate, ResponseEnvelope, StatelessGateway,
};
use crate::session::SessionStore;
use crate::tools::builtin_registry;

/// Wire up the registry, dispatcher, transports and optional remote delegate.
pub fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
    let sessions = SessionStore::new();
    let registry = builtin_registry(&sessions)?;
    for name in registry.names() {
        info!(name: "mcp.tool.registered", tool = %name, "Built-in tool registered");
    }

    let dispatcher = ProtocolDispatcher::new(registry, sessions, config.server_info());
    let connections = ConnectionManager::new(dispatcher.clone());
    let gateway = StatelessGateway::new(dispatcher.clone());

    let remote = match config.remote.url.as_deref() {
        Some(url) => {
            let delegate = RemoteDelegate::new(url)?
                .with_timeouts(config.remote.list_timeout(), config.remote.call_timeout());
            info!(name: "mcp.remote.configured", url = %delegate.endpoint(), "Remote MCP delegate configured");
            Some(delegate)
        }
        None => {
            info!(name: "mcp.remote.disabled", "No remote MCP URL configured, delegate routes use local tools");
            None
        }
    };

    Ok(AppState {
        dispatcher,
        connections,
        gateway,
        remote,
        config,
    })
}

pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/mcp/ws", get(mcp_ws))
        .route("/mcp/call", post(mcp_call))
        .route("/mcp/tools", get(mcp_tools))
        .route("/api/mcp/tools", get(api_remote_tools))
        .route("/api/mcp/call", post(api_remote_call))
        .route("/api/mcp/search", post(api_search))
        .route("/api/mcp/extract", post(api_extract))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = build_state(Arc::clone(&config))?;

    if let Some(idle) = config.sessions.idle_timeout() {
        let sessions = state.dispatcher.sessions().clone();
        let mut interval = tokio::time::interval(config.sessions.sweep_interval());
        info!(
            name: "session.sweeper.started",
            idle_timeout_secs = idle.as_secs(),
            "Idle session eviction enabled"
        );
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                let removed = sessions.cleanup_idle(idle);
                if removed > 0 {
                    debug!(name: "session.sweeper.evicted", removed, "Evicted idle sessions");
                }
            }
        });
    }

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        version = %config.protocol.version,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(name: "server.signal.failed", error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Protocol transports
// ─────────────────────────────────────────────────────────────────────────────

/// GET /mcp/ws - Persistent connection.
async fn mcp_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        state.connections.serve(stream, sink).await;
    })
}

/// POST /mcp/call - One request envelope in, one response envelope out.
async fn mcp_call(State(state): State<AppState>, body: Bytes) -> Json<ResponseEnvelope> {
    Json(state.gateway.handle(&body).await)
}

/// GET /mcp/tools - Built-in tool catalogue.
async fn mcp_tools(State(state): State<AppState>) -> Json<Value> {
    let tools: Vec<Value> = state
        .dispatcher
        .registry()
        .list()
        .into_iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
                "available": true,
            })
        })
        .collect();
    Json(json!({ "tools": tools }))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": state.dispatcher.info().version,
        "timestamp": Utc::now().to_rfc3339(),
        "active_connections": state.connections.active_count(),
        "active_sessions": state.dispatcher.sessions().len(),
        "available_tools": state.dispatcher.registry().names(),
        "remote": {
            "configured": state.remote.is_some(),
            "url": state.remote.as_ref().map(|r| r.endpoint().to_string()),
        },
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote delegate routes
// ─────────────────────────────────────────────────────────────────────────────

fn remote_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "success": false, "error": "MCP client not available" })),
    )
        .into_response()
}

/// GET /api/mcp/tools - Tools advertised by the remote peer.
async fn api_remote_tools(State(state): State<AppState>) -> Response {
    let Some(remote) = &state.remote else {
        return remote_unavailable();
    };
    let tools = remote.list_remote_tools().await;
    Json(json!({
        "success": true,
        "tools": tools,
        "mcp_url": remote.endpoint().as_str(),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct RemoteCallRequest {
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    parameters: Option<Value>,
}

/// POST /api/mcp/call - Invoke a named tool on the remote peer.
async fn api_remote_call(
    State(state): State<AppState>,
    Json(req): Json<RemoteCallRequest>,
) -> Response {
    let Some(remote) = &state.remote else {
        return remote_unavailable();
    };
    let Some(tool_name) = req.tool_name.filter(|n| !n.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "tool_name is required" })),
        )
            .into_response();
    };

    let params = req.parameters.unwrap_or_else(|| Value::Object(Map::new()));
    let result = remote.invoke(&tool_name, params).await;
    Json(json!({
        "success": !crate::mcp::remote::is_error_result(&result),
        "tool_name": tool_name,
        "result": result,
    }))
    .into_response()
}

fn internal_error(e: &anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": format!("{e:#}") })),
    )
        .into_response()
}

/// POST /api/mcp/search - Remote advanced search, local `search` on failure.
async fn api_search(
    State(state): State<AppState>,
    Json(mut body): Json<Map<String, Value>>,
) -> Response {
    let query = body
        .remove("query")
        .and_then(|q| q.as_str().map(str::to_owned))
        .unwrap_or_default();

    let outcome = invoke_with_fallback(
        state.remote.as_ref(),
        |remote| {
            let query = query.clone();
            async move { remote.search_advanced(&query, body).await }
        },
        state.dispatcher.registry(),
        "search",
        json!({ "query": query }),
    )
    .await;

    match outcome {
        Ok(outcome) => Json(json!({
            "success": true,
            "source": outcome.source,
            "query": query,
            "result": outcome.result,
        }))
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

/// POST /api/mcp/extract - Remote advanced extraction, local `extract` on failure.
async fn api_extract(
    State(state): State<AppState>,
    Json(mut body): Json<Map<String, Value>>,
) -> Response {
    let url = body
        .remove("url")
        .and_then(|u| u.as_str().map(str::to_owned))
        .unwrap_or_default();

    let outcome = invoke_with_fallback(
        state.remote.as_ref(),
        |remote| {
            let urls = vec![url.clone()];
            async move { remote.extract_advanced(&urls, body).await }
        },
        state.dispatcher.registry(),
        "extract",
        json!({ "url": url }),
    )
    .await;

    match outcome {
        Ok(outcome) => Json(json!({
            "success": true,
            "source": outcome.source,
            "url": url,
            "result": outcome.result,
        }))
        .into_response(),
        Err(e) => internal_error(&e),
    }
}
