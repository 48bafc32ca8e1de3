#![allow(dead_code)]

use std::sync::Arc;

use axum::{Json, Router, extract::Query, http::StatusCode, routing::get, routing::post};
use axum_test::TestServer;
use serde_json::{Value, json};
use urs_mcp::config::{AppConfig, ProtocolConfig, RemoteConfig, ServerConfig, SessionConfig};
use urs_mcp::server::{build_router, build_state};

pub fn config(remote_url: Option<String>) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            max_body_bytes: 1024 * 1024,
        },
        protocol: ProtocolConfig {
            version: "1.0.0".into(),
            features: vec!["search".into(), "extract".into()],
        },
        remote: RemoteConfig {
            url: remote_url,
            list_timeout_secs: 2,
            call_timeout_secs: 2,
        },
        sessions: SessionConfig {
            idle_timeout_secs: None,
            sweep_interval_secs: 60,
        },
    }
}

pub fn test_server(remote_url: Option<String>) -> TestServer {
    let state = build_state(Arc::new(config(remote_url))).expect("Failed to build state");
    TestServer::new(build_router(state)).expect("Failed to start test server")
}

/// In-process remote peer speaking the tool-call protocol.
///
/// - `POST /rpc`: echoes the call as `result`; tool `fail` answers with an
///   error object, tool `empty` with neither result nor error.
/// - `GET /rpc/tools`: two tools, plus the query string it saw.
/// - `POST /down`, `GET /down/tools`: always 500.
pub async fn spawn_peer() -> String {
    async fn rpc(Json(req): Json<Value>) -> Json<Value> {
        let name = req["params"]["name"].as_str().unwrap_or_default().to_string();
        let body = match name.as_str() {
            "fail" => json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "error": { "code": -32603, "message": "remote exploded" }
            }),
            "empty" => json!({ "jsonrpc": "2.0", "id": req["id"] }),
            _ => json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "result": {
                    "tool": name,
                    "arguments": req["params"]["arguments"],
                    "method": req["method"],
                }
            }),
        };
        Json(body)
    }

    async fn tools(Query(query): Query<std::collections::HashMap<String, String>>) -> Json<Value> {
        Json(json!({
            "tools": [
                { "name": "tavily_search_tool", "description": "Search" },
                { "name": "tavily_extract_tool", "description": "Extract" }
            ],
            "query": query,
        }))
    }

    async fn down() -> (StatusCode, &'static str) {
        (StatusCode::INTERNAL_SERVER_ERROR, "upstream down")
    }

    let app = Router::new()
        .route("/rpc", post(rpc))
        .route("/rpc/tools", get(tools))
        .route("/down", post(down))
        .route("/down/tools", get(down));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
