mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{Map, Value, json};
use urs_mcp::mcp::RemoteDelegate;
use urs_mcp::mcp::remote::{ResultSource, invoke_with_fallback, is_error_result};
use urs_mcp::session::SessionStore;
use urs_mcp::tools::builtin_registry;

#[tokio::test]
async fn test_invoke_returns_remote_result() {
    let base = common::spawn_peer().await;
    let remote = RemoteDelegate::new(format!("{base}/rpc")).unwrap();

    let result = remote.invoke("summarize", json!({"text": "hi"})).await;
    assert_eq!(result["tool"], "summarize");
    assert_eq!(result["method"], "tool/call");
    assert_eq!(result["arguments"]["text"], "hi");
}

#[tokio::test]
async fn test_invoke_downgrades_failures() {
    let base = common::spawn_peer().await;

    let remote = RemoteDelegate::new(format!("{base}/rpc")).unwrap();
    let result = remote.invoke("fail", json!({})).await;
    assert!(is_error_result(&result));
    assert!(result["error"].as_str().unwrap().contains("remote exploded"));

    let result = remote.invoke("empty", json!({})).await;
    assert_eq!(result, json!({}));

    let down = RemoteDelegate::new(format!("{base}/down")).unwrap();
    let result = down.invoke("search", json!({})).await;
    assert!(is_error_result(&result));
    assert!(result["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_unreachable_remote() {
    let remote = RemoteDelegate::new("http://127.0.0.1:1/rpc")
        .unwrap()
        .with_timeouts(Duration::from_secs(1), Duration::from_secs(1));

    assert!(remote.list_remote_tools().await.is_empty());
    assert!(is_error_result(&remote.invoke("search", json!({})).await));
}

#[tokio::test]
async fn test_list_remote_tools() {
    let base = common::spawn_peer().await;

    let remote = RemoteDelegate::new(format!("{base}/rpc?apiKey=secret")).unwrap();
    let tools = remote.list_remote_tools().await;
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0]["name"], "tavily_search_tool");

    let down = RemoteDelegate::new(format!("{base}/down")).unwrap();
    assert!(down.list_remote_tools().await.is_empty());
}

#[tokio::test]
async fn test_advanced_search_arguments() {
    let base = common::spawn_peer().await;
    let remote = RemoteDelegate::new(format!("{base}/rpc")).unwrap();

    let mut extra = Map::new();
    extra.insert("max_results".into(), json!(3));
    let result = remote.search_advanced("rust", extra).await;

    assert_eq!(result["tool"], "tavily_search_tool");
    assert_eq!(result["arguments"]["query"], "rust");
    assert_eq!(result["arguments"]["max_results"], 3);
    assert!(result["arguments"]["what_is_your_intent"].is_string());

    let result = remote
        .extract_advanced(&["https://example.org".to_string()], Map::new())
        .await;
    assert_eq!(result["tool"], "tavily_extract_tool");
    assert_eq!(result["arguments"]["urls"], json!(["https://example.org"]));
}

#[tokio::test]
async fn test_fallback_to_local() {
    let base = common::spawn_peer().await;
    let registry = builtin_registry(&SessionStore::new()).unwrap();
    let down = RemoteDelegate::new(format!("{base}/down")).unwrap();

    let outcome = invoke_with_fallback(
        Some(&down),
        |remote| async move { remote.search_advanced("rust", Map::new()).await },
        &registry,
        "search",
        json!({"query": "rust"}),
    )
    .await
    .unwrap();
    assert_eq!(outcome.source, ResultSource::Local);
    assert_eq!(outcome.result["type"], "search_result");

    let up = RemoteDelegate::new(format!("{base}/rpc")).unwrap();
    let outcome = invoke_with_fallback(
        Some(&up),
        |remote| async move { remote.search_advanced("rust", Map::new()).await },
        &registry,
        "search",
        json!({"query": "rust"}),
    )
    .await
    .unwrap();
    assert_eq!(outcome.source, ResultSource::Remote);
    assert_eq!(outcome.result["tool"], "tavily_search_tool");
}

#[tokio::test]
async fn test_delegate_routes_with_remote() {
    let base = common::spawn_peer().await;
    let server = common::test_server(Some(format!("{base}/rpc")));

    let body: Value = server.get("/api/mcp/tools").await.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["tools"].as_array().unwrap().len(), 2);

    let resp = server
        .post("/api/mcp/call")
        .json(&json!({"parameters": {}}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = server
        .post("/api/mcp/call")
        .json(&json!({"tool_name": "analyze", "parameters": {"type": "trend"}}))
        .await
        .json();
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["arguments"]["type"], "trend");

    let body: Value = server
        .post("/api/mcp/search")
        .json(&json!({"query": "rust", "search_depth": "advanced"}))
        .await
        .json();
    assert_eq!(body["source"], "remote");
    assert_eq!(body["result"]["arguments"]["search_depth"], "advanced");

    let body: Value = server
        .post("/api/mcp/call")
        .json(&json!({"tool_name": "fail"}))
        .await
        .json();
    assert_eq!(body["success"], false);
    assert!(body["result"]["error"].is_string());
}

#[tokio::test]
async fn test_delegate_routes_fall_back_when_remote_is_down() {
    let base = common::spawn_peer().await;
    let server = common::test_server(Some(format!("{base}/down")));

    let body: Value = server
        .post("/api/mcp/extract")
        .json(&json!({"url": "https://example.org"}))
        .await
        .json();
    assert_eq!(body["source"], "local");
    assert_eq!(body["result"]["type"], "extract_result");
}
