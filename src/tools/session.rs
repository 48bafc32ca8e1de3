use async_trait::async_trait;
use serde_json::{Value, json};

use crate::mcp::registry::NativeTool;
use crate::session::SessionStore;

/// Writes one key into a session, creating the session if needed.
#[derive(Debug)]
pub struct StoreTool {
    sessions: SessionStore,
}

impl StoreTool {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl NativeTool for StoreTool {
    fn name(&self) -> &str {
        "store"
    }

    fn description(&self) -> Option<&str> {
        Some("Store a value under a key in a session. A new session id is generated when none is given.")
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Session to write into. Omit to start a new session."
                },
                "key": { "type": "string" },
                "value": { "description": "Any JSON value." }
            },
            "required": ["key"]
        })
    }

    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let session_id = args["session_id"]
            .as_str()
            .map_or_else(SessionStore::generate_id, str::to_string);
        let key = args["key"].as_str().unwrap_or_default();
        let value = args.get("value").cloned().unwrap_or(Value::Null);

        self.sessions.set(&session_id, key, value);

        Ok(json!({
            "type": "store_result",
            "session_id": session_id,
            "key": key,
            "success": true,
            "timestamp": super::timestamp(),
        }))
    }
}

/// Reads one key from a session. Missing sessions and keys yield `null`.
#[derive(Debug)]
pub struct RetrieveTool {
    sessions: SessionStore,
}

impl RetrieveTool {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl NativeTool for RetrieveTool {
    fn name(&self) -> &str {
        "retrieve"
    }

    fn description(&self) -> Option<&str> {
        Some("Retrieve a value previously stored in a session.")
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": { "type": "string" },
                "key": { "type": "string" }
            },
            "required": ["session_id", "key"]
        })
    }

    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let session_id = args["session_id"].as_str().unwrap_or_default();
        let key = args["key"].as_str().unwrap_or_default();
        let value = self.sessions.get(session_id, key).unwrap_or(Value::Null);

        Ok(json!({
            "type": "retrieve_result",
            "session_id": session_id,
            "key": key,
            "value": value,
            "timestamp": super::timestamp(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_then_retrieve() {
        let sessions = SessionStore::new();
        let store = StoreTool::new(sessions.clone());
        let retrieve = RetrieveTool::new(sessions.clone());

        let stored = store
            .call(json!({"session_id": "abc", "key": "x", "value": 42}))
            .await
            .unwrap();
        assert_eq!(stored["session_id"], "abc");
        assert_eq!(stored["key"], "x");
        assert_eq!(stored["success"], true);

        let got = retrieve
            .call(json!({"session_id": "abc", "key": "x"}))
            .await
            .unwrap();
        assert_eq!(got["value"], 42);
        assert_eq!(got["type"], "retrieve_result");
    }

    #[tokio::test]
    async fn test_store_generates_session_id() {
        let sessions = SessionStore::new();
        let stored = StoreTool::new(sessions.clone())
            .call(json!({"key": "k", "value": "v"}))
            .await
            .unwrap();

        let id = stored["session_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        assert_eq!(sessions.get(id, "k"), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_retrieve_missing_is_null() {
        let retrieve = RetrieveTool::new(SessionStore::new());
        let got = retrieve
            .call(json!({"session_id": "ghost", "key": "x"}))
            .await
            .unwrap();
        assert!(got["value"].is_null());
    }
}
