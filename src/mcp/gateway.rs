//! Stateless single-shot entry point.

use crate::mcp::dispatcher::ProtocolDispatcher;
use crate::mcp::types::{RequestEnvelope, ResponseEnvelope};

/// One request in, one response out. No connection registration and no
/// state beyond the call itself.
#[derive(Debug, Clone)]
pub struct StatelessGateway {
    dispatcher: ProtocolDispatcher,
}

impl StatelessGateway {
    pub fn new(dispatcher: ProtocolDispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn dispatch(&self, request: RequestEnvelope) -> ResponseEnvelope {
        self.dispatcher.dispatch(request).await
    }

    /// Decode a raw request body and dispatch it. A malformed body gets the
    /// same structured error a persistent connection would send.
    pub async fn handle(&self, body: &[u8]) -> ResponseEnvelope {
        self.dispatcher.handle_raw(body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::dispatcher::ServerInfo;
    use crate::mcp::registry::ToolRegistry;
    use crate::mcp::types::codes;
    use crate::session::SessionStore;
    use serde_json::json;

    fn gateway() -> StatelessGateway {
        StatelessGateway::new(ProtocolDispatcher::new(
            ToolRegistry::new_empty(),
            SessionStore::new(),
            ServerInfo::default(),
        ))
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let resp = gateway()
            .handle(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
            .await;
        assert_eq!(resp.id, Some(json!(1)));
        assert_eq!(resp.result().unwrap()["pong"], json!(true));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let resp = gateway().handle(b"").await;
        assert_eq!(resp.error().unwrap().code, codes::PARSE_ERROR);

        let resp = gateway().handle(br#"{"id":"x","params":{}}"#).await;
        assert_eq!(resp.error().unwrap().code, codes::INVALID_REQUEST);
        assert_eq!(resp.id, Some(json!("x")));
    }

    #[tokio::test]
    async fn test_typed_dispatch() {
        let req = RequestEnvelope::new(Some(json!(3)), "bogus", None);
        let resp = gateway().dispatch(req).await;
        assert_eq!(resp.error().unwrap().code, codes::METHOD_NOT_FOUND);
    }
}
