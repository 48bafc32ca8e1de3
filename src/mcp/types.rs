//! Wire envelopes for the tool-dispatch protocol.
//!
//! Both transports carry one UTF-8 JSON object per message:
//!
//! ```json
//! {"jsonrpc":"2.0","id":1,"method":"ping"}
//! {"jsonrpc":"2.0","id":1,"result":{"pong":true,"timestamp":"..."}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version tag stamped on every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Error codes used in [`ErrorObject::code`].
pub mod codes {
    /// Bytes were not valid JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// JSON that is not a request envelope.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Unknown method, or `tool/call` naming an unregistered tool.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// A tool handler failed, or the dispatcher hit an unexpected condition.
    pub const INTERNAL_ERROR: i32 = -32603;
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Keeps an explicit `"id": null` as `Some(Value::Null)`; only a missing
/// field (via `#[serde(default)]`) is `None`.
fn present_id<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// An inbound request. `id` is absent for notifications; an explicit `null`
/// id is kept and echoed back as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(
        default,
        deserialize_with = "present_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestEnvelope {
    pub fn new(id: Option<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Params as a mapping. Absent or non-object params read as empty.
    pub fn params_object(&self) -> Map<String, Value> {
        match &self.params {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Decode one envelope from a text frame or request body.
    ///
    /// The `id` is recovered whenever the input is a JSON object, so that even
    /// an invalid request can be answered with a correlated error.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: Value = serde_json::from_slice(bytes).map_err(DecodeError::Parse)?;

        let Value::Object(ref obj) = raw else {
            return Err(DecodeError::Invalid {
                id: None,
                reason: "request must be a JSON object".to_string(),
            });
        };
        let id = obj.get("id").cloned();

        serde_json::from_value(raw).map_err(|e| DecodeError::Invalid {
            id,
            reason: e.to_string(),
        })
    }
}

/// Why an inbound frame could not be turned into a [`RequestEnvelope`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("parse error: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("invalid request: {reason}")]
    Invalid { id: Option<Value>, reason: String },
}

impl DecodeError {
    /// The structured reply sent back instead of dispatching.
    pub fn into_response(self) -> ResponseEnvelope {
        match self {
            Self::Parse(e) => ResponseEnvelope::failure(None, ErrorObject::parse_error(&e)),
            Self::Invalid { id, reason } => {
                ResponseEnvelope::failure(id, ErrorObject::invalid_request(reason))
            }
        }
    }
}

/// Exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorObject),
}

/// An outbound response, or an unsolicited server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub jsonrpc: String,
    #[serde(
        default,
        deserialize_with = "present_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ResponseEnvelope {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn failure(id: Option<Value>, error: ErrorObject) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(v) => Some(v),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorObject> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }
}

/// Protocol-level error carried in a [`ResponseEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method '{method}' not found"))
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Tool '{name}' not found"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    pub fn parse_error(err: &serde_json::Error) -> Self {
        Self::new(codes::PARSE_ERROR, format!("Parse error: {err}"))
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, format!("Invalid request: {}", reason.into()))
    }
}

/// One entry of a `tool/list` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_without_version_or_params() {
        let req = RequestEnvelope::decode(br#"{"id":2,"method":"tool/call"}"#).unwrap();
        assert_eq!(req.jsonrpc, "2.0");
        assert_eq!(req.id, Some(json!(2)));
        assert!(req.params_object().is_empty());
    }

    #[test]
    fn test_success_serializes_result_only() {
        let resp = ResponseEnvelope::success(Some(json!("abc")), json!({"ok": true}));
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            v,
            json!({"jsonrpc": "2.0", "id": "abc", "result": {"ok": true}})
        );
    }

    #[test]
    fn test_failure_serializes_error_only() {
        let resp = ResponseEnvelope::failure(None, ErrorObject::method_not_found("bogus"));
        let v = serde_json::to_value(&resp).unwrap();
        assert!(v.get("result").is_none());
        assert!(v.get("id").is_none());
        assert_eq!(v["error"]["code"], json!(-32601));
        assert_eq!(v["error"]["message"], json!("Method 'bogus' not found"));
    }

    #[test]
    fn test_response_deserializes_outcome() {
        let resp: ResponseEnvelope =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"error":{"code":-32603,"message":"boom"}}"#)
                .unwrap();
        assert_eq!(resp.error().map(|e| e.code), Some(codes::INTERNAL_ERROR));
        assert!(resp.result().is_none());
    }

    #[test]
    fn test_decode_garbage_is_parse_error() {
        let err = RequestEnvelope::decode(b"{not json").unwrap_err();
        let resp = err.into_response();
        assert_eq!(resp.error().unwrap().code, codes::PARSE_ERROR);
        assert_eq!(resp.id, None);
    }

    #[test]
    fn test_decode_missing_method_keeps_id() {
        let err = RequestEnvelope::decode(br#"{"jsonrpc":"2.0","id":9}"#).unwrap_err();
        let resp = err.into_response();
        assert_eq!(resp.error().unwrap().code, codes::INVALID_REQUEST);
        assert_eq!(resp.id, Some(json!(9)));
    }

    #[test]
    fn test_null_id_is_distinct_from_absent() {
        let req = RequestEnvelope::decode(br#"{"id":null,"method":"ping"}"#).unwrap();
        assert_eq!(req.id, Some(Value::Null));
        let v = serde_json::to_value(ResponseEnvelope::success(req.id, json!({}))).unwrap();
        assert_eq!(v.get("id"), Some(&Value::Null));

        let req = RequestEnvelope::decode(br#"{"method":"ping"}"#).unwrap();
        assert_eq!(req.id, None);

        let err = RequestEnvelope::decode(br#"{"id":null}"#).unwrap_err();
        assert_eq!(err.into_response().id, Some(Value::Null));
    }

    #[test]
    fn test_decode_non_object() {
        let err = RequestEnvelope::decode(b"[1,2]").unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { id: None, .. }));
    }
}
