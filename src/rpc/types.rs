//! JSON-RPC 2.0 frame types.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Errors surfaced to a caller awaiting an RPC response.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The remote peer answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The connection went away while the request was pending.
    #[error("Connection is closed ({0}).")]
    Closed(String),

    /// The outbound channel is gone; nothing can be written anymore.
    #[error("connection is not writable")]
    NotWritable,
}

/// JSON-RPC error object as carried in an `error` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Method not found (JSON-RPC 2.0 reserved code).
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Internal error (JSON-RPC 2.0 reserved code); used for handler failures.
pub const INTERNAL_ERROR: i64 = -32603;

/// A classified inbound frame.
///
/// Classification mirrors the wire shape: a `method` field makes it a
/// request (a missing `id` makes it an inbound notification), anything
/// else with an `id` is a response to one of our pending requests.
#[derive(Debug, Clone)]
pub enum Frame {
    Request {
        id: Option<Value>,
        method: String,
        params: Value,
    },
    Response {
        id: Value,
        result: Option<Value>,
        error: Option<ErrorObject>,
    },
}

impl Frame {
    /// Parse and classify one raw text frame.
    pub fn parse(raw: &str) -> anyhow::Result<Frame> {
        let value: Value = serde_json::from_str(raw)?;

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            return Ok(Frame::Request {
                id: value.get("id").filter(|id| !id.is_null()).cloned(),
                method: method.to_string(),
                params: value.get("params").cloned().unwrap_or(Value::Null),
            });
        }

        if let Some(id) = value.get("id").filter(|id| !id.is_null()) {
            let error = match value.get("error") {
                Some(err) => Some(serde_json::from_value(err.clone())?),
                None => None,
            };
            return Ok(Frame::Response {
                id: id.clone(),
                result: value.get("result").cloned(),
                error,
            });
        }

        anyhow::bail!("frame is neither a request nor a response")
    }
}

/// Serialize an outbound request frame.
pub fn request_frame(id: &str, method: &str, params: &Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

/// Serialize an outbound notification frame (no id, no response expected).
pub fn notification_frame(method: &str, params: &Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
    .to_string()
}

/// Serialize a success response frame echoing the request id.
pub fn response_frame(id: &Value, result: &Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
    .to_string()
}

/// Serialize an error response frame echoing the request id.
pub fn error_frame(id: &Value, code: i64, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let frame = Frame::parse(r#"{"jsonrpc":"2.0","id":7,"method":"getMessages","params":{"threadId":"t1"}}"#)
            .unwrap();
        match frame {
            Frame::Request { id, method, params } => {
                assert_eq!(id, Some(json!(7)));
                assert_eq!(method, "getMessages");
                assert_eq!(params["threadId"], "t1");
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_notification_has_no_id() {
        let frame = Frame::parse(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        match frame {
            Frame::Request { id, method, .. } => {
                assert!(id.is_none());
                assert_eq!(method, "ping");
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_success_response() {
        let frame =
            Frame::parse(r#"{"jsonrpc":"2.0","id":"abc","result":[{"key":"apiKey","value":"X"}]}"#)
                .unwrap();
        match frame {
            Frame::Response { id, result, error } => {
                assert_eq!(id, json!("abc"));
                assert!(error.is_none());
                assert_eq!(result.unwrap()[0]["value"], "X");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let frame = Frame::parse(
            r#"{"jsonrpc":"2.0","id":"abc","error":{"code":-32601,"message":"not found"}}"#,
        )
        .unwrap();
        match frame {
            Frame::Response { error, .. } => {
                let error = error.unwrap();
                assert_eq!(error.code, METHOD_NOT_FOUND);
                assert_eq!(error.message, "not found");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Frame::parse("not json").is_err());
        assert!(Frame::parse(r#"{"jsonrpc":"2.0"}"#).is_err());
    }

    #[test]
    fn test_response_frame_echoes_id() {
        let raw = response_frame(&json!(42), &json!({"ok":true}));
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["id"], 42);
        assert_eq!(value["result"]["ok"], true);
    }
}
