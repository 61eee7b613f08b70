//! Newline-delimited JSON messages exchanged over the daemon socket
//!
//! ```text
//! -> {"id":1,"method":"procedure.call","params":{"path":"echo","input":{"text":"hi"}}}
//! <- {"id":1,"result":{"type":"data","data":{"text":"hi"}}}
//! ```
//!
//! Every failure uses the code `INTERNAL_SERVER_ERROR`; `error.data.kind`
//! carries the finer category.

use crate::error::{DaemonError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use workbench_sdk::RouterError;

pub const METHOD_CALL: &str = "procedure.call";
pub const METHOD_LIST: &str = "procedure.list";
pub const METHOD_STATUS: &str = "daemon.status";

pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";

/// `data.kind` for a line that is not a JSON object
pub const KIND_FRAMING: &str = "framing";
/// `data.kind` for a well-formed object that is not a valid request
pub const KIND_INVALID_REQUEST: &str = "invalid_request";
pub const KIND_UNKNOWN_METHOD: &str = "unknown_method";

/// A request line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn call(id: impl Into<Value>, path: &str, input: Value) -> Self {
        Self {
            id: id.into(),
            method: METHOD_CALL.to_string(),
            params: serde_json::json!({ "path": path, "input": input }),
        }
    }

    pub fn new(id: impl Into<Value>, method: &str) -> Self {
        Self {
            id: id.into(),
            method: method.to_string(),
            params: Value::Null,
        }
    }
}

/// Parameters of `procedure.call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallParams {
    pub path: String,
    #[serde(default)]
    pub input: Value,
}

/// Success payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

/// Failure payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ErrorData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// A response line: exactly one of `result` or `error` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultEnvelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl Response {
    pub fn data(id: Value, data: Value) -> Self {
        Self {
            id,
            result: Some(ResultEnvelope {
                kind: "data".to_string(),
                data,
            }),
            error: None,
        }
    }

    pub fn failure(id: Value, kind: &str, message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorEnvelope {
                code: INTERNAL_SERVER_ERROR.to_string(),
                message: message.into(),
                data: Some(ErrorData {
                    code: INTERNAL_SERVER_ERROR.to_string(),
                    kind: Some(kind.to_string()),
                    stack,
                }),
            }),
        }
    }

    /// Error response for a router failure; the stack is the source chain
    pub fn router_error(id: Value, err: &RouterError) -> Self {
        Self::failure(id, err.kind().as_str(), err.to_string(), Some(err.chain()))
    }

    /// Error response for an unparseable line
    pub fn framing(message: impl Into<String>) -> Self {
        Self::failure(Value::Null, KIND_FRAMING, message, None)
    }

    /// Convert into the payload or a [`DaemonError::Remote`]
    pub fn into_result(self) -> Result<Value> {
        match (self.result, self.error) {
            (Some(result), None) => Ok(result.data),
            (_, Some(error)) => Err(DaemonError::Remote {
                kind: error
                    .data
                    .and_then(|d| d.kind)
                    .unwrap_or_else(|| error.code.clone()),
                message: error.message,
            }),
            (None, None) => Err(DaemonError::Framing(
                "response has neither result nor error".to_string(),
            )),
        }
    }
}

/// `daemon.status` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStatus {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub socket: String,
    pub connections: usize,
}

/// Outcome of decoding one line
#[derive(Debug)]
pub enum Decoded {
    /// Blank line; nothing to answer
    Empty,
    Request(Request),
    /// An object that is not a request; answered with its id
    Invalid { id: Value, message: String },
    /// Not a JSON object; fatal to the connection
    Framing(String),
}

/// Decode one line without its trailing newline
pub fn decode_line(line: &[u8]) -> Decoded {
    let line = trim_line(line);
    if line.is_empty() {
        return Decoded::Empty;
    }
    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => return Decoded::Framing(format!("Invalid JSON: {}", e)),
    };
    let id = match &value {
        Value::Object(map) => map.get("id").cloned().unwrap_or(Value::Null),
        other => {
            return Decoded::Framing(format!("Expected a JSON object, got {}", type_name(other)));
        }
    };
    match serde_json::from_value::<Request>(value) {
        Ok(request) => Decoded::Request(request),
        Err(e) => Decoded::Invalid {
            id,
            message: format!("Invalid request: {}", e),
        },
    }
}

/// Serialize a message as one line, newline included
pub fn encode_line<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn trim_line(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., last] = line {
        if last.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    line
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use workbench_sdk::FieldIssue;

    #[test]
    fn test_data_response_is_exact() -> anyhow::Result<()> {
        let line = encode_line(&Response::data(json!(1), json!({"text": "hi"})))?;
        assert_eq!(
            String::from_utf8(line)?,
            "{\"id\":1,\"result\":{\"type\":\"data\",\"data\":{\"text\":\"hi\"}}}\n"
        );
        Ok(())
    }

    #[test]
    fn test_router_error_envelope() -> anyhow::Result<()> {
        let err = RouterError::validation("echo", FieldIssue::new("text", "is required"));
        let value = serde_json::to_value(Response::router_error(json!("a"), &err))?;
        assert_eq!(value["id"], "a");
        assert_eq!(value["error"]["code"], INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"]["message"], "Invalid input for 'echo': text: is required");
        assert_eq!(value["error"]["data"]["code"], INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"]["data"]["kind"], "validation");
        assert!(value["error"]["data"]["stack"].is_string());
        assert!(value.get("result").is_none());
        Ok(())
    }

    #[test]
    fn test_framing_response_has_null_id() -> anyhow::Result<()> {
        let value = serde_json::to_value(Response::framing("bad"))?;
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["data"]["kind"], KIND_FRAMING);
        Ok(())
    }

    #[test]
    fn test_decode_line() {
        assert!(matches!(decode_line(b"   \r"), Decoded::Empty));
        assert!(matches!(decode_line(b"not json"), Decoded::Framing(_)));
        assert!(matches!(decode_line(b"[1,2]"), Decoded::Framing(_)));

        match decode_line(br#"{"id":7,"params":{}}"#) {
            Decoded::Invalid { id, .. } => assert_eq!(id, json!(7)),
            other => panic!("unexpected: {other:?}"),
        }

        match decode_line(b"{\"id\":1,\"method\":\"procedure.call\",\"params\":{\"path\":\"echo\"}}\r") {
            Decoded::Request(request) => {
                assert_eq!(request.id, json!(1));
                let params: CallParams = serde_json::from_value(request.params).unwrap();
                assert_eq!(params.path, "echo");
                assert_eq!(params.input, Value::Null);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_into_result() {
        let ok = Response::data(json!(1), json!([1]));
        assert_eq!(ok.into_result().unwrap(), json!([1]));

        let err = Response::failure(json!(1), "timeout", "too slow", None)
            .into_result()
            .unwrap_err();
        match err {
            DaemonError::Remote { kind, message } => {
                assert_eq!(kind, "timeout");
                assert_eq!(message, "too slow");
            }
            other => panic!("unexpected: {other}"),
        }
    }
}
