//! JSON-RPC dispatch for the tool endpoint.
//!
//! Both transports funnel every inbound message through [`dispatch`]; they only
//! differ in how the response travels back.

use roster_orchestrator::mcp::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};
use roster_orchestrator::mcp::{JsonRpcError, JsonRpcMessage};
use roster_tools::{ToolError, ToolRegistry};
use serde_json::{json, Value};
use tracing::{debug, error};

pub const SERVER_NAME: &str = "roster-tools";

/// Why an inbound body could not be turned into a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    NotJson,
    NotAMessage,
}

impl DecodeFailure {
    pub fn message(self) -> &'static str {
        match self {
            Self::NotJson => "Parse error",
            Self::NotAMessage => "Invalid Request",
        }
    }

    pub fn to_failure(self) -> JsonRpcMessage {
        let code = match self {
            Self::NotJson => PARSE_ERROR,
            Self::NotAMessage => INVALID_REQUEST,
        };
        JsonRpcMessage::failure(None, JsonRpcError::new(code, self.message()))
    }
}

pub fn decode_message(body: &[u8]) -> Result<JsonRpcMessage, DecodeFailure> {
    let value: Value = serde_json::from_slice(body).map_err(|_| DecodeFailure::NotJson)?;
    if !value.is_object() {
        return Err(DecodeFailure::NotAMessage);
    }
    serde_json::from_value(value).map_err(|_| DecodeFailure::NotAMessage)
}

/// Handle one message; `None` means nothing goes back to the peer.
pub async fn dispatch(tools: &ToolRegistry, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
    if message.is_response() {
        debug!("ignoring response sent to the tool endpoint");
        return None;
    }

    if message.jsonrpc != JSONRPC_VERSION {
        return Some(JsonRpcMessage::failure(
            message.id,
            JsonRpcError::new(INVALID_REQUEST, "Invalid Request"),
        ));
    }

    let Some(method) = message.method.as_deref() else {
        return Some(JsonRpcMessage::failure(
            message.id,
            JsonRpcError::new(INVALID_REQUEST, "Invalid Request"),
        ));
    };

    let Some(id) = message.id.clone() else {
        debug!(method, "notification received");
        return None;
    };

    debug!(method, id = %id, "request received");
    let outcome = match method {
        "initialize" => Ok(initialize_result()),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": tools.descriptors() })),
        "tools/call" => call_tool(tools, message.params.as_ref()).await,
        other => Err(JsonRpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        )),
    };

    Some(match outcome {
        Ok(result) => JsonRpcMessage::success(id, result),
        Err(error) => JsonRpcMessage::failure(Some(id), error),
    })
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

async fn call_tool(tools: &ToolRegistry, params: Option<&Value>) -> Result<Value, JsonRpcError> {
    let params = params.and_then(Value::as_object);
    let Some(name) = params
        .and_then(|params| params.get("name"))
        .and_then(Value::as_str)
    else {
        return Err(JsonRpcError::new(
            INVALID_PARAMS,
            "tools/call requires a string `name`",
        ));
    };
    let arguments = params
        .and_then(|params| params.get("arguments"))
        .cloned()
        .unwrap_or(Value::Null);

    match tools.call(name, &arguments).await {
        Ok(output) => serde_json::to_value(output).map_err(|err| {
            error!(tool = name, error = %err, "failed to encode tool output");
            JsonRpcError::new(INTERNAL_ERROR, "failed to encode tool output")
        }),
        Err(err @ (ToolError::UnknownTool(_) | ToolError::InvalidArguments { .. })) => {
            Err(JsonRpcError::new(INVALID_PARAMS, err.to_string()))
        }
        Err(ToolError::Store(err)) => {
            error!(tool = name, error = ?err, "tool failed against the store");
            Err(JsonRpcError::new(INTERNAL_ERROR, err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_separates_bad_json_from_bad_shape() {
        assert_eq!(decode_message(b"{not json"), Err(DecodeFailure::NotJson));
        assert_eq!(decode_message(b"[1,2]"), Err(DecodeFailure::NotAMessage));
        assert_eq!(
            decode_message(br#"{"jsonrpc":"2.0","id":"x","method":7}"#),
            Err(DecodeFailure::NotAMessage)
        );

        let message = decode_message(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
            .expect("valid request");
        assert_eq!(message.method.as_deref(), Some("ping"));
    }

    #[test]
    fn parse_failure_carries_null_id() {
        let response = DecodeFailure::NotJson.to_failure();
        let value = serde_json::to_value(response).expect("serialize");
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], PARSE_ERROR);
    }
}
