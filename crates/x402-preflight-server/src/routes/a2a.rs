//! Thin JSON-RPC 2.0 agent endpoint.
//!
//! Payment for chargeable methods is settled by the middleware before this
//! handler runs. Tasks are not persisted, so task lookups always miss.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::A2A_PATH;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const TASK_NOT_FOUND: i64 = -32001;

const AGENT_REPLY: &str = "Hello, World!";

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

fn rpc_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}

fn agent_message(params: &Value) -> Value {
    let context_id = params
        .pointer("/message/contextId")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    json!({
        "kind": "message",
        "messageId": uuid::Uuid::new_v4().to_string(),
        "role": "agent",
        "parts": [{ "kind": "text", "text": AGENT_REPLY }],
        "contextId": context_id,
    })
}

/// Dispatch one JSON-RPC request.
pub fn dispatch(body: &[u8]) -> Value {
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => return rpc_error(Value::Null, PARSE_ERROR, "Parse error"),
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: RpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(_) => return rpc_error(id, INVALID_REQUEST, "Invalid Request"),
    };

    match request.method.as_str() {
        "message/send" | "message/stream" => rpc_result(request.id, agent_message(&request.params)),
        "tasks/get" | "tasks/cancel" => rpc_error(request.id, TASK_NOT_FOUND, "Task not found"),
        other => {
            tracing::debug!(rpc_method = other, "unknown JSON-RPC method");
            rpc_error(request.id, METHOD_NOT_FOUND, "Method not found")
        }
    }
}

/// POST /a2a
pub async fn a2a(body: web::Bytes) -> HttpResponse {
    HttpResponse::Ok().json(dispatch(&body))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route(A2A_PATH, web::post().to(a2a));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_send_replies_with_agent_message() {
        let reply = dispatch(
            br#"{"jsonrpc":"2.0","id":7,"method":"message/send","params":{"message":{"contextId":"ctx-1"}}}"#,
        );
        assert_eq!(reply["id"], 7);
        assert_eq!(reply["result"]["kind"], "message");
        assert_eq!(reply["result"]["role"], "agent");
        assert_eq!(reply["result"]["contextId"], "ctx-1");
        assert_eq!(reply["result"]["parts"][0]["text"], AGENT_REPLY);
    }

    #[test]
    fn test_task_queries_miss() {
        let reply = dispatch(br#"{"jsonrpc":"2.0","id":"a","method":"tasks/get","params":{"id":"t"}}"#);
        assert_eq!(reply["error"]["code"], TASK_NOT_FOUND);
        assert_eq!(reply["id"], "a");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(dispatch(b"{oops")["error"]["code"], PARSE_ERROR);
        assert_eq!(
            dispatch(br#"{"jsonrpc":"2.0","id":1,"method":42}"#)["error"]["code"],
            INVALID_REQUEST
        );
        assert_eq!(
            dispatch(br#"{"jsonrpc":"2.0","id":1,"method":"agent/dance"}"#)["error"]["code"],
            METHOD_NOT_FOUND
        );
    }
}
