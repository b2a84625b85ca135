//! Request/response protocol types for the hot reload sentinel server.
//!
//! Shared by the stdio server and its tests so envelope shapes, method names
//! and tool names cannot drift. Dispatch is over closed enums: an unknown
//! name parses to `None` and the caller answers with a structured error.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

mod tools;

pub use tools::{
    tool_catalog, AtomVerdict, DraftIssueArgs, RecordVerdictArgs, ToolName, WatchFollowArgs,
    DEFAULT_FOLLOW_SECONDS,
};

pub const JSONRPC_VERSION: &str = "2.0";
pub const SERVER_NAME: &str = "hotreload-sentinel";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const SERVER_ERROR: i64 = -32000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Initialized,
    Ping,
    ToolsList,
    ToolsCall,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Method::Initialize),
            "initialized" | "notifications/initialized" => Some(Method::Initialized),
            "ping" => Some(Method::Ping),
            "tools/list" => Some(Method::ToolsList),
            "tools/call" => Some(Method::ToolsCall),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Initialized => "initialized",
            Method::Ping => "ping",
            Method::ToolsList => "tools/list",
            Method::ToolsCall => "tools/call",
        }
    }
}

/// One decoded inbound message.
///
/// `id` is `Some` whenever the key is present, including `"id": null`;
/// messages without the key are notifications and get no reply.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub id: Option<Value>,
    pub method: Option<String>,
    pub params: Value,
}

impl IncomingMessage {
    pub fn from_value(value: Value) -> Self {
        let mut object = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let id = object.remove("id");
        let method = object
            .remove("method")
            .and_then(|value| value.as_str().map(str::to_string));
        let params = object.remove("params").unwrap_or(Value::Null);
        Self { id, method, params }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: Option<&str>) -> Self {
        Self::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {}", method.unwrap_or("")),
        )
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(SERVER_ERROR, message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn from_result(id: Value, result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(value) => Self::ok(id, value),
            Err(err) => Self::error(id, err),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": self.id,
                "error": { "code": SERVER_ERROR, "message": err.to_string() },
            })
        })
    }
}

/// Echoes the caller's version when supported, otherwise the default.
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|version| {
            SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .copied()
                .find(|supported| *supported == version)
        })
        .unwrap_or(DEFAULT_PROTOCOL_VERSION)
}

pub fn initialize_result(params: &Value) -> Value {
    let requested = params.get("protocolVersion").and_then(Value::as_str);
    json!({
        "protocolVersion": negotiate_protocol_version(requested),
        "capabilities": {
            "tools": { "listChanged": false },
            "prompts": { "listChanged": false },
            "resources": { "listChanged": false, "subscribe": false },
        },
        "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
    })
}

/// Wraps tool output as the single text payload every tool returns.
pub fn text_content(text: impl Into<String>) -> Value {
    json!({ "content": [{ "type": "text", "text": text.into() }] })
}
