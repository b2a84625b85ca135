//! Request dispatch and the read/dispatch/write loop.

use std::any::Any;
use std::io::{BufRead, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::{json, Value};
use sentinel_core::CancelToken;
use sentinel_protocol::{
    initialize_result, text_content, tool_catalog, IncomingMessage, Method, Response, RpcError,
    ToolName, METHOD_NOT_FOUND,
};

use super::tools;
use super::transport::{StdioTransport, TransportError};
use crate::commands::AppContext;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

pub struct Server {
    ctx: AppContext,
}

impl Server {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Reply for one message; `None` for notifications.
    pub fn handle(&self, message: IncomingMessage) -> Option<Response> {
        let Some(id) = message.id else {
            tracing::debug!(method = ?message.method, "Notification received");
            return None;
        };

        let method = message.method.as_deref();
        let params = &message.params;
        let result = catch_unwind(AssertUnwindSafe(|| self.dispatch(method, params)))
            .unwrap_or_else(|payload| {
                let detail = panic_message(payload.as_ref());
                tracing::error!(method = ?method, error = %detail, "Handler panicked");
                Err(RpcError::server_error(detail))
            });

        if let Err(err) = &result {
            tracing::warn!(method = ?method, code = err.code, message = %err.message, "Request failed");
        }
        Some(Response::from_result(id, result))
    }

    fn dispatch(&self, method: Option<&str>, params: &Value) -> Result<Value, RpcError> {
        match method.and_then(Method::parse) {
            Some(Method::Initialize) => Ok(initialize_result(params)),
            Some(Method::Initialized) | Some(Method::Ping) => Ok(json!({})),
            Some(Method::ToolsList) => Ok(tool_catalog()),
            Some(Method::ToolsCall) => self.call_tool(params),
            None => Err(RpcError::method_not_found(method)),
        }
    }

    fn call_tool(&self, params: &Value) -> Result<Value, RpcError> {
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        let tool = ToolName::parse(name)
            .ok_or_else(|| RpcError::new(METHOD_NOT_FOUND, format!("Unknown tool: {}", name)))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        tools::call(&self.ctx, tool, arguments).map(text_content)
    }
}

/// Serves until end of input, a fatal I/O error, or cancellation (checked
/// between messages).
pub fn serve<R: BufRead, W: Write>(
    server: &Server,
    transport: &mut StdioTransport<R, W>,
    cancel: &CancelToken,
) -> Result<(), TransportError> {
    while !cancel.is_cancelled() {
        let value = match transport.read_message() {
            Ok(Some(value)) => value,
            Ok(None) => break,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "Skipping unreadable frame");
                continue;
            }
        };

        if let Some(response) = server.handle(IncomingMessage::from_value(value)) {
            transport.write_message(&response.to_value())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_context;
    use sentinel_protocol::SERVER_ERROR;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn request(id: Value, method: &str, params: Value) -> IncomingMessage {
        IncomingMessage::from_value(json!({
            "jsonrpc": "2.0", "id": id, "method": method, "params": params
        }))
    }

    #[test]
    fn initialize_negotiates_version() {
        let temp = tempdir().unwrap();
        let server = Server::new(test_context(temp.path()));

        let response = server
            .handle(request(json!(1), "initialize", json!({ "protocolVersion": "2025-06-18" })))
            .unwrap();

        let value = response.to_value();
        assert_eq!(value["result"]["protocolVersion"], "2025-06-18");
        assert_eq!(value["result"]["serverInfo"]["name"], "hotreload-sentinel");
    }

    #[test]
    fn notifications_get_no_reply() {
        let temp = tempdir().unwrap();
        let server = Server::new(test_context(temp.path()));

        let message = IncomingMessage::from_value(json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }));
        assert!(server.handle(message).is_none());
    }

    #[test]
    fn unknown_method_and_tool() {
        let temp = tempdir().unwrap();
        let server = Server::new(test_context(temp.path()));

        let response = server.handle(request(json!("a"), "resources/list", json!({}))).unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);

        let response = server
            .handle(request(json!(2), "tools/call", json!({ "name": "hr_nope" })))
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
        assert_eq!(error.message, "Unknown tool: hr_nope");
    }

    #[test]
    fn tool_call_wraps_text() {
        let temp = tempdir().unwrap();
        let server = Server::new(test_context(temp.path()));

        let response = server
            .handle(request(json!(3), "tools/call", json!({ "name": "hr_report" })))
            .unwrap();

        let value = response.to_value();
        assert_eq!(value["result"]["content"][0]["type"], "text");
        assert!(value["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("hr_report: status=IDLE"));
    }

    #[test]
    fn tool_errors_become_server_errors() {
        let temp = tempdir().unwrap();
        let server = Server::new(test_context(temp.path()));

        let response = server
            .handle(request(
                json!(4),
                "tools/call",
                json!({ "name": "hr_record_verdict", "arguments": { "apply_index": 1, "verdicts": {} } }),
            ))
            .unwrap();

        assert_eq!(response.error.unwrap().code, SERVER_ERROR);
    }

    #[test]
    fn panic_payloads_are_described() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(5_u8);
        assert_eq!(panic_message(payload.as_ref()), "handler panicked");
    }

    #[test]
    fn serve_answers_in_detected_framing() {
        let temp = tempdir().unwrap();
        let server = Server::new(test_context(temp.path()));
        let body = r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#;
        let input = format!(
            "Content-Length: {}\r\n\r\n{}Content-Length: 5\r\n\r\n{{bad}}",
            body.len(),
            body
        );
        let mut transport = StdioTransport::new(Cursor::new(input.into_bytes()), Vec::new());

        serve(&server, &mut transport, &CancelToken::new()).unwrap();

        let written = String::from_utf8(transport.into_writer()).unwrap();
        assert!(written.starts_with("Content-Length: "), "{}", written);
        assert!(written.ends_with(r#"{"id":9,"jsonrpc":"2.0","result":{}}"#), "{}", written);
    }

    #[test]
    fn serve_stops_when_cancelled() {
        let temp = tempdir().unwrap();
        let server = Server::new(test_context(temp.path()));
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut transport = StdioTransport::new(
            Cursor::new(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n".to_vec()),
            Vec::new(),
        );

        serve(&server, &mut transport, &cancel).unwrap();

        assert!(transport.into_writer().is_empty());
    }
}
