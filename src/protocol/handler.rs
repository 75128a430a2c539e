//! Method dispatcher.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::types::*;
use crate::tools::ToolRegistry;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Routes JSON-RPC requests to protocol methods and registered tools.
///
/// Holds no per-request state; one dispatcher is shared by every transport
/// task behind an `Arc`.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, info: ServerInfo) -> Self {
        Self { registry, info }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.info
    }

    /// Dispatch a request to the appropriate method.
    ///
    /// Every failure is folded into the returned response.
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!("Dispatching request: {}", request.method);

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(request.params),
            method => {
                warn!("Unknown method: {}", method);
                Err(ProtocolError::MethodNotFound(method.to_string()))
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                debug!("Request failed: {}", e);
                JsonRpcResponse::error(request.id, e.into())
            }
        }
    }

    /// The fixed capability descriptor returned by `initialize`.
    pub fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: MCP_VERSION.into(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: self.info.clone(),
        }
    }

    fn handle_initialize(&self) -> ProtocolResult<Value> {
        to_value(self.initialize_result())
    }

    fn handle_list_tools(&self) -> ProtocolResult<Value> {
        let tools = self.registry.list();
        debug!("Listing {} tools", tools.len());
        to_value(ListToolsResult { tools })
    }

    fn handle_call_tool(&self, params: Option<Value>) -> ProtocolResult<Value> {
        let params: CallToolParams = params
            .filter(|p| !p.is_null())
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProtocolError::InvalidParams(e.to_string()))?
            .ok_or_else(|| ProtocolError::InvalidParams("missing params".into()))?;

        let handler = self
            .registry
            .get(&params.name)
            .ok_or_else(|| ProtocolError::ToolNotFound(params.name.clone()))?;

        debug!("Tool call: {}", params.name);
        let arguments = params.arguments.unwrap_or_default();
        let output = catch_unwind(AssertUnwindSafe(|| handler.call(&arguments)))
            .map_err(|_| ProtocolError::ToolExecution("tool handler panicked".into()))?
            .map_err(|e| {
                warn!(tool = %params.name, error = %e, "Tool execution failed");
                ProtocolError::ToolExecution(e.to_string())
            })?;

        let text = serde_json::to_string(&output)
            .map_err(|e| ProtocolError::InternalError(e.to_string()))?;
        to_value(CallToolResult::text(text))
    }
}

fn to_value<T: serde::Serialize>(value: T) -> ProtocolResult<Value> {
    serde_json::to_value(value).map_err(|e| ProtocolError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ToolError, ToolResult};
    use crate::tools::create_registry;
    use serde_json::json;
    use std::collections::HashSet;

    fn dispatcher() -> Dispatcher {
        let registry = create_registry();
        registry.register("fail", "Always fails", json!({}), |_: &Arguments| -> ToolResult<Value> {
            Err(ToolError::ExecutionFailed("boom".into()))
        });
        Dispatcher::new(
            Arc::new(registry),
            ServerInfo {
                name: "test".into(),
                version: "1.0".into(),
            },
        )
    }

    fn call(dispatcher: &Dispatcher, params: Value) -> JsonRpcResponse {
        dispatcher.dispatch(JsonRpcRequest::new("tools/call").with_id(1).with_params(params))
    }

    fn error_code(response: &JsonRpcResponse) -> Option<ErrorCode> {
        response.error.as_ref().and_then(JsonRpcError::error_code)
    }

    #[test]
    fn test_dispatcher_initialize_is_idempotent() {
        let dispatcher = dispatcher();

        let first = dispatcher.dispatch(JsonRpcRequest::new("initialize").with_id(1));
        let second = dispatcher.dispatch(
            JsonRpcRequest::new("initialize")
                .with_id(2)
                .with_params(json!({"protocolVersion": "2025-03-26"})),
        );

        assert!(first.error.is_none());
        assert_eq!(first.result, second.result);
        let result = first.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_VERSION);
        assert_eq!(result["capabilities"], json!({"tools": {}}));
        assert_eq!(result["serverInfo"]["name"], "test");
    }

    #[test]
    fn test_dispatcher_list_tools() {
        let dispatcher = dispatcher();
        let response = dispatcher.dispatch(JsonRpcRequest::new("tools/list").with_id(1));

        let result: ListToolsResult = serde_json::from_value(response.result.unwrap()).unwrap();
        let names: HashSet<String> = result.tools.into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            HashSet::from(["basic_math".to_string(), "fail".to_string()])
        );
    }

    #[test]
    fn test_dispatcher_call_tool_success() {
        let dispatcher = dispatcher();
        let response = call(
            &dispatcher,
            json!({"name": "basic_math", "arguments": {"operation": "add", "operands": [5, 3]}}),
        );

        assert!(response.error.is_none());
        let result: CallToolResult = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(
            result.content,
            vec![ToolContent::Text { text: "8".into() }]
        );
    }

    #[test]
    fn test_dispatcher_malformed_params() {
        let dispatcher = dispatcher();

        let cases = [
            json!("not an object"),
            json!({"arguments": {}}),
            json!({"name": 5}),
            json!(null),
        ];
        for params in cases {
            let response = call(&dispatcher, params);
            assert!(response.result.is_none());
            assert_eq!(error_code(&response), Some(ErrorCode::InvalidParams));
        }

        let missing = dispatcher.dispatch(JsonRpcRequest::new("tools/call").with_id(1));
        assert_eq!(error_code(&missing), Some(ErrorCode::InvalidParams));
    }

    #[test]
    fn test_dispatcher_unknown_tool() {
        let dispatcher = dispatcher();
        let response = call(&dispatcher, json!({"name": "nope", "arguments": {}}));

        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Tool not found");
        assert_eq!(error.data, Some(json!("nope")));
    }

    #[test]
    fn test_dispatcher_handler_failure_is_recoverable() {
        let dispatcher = dispatcher();

        let failed = call(&dispatcher, json!({"name": "fail"}));
        let error = failed.error.unwrap();
        assert_eq!(error.code, -32603);
        assert_eq!(error.data, Some(json!("boom")));

        let ok = call(
            &dispatcher,
            json!({"name": "basic_math", "arguments": {"operation": "multiply", "operands": [2, 4]}}),
        );
        assert!(ok.error.is_none());
    }

    #[test]
    fn test_dispatcher_unknown_method() {
        let dispatcher = dispatcher();
        let response = dispatcher.dispatch(JsonRpcRequest::new("unknown/method").with_id("abc"));

        assert!(response.result.is_none());
        assert_eq!(response.id, Some(RequestId::from("abc")));
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.data, Some(json!("unknown/method")));
    }
}
