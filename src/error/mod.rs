//! Error types for the MCP server.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` conversions.

use serde_json::Value;
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

/// JSON-RPC error codes that are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            _ => None,
        }
    }
}

/// JSON-RPC 2.0 and MCP protocol errors.
///
/// Each variant maps to one [`ErrorCode`]; the payload becomes the error's
/// `data` field on the wire.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line or body was not valid JSON.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Valid JSON, but not a JSON-RPC request.
    #[error("Invalid JSON-RPC request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Unknown tool name. Shares the method-not-found code.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ProtocolError {
    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ParseError(_) | Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::MethodNotFound(_) | Self::ToolNotFound(_) => ErrorCode::MethodNotFound,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::ToolExecution(_) | Self::InternalError(_) => ErrorCode::InternalError,
        }
    }

    /// Short, stable message placed in the JSON-RPC `message` field.
    pub fn message(&self) -> &'static str {
        match self {
            Self::ParseError(_) => "Parse error",
            Self::InvalidRequest(_) => "Invalid JSON-RPC request",
            Self::MethodNotFound(_) => "Method not found",
            Self::ToolNotFound(_) => "Tool not found",
            Self::InvalidParams(_) => "Invalid parameters",
            Self::ToolExecution(_) => "Tool execution failed",
            Self::InternalError(_) => "Internal error",
        }
    }

    /// Diagnostic payload placed in the JSON-RPC `data` field.
    pub fn data(&self) -> Value {
        match self {
            Self::ParseError(detail)
            | Self::InvalidRequest(detail)
            | Self::MethodNotFound(detail)
            | Self::ToolNotFound(detail)
            | Self::InvalidParams(detail)
            | Self::ToolExecution(detail)
            | Self::InternalError(detail) => Value::String(detail.clone()),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(Cow<'static, str>),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: Cow<'static, str>,
        message: Cow<'static, str>,
    },
}

/// Tool execution errors, reported by handlers.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("missing required argument: {0}")]
    MissingArgument(Cow<'static, str>),

    #[error("{0}")]
    ExecutionFailed(String),
}

/// HTTP transport lifecycle errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load TLS material from {path}: {source}")]
    Tls {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("server task failed: {0}")]
    Task(String),
}

/// Result type alias for McpError.
pub type Result<T> = std::result::Result<T, McpError>;

/// Result type alias for ProtocolError.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type alias for ToolError.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::InvalidRequest.as_i32(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.as_i32(), -32601);
        assert_eq!(ErrorCode::InvalidParams.as_i32(), -32602);
        assert_eq!(ErrorCode::InternalError.as_i32(), -32603);
        assert_eq!(ErrorCode::from_i32(-32601), Some(ErrorCode::MethodNotFound));
        assert_eq!(ErrorCode::from_i32(-32700), None);
    }

    #[test]
    fn test_protocol_error_codes() {
        assert_eq!(
            ProtocolError::ParseError("x".into()).code(),
            ErrorCode::InvalidRequest
        );
        assert_eq!(
            ProtocolError::ToolNotFound("x".into()).code(),
            ErrorCode::MethodNotFound
        );
        assert_eq!(
            ProtocolError::MethodNotFound("x".into()).code(),
            ErrorCode::MethodNotFound
        );
        assert_eq!(
            ProtocolError::InvalidParams("x".into()).code(),
            ErrorCode::InvalidParams
        );
        assert_eq!(
            ProtocolError::ToolExecution("x".into()).code(),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn test_protocol_error_data_carries_detail() {
        let err = ProtocolError::ToolNotFound("nope".into());
        assert_eq!(err.message(), "Tool not found");
        assert_eq!(err.data(), Value::String("nope".into()));
    }

    #[test]
    fn test_error_conversion() {
        let tool_error = ToolError::ExecutionFailed("division by zero".into());
        let mcp_error: McpError = tool_error.into();
        assert!(matches!(mcp_error, McpError::Tool(_)));
    }
}
