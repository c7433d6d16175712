//! The JSON-RPC 2.0 envelope and the hub's coded error taxonomy.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON-RPC version string carried on every message.
pub const JSONRPC_VERSION: &str = "2.0";

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Request identifier. Both sides allocate from their own counter.
pub type RequestId = u64;

/// A request or notification (a request without an id expects no response).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// A request expecting a response.
    pub fn call(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// A notification (no response expected).
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Returns `true` if this request expects no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A response to a request: either a result or an error, never both.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// A successful response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A failed response.
    pub fn failure(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A coded RPC error carried in a [`Response`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// Build an error from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
        }
    }

    /// The taxonomy entry for this error's code, if it is one of ours.
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// The hub's error taxonomy, surfaced as JSON-RPC error codes.
///
/// The reserved range (-326xx) follows the JSON-RPC spec; hub-specific
/// conditions use the -320xx application range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed envelope or a method rejected in the current server mode.
    InvalidRequest,
    /// Unknown method after all extensions declined.
    MethodNotFound,
    /// Missing or malformed request payload.
    InvalidParams,
    /// Recovered panic or other internal failure.
    InternalError,
    /// Any method called before `initialize`.
    NotInitialized,
    /// Duplicate `initialize`.
    AlreadyInitialized,
    /// Lookup of a non-existent ref.
    RefNotExists,
    /// Conflicting remote configuration.
    InvalidConfig,
    /// Explicit creation of a repo that already exists.
    RepoExists,
}

impl ErrorCode {
    /// The numeric wire code.
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::NotInitialized => -32002,
            ErrorCode::AlreadyInitialized => -32003,
            ErrorCode::RefNotExists => -32004,
            ErrorCode::InvalidConfig => -32005,
            ErrorCode::RepoExists => -32006,
        }
    }

    /// Reverse lookup from a numeric wire code.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            -32002 => ErrorCode::NotInitialized,
            -32003 => ErrorCode::AlreadyInitialized,
            -32004 => ErrorCode::RefNotExists,
            -32005 => ErrorCode::InvalidConfig,
            -32006 => ErrorCode::RepoExists,
            _ => return None,
        })
    }
}

/// Any protocol message: a request/notification or a response.
///
/// Untagged: requests carry `method`, responses never do.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Response(Response),
}
