//! Error types for the hub, and their mapping onto wire error codes.

use refhub_protocol::{ErrorCode, ProtocolError, RpcError};
use thiserror::Error;

/// Errors raised while serving hub operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A method other than `initialize` arrived before `initialize`.
    #[error("connection is not initialized")]
    NotInitialized,

    /// A second `initialize` on the same connection.
    #[error("connection is already initialized")]
    AlreadyInitialized,

    /// Missing or malformed request payload.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// A structurally valid request the server refuses in its current mode
    /// (for example `repo/list` on a non-private server).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Conflicting remote configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown method after every extension declined it.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// An endpoint was released that the remote manager does not track.
    #[error("no remote connection tracked for endpoint {0}")]
    UnknownEndpoint(String),

    /// Propagated store failure.
    #[error(transparent)]
    Store(#[from] refhub_store::StoreError),

    /// Propagated OT apply failure.
    #[error(transparent)]
    Ot(#[from] refhub_ot::OtError),

    /// Propagated value validation failure.
    #[error(transparent)]
    Types(#[from] refhub_types::TypeError),

    /// Propagated wire protocol failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Failure on an upstream client connection.
    #[error("upstream error: {0}")]
    Upstream(#[from] refhub_client::ClientError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Recovered panic or other internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// The wire error code this error surfaces as.
    pub fn error_code(&self) -> ErrorCode {
        use refhub_ot::OtError;
        use refhub_store::StoreError;
        use refhub_types::TypeError;

        match self {
            ServerError::NotInitialized => ErrorCode::NotInitialized,
            ServerError::AlreadyInitialized => ErrorCode::AlreadyInitialized,
            ServerError::InvalidParams(_) => ErrorCode::InvalidParams,
            ServerError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            ServerError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            ServerError::MethodNotFound(_) => ErrorCode::MethodNotFound,
            ServerError::Store(StoreError::RefNotExists { .. }) => ErrorCode::RefNotExists,
            ServerError::Store(StoreError::RepoExists { .. }) => ErrorCode::RepoExists,
            ServerError::Ot(OtError::DeleteMissing { .. }) => ErrorCode::RefNotExists,
            ServerError::Ot(OtError::InvalidUpdate(_)) => ErrorCode::InvalidParams,
            ServerError::Ot(_) => ErrorCode::InvalidRequest,
            ServerError::Types(TypeError::InvalidConfig(_)) => ErrorCode::InvalidConfig,
            ServerError::Types(_) => ErrorCode::InvalidParams,
            ServerError::UnknownEndpoint(_)
            | ServerError::Protocol(_)
            | ServerError::Upstream(_)
            | ServerError::Io(_)
            | ServerError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Convert into the wire error carried in a response.
    pub fn to_rpc_error(&self) -> RpcError {
        RpcError::new(self.error_code(), self.to_string())
    }
}

/// Convenience alias for hub operations.
pub type ServerResult<T> = Result<T, ServerError>;
