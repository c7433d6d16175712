//! Error types for client operations.

use refhub_protocol::{ProtocolError, RpcError};
use thiserror::Error;

/// Errors that can occur on a client connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a coded RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Encoding or framing failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection is closed; the request cannot be delivered or its
    /// response was discarded.
    #[error("connection closed")]
    Closed,

    /// I/O failure while connecting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
