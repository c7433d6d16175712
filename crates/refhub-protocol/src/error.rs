//! Error types for wire protocol handling.

use thiserror::Error;

/// Errors that can occur while framing or parsing protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame exceeded the maximum permitted size.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A frame could not be split or reassembled.
    #[error("framing error: {0}")]
    Framing(String),

    /// A payload failed to serialize.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A payload failed to deserialize.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// I/O failure on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
