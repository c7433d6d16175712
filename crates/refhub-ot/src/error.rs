//! Error types for OT apply operations.

use thiserror::Error;

/// Errors that can occur while applying a ref update.
#[derive(Debug, Error)]
pub enum OtError {
    /// The incoming state does not extend the ref's current history and the
    /// update was not forced.
    #[error("conflicting update for {target}: incoming history does not extend current history")]
    Conflict { target: String },

    /// The incoming state tracks a different base or branch than the ref's
    /// current state and the update was not forced.
    #[error("base mismatch for {target}: current {current}, incoming {incoming}")]
    BaseMismatch {
        target: String,
        current: String,
        incoming: String,
    },

    /// The update payload is malformed.
    #[error("invalid update: {0}")]
    InvalidUpdate(#[from] refhub_types::TypeError),

    /// A delete targeted a ref with no state.
    #[error("cannot delete {target}: ref does not exist")]
    DeleteMissing { target: String },
}

/// Convenience alias for apply operations.
pub type OtResult<T> = Result<T, OtError>;
