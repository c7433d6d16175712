//! Error types for validation of refhub value types.

use thiserror::Error;

/// Errors raised while validating refhub value types.
#[derive(Debug, Error)]
pub enum TypeError {
    /// The ref name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidRefName { name: String, reason: String },

    /// The repo name is invalid.
    #[error("invalid repo name: {name}: {reason}")]
    InvalidRepoName { name: String, reason: String },

    /// The update payload does not satisfy the one-of shape.
    #[error("invalid ref update: {0}")]
    InvalidUpdate(String),

    /// The repo configuration is rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for type validation.
pub type Result<T> = std::result::Result<T, TypeError>;
