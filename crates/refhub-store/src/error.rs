//! Error types for store operations.

use thiserror::Error;

/// Errors that can occur during ref/repo store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Lookup of a ref that does not exist.
    #[error("ref not found: {repo}:{ref_name}")]
    RefNotExists { repo: String, ref_name: String },

    /// Explicit creation of a repo that already exists.
    #[error("repo already exists: {repo}")]
    RepoExists { repo: String },
}

/// Convenience alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
