//! Foundation types for refhub.
//!
//! This crate provides the value types shared by every other refhub crate:
//! ref addressing, update payloads, repository configuration, and refspec
//! matching. Everything here is plain data; the algorithms that act on it
//! live in `refhub-ot`, `refhub-store`, and `refhub-server`.
//!
//! # Key Types
//!
//! - [`RefIdentifier`] — (repo, ref) addressing key for watches and updates
//! - [`RefState`] — opaque OT state (edit history plus base metadata)
//! - [`RefUpdate`] — tagged update payload: new state, delete, or pure ack
//! - [`RepoConfiguration`] / [`RemoteConfiguration`] — per-repo remote setup
//!
//! # Ref naming
//!
//! Each repo owns a local [`HEAD_REF`] tracking its own working state;
//! shared lines of history live under the `branch/` prefix (for example
//! `branch/main`). Refspecs select ref names by exact match or with the
//! `*` wildcard.

pub mod config;
pub mod error;
pub mod ident;
pub mod names;
pub mod refspec;
pub mod state;
pub mod update;

pub use config::{RemoteConfiguration, RepoConfiguration};
pub use error::TypeError;
pub use ident::RefIdentifier;
pub use names::{validate_ref_name, validate_repo_name, BRANCH_PREFIX, HEAD_REF};
pub use refspec::{matches_any, refspec_matches};
pub use state::{Op, RefState};
pub use update::RefUpdate;
