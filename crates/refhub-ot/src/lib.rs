//! The OT boundary of refhub.
//!
//! The hub treats ref state as an opaque edit history; this crate owns the
//! one operation the hub performs on it: merging an incoming [`RefUpdate`]
//! into a ref's current state. Composition and transformation of individual
//! ops is out of scope here; the conflict discipline is last-writer-wins
//! over history prefixes, overridable with `force`.

pub mod apply;
pub mod error;

pub use apply::apply_update;
pub use error::{OtError, OtResult};
