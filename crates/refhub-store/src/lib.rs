//! Ref and repo storage for refhub.
//!
//! The hub addresses state through two per-entity exclusive lock handles:
//! [`OwnedRepo`] for a repo's configuration and [`OwnedRef`] for one ref's
//! OT state slot. Handles are owned guards, so they can be held across
//! await points and must be dropped (or fall out of scope) on every exit
//! path, including error paths.
//!
//! The only backend is [`MemoryStore`]; repo records are created lazily the
//! first time they are addressed, matching the hub's `repo/info` contract.

pub mod error;
pub mod handles;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use handles::{OwnedRef, OwnedRepo};
pub use memory::MemoryStore;
