//! Exclusive lock handles over store entities.

use refhub_types::{RefIdentifier, RefState, RepoConfiguration};
use tokio::sync::OwnedMutexGuard;

/// Exclusive handle over one repo's configuration.
///
/// Other operations on the same repo block until the handle is dropped.
pub struct OwnedRepo {
    pub(crate) path: String,
    pub(crate) guard: OwnedMutexGuard<RepoConfiguration>,
}

impl OwnedRepo {
    /// The repo's path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The repo's current configuration.
    pub fn config(&self) -> &RepoConfiguration {
        &self.guard
    }

    /// Mutable access to the repo's configuration.
    pub fn config_mut(&mut self) -> &mut RepoConfiguration {
        &mut self.guard
    }
}

/// Exclusive handle over one ref's state slot.
///
/// The slot is `None` when the ref does not exist (yet, or anymore).
/// Updates to a single ref are serialized by this lock.
#[derive(Debug)]
pub struct OwnedRef {
    pub(crate) ident: RefIdentifier,
    pub(crate) guard: OwnedMutexGuard<Option<RefState>>,
}

impl OwnedRef {
    /// The ref this handle addresses.
    pub fn ident(&self) -> &RefIdentifier {
        &self.ident
    }

    /// The ref's current state, if it exists.
    pub fn state(&self) -> Option<&RefState> {
        self.guard.as_ref()
    }

    /// Mutable access to the ref's state slot.
    pub fn slot_mut(&mut self) -> &mut Option<RefState> {
        &mut self.guard
    }
}
