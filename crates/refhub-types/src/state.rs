//! Opaque OT ref state.
//!
//! A ref carries an ordered edit history on top of a base snapshot. The hub
//! never interprets individual ops; composition and conflict checks live in
//! `refhub-ot`, and everything else treats [`RefState`] as copyable data.

use serde::{Deserialize, Serialize};

/// One operational-transform edit. Opaque JSON from the hub's point of view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Op(pub serde_json::Value);

impl Op {
    /// Wrap a JSON value as an op.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The underlying JSON value.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// The state of one ref: a base snapshot identifier, the upstream branch
/// this line of history tracks, and the ordered edit history itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefState {
    /// Identifier of the snapshot the history is built on.
    pub base: String,
    /// Branch name this ref's history follows.
    pub branch: String,
    /// Ordered edit history on top of `base`.
    #[serde(default)]
    pub history: Vec<Op>,
}

impl RefState {
    /// A fresh state with an empty history.
    pub fn new(base: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            branch: branch.into(),
            history: Vec::new(),
        }
    }

    /// An independent copy sharing no data with `self`.
    ///
    /// Required whenever a snapshot crosses a lock boundary: the caller may
    /// keep mutating the original after the per-ref lock is released.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Number of ops in the history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
