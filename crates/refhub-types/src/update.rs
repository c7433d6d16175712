//! Ref update payloads.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypeError};
use crate::state::RefState;

/// An incremental change to one ref.
///
/// Exactly one of the following holds at a time:
///
/// - the update carries new [`state`](Self::state),
/// - the update is a [`delete`](Self::delete),
/// - the update is a pure [`ack`](Self::ack).
///
/// `force` overrides the last-writer-wins conflict check performed when the
/// update is applied; it is only meaningful on state-carrying updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefUpdate {
    /// New state for the ref, if this is a state-carrying update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RefState>,
    /// Delete the ref.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delete: bool,
    /// Override conflict checks on apply.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
    /// Acknowledgement of the sender's own update. Acks are terminal: they
    /// are never rebroadcast to other watchers.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ack: bool,
}

impl RefUpdate {
    /// A state-carrying update.
    pub fn with_state(state: RefState) -> Self {
        Self {
            state: Some(state),
            delete: false,
            force: false,
            ack: false,
        }
    }

    /// A forced state-carrying update (skips conflict checks).
    pub fn forced(state: RefState) -> Self {
        Self {
            state: Some(state),
            delete: false,
            force: true,
            ack: false,
        }
    }

    /// A delete update.
    pub fn deletion() -> Self {
        Self {
            state: None,
            delete: true,
            force: false,
            ack: false,
        }
    }

    /// A pure acknowledgement.
    pub fn acknowledgement() -> Self {
        Self {
            state: None,
            delete: false,
            force: false,
            ack: true,
        }
    }

    /// Returns a copy of this update with the ack flag set as given.
    pub fn with_ack(&self, ack: bool) -> Self {
        let mut u = self.clone();
        u.ack = ack;
        u
    }

    /// Validate the one-of shape: exactly one of state / delete / ack.
    pub fn validate(&self) -> Result<()> {
        let carries_state = self.state.is_some();
        let variants = usize::from(carries_state) + usize::from(self.delete) + usize::from(self.ack);
        match variants {
            0 => Err(TypeError::InvalidUpdate(
                "update must carry state, a delete, or an ack".into(),
            )),
            1 => {
                if self.force && !carries_state {
                    return Err(TypeError::InvalidUpdate(
                        "force is only meaningful on state-carrying updates".into(),
                    ));
                }
                Ok(())
            }
            _ => Err(TypeError::InvalidUpdate(
                "state, delete, and ack are mutually exclusive".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_update_is_valid() {
        assert!(RefUpdate::with_state(RefState::new("b", "main")).validate().is_ok());
        assert!(RefUpdate::forced(RefState::new("b", "main")).validate().is_ok());
    }

    #[test]
    fn delete_and_ack_are_valid() {
        assert!(RefUpdate::deletion().validate().is_ok());
        assert!(RefUpdate::acknowledgement().validate().is_ok());
    }

    #[test]
    fn empty_update_rejected() {
        let u = RefUpdate {
            state: None,
            delete: false,
            force: false,
            ack: false,
        };
        assert!(u.validate().is_err());
    }

    #[test]
    fn combined_variants_rejected() {
        let u = RefUpdate {
            state: Some(RefState::new("b", "main")),
            delete: true,
            force: false,
            ack: false,
        };
        assert!(u.validate().is_err());

        let u = RefUpdate {
            state: None,
            delete: true,
            force: false,
            ack: true,
        };
        assert!(u.validate().is_err());
    }

    #[test]
    fn force_without_state_rejected() {
        let u = RefUpdate {
            state: None,
            delete: true,
            force: true,
            ack: false,
        };
        assert!(u.validate().is_err());
    }

    #[test]
    fn with_ack_flips_only_ack() {
        let u = RefUpdate::with_state(RefState::new("b", "main"));
        let acked = u.with_ack(true);
        assert!(acked.ack);
        assert_eq!(acked.state, u.state);
    }

    #[test]
    fn wire_shape_omits_false_flags() {
        let u = RefUpdate::with_state(RefState::new("b", "main"));
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("delete").is_none());
        assert!(json.get("force").is_none());
        assert!(json.get("ack").is_none());
    }
}
