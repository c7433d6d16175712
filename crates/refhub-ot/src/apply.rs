//! Merging an incoming update into a ref's current state.

use refhub_types::{RefIdentifier, RefState, RefUpdate};

use crate::error::{OtError, OtResult};

/// Apply `update` to the current state slot of the ref named by `target`.
///
/// The slot is `None` for a ref that does not exist yet. The caller holds
/// the per-ref lock for the duration of the call; failure leaves the slot
/// untouched so the caller can abort without a partial broadcast.
///
/// Semantics:
///
/// - A pure ack changes nothing.
/// - A delete clears the slot; deleting a missing ref is an error.
/// - A state-carrying update replaces the slot when the ref does not exist
///   or `force` is set. Otherwise the incoming state must track the same
///   base/branch and its history must extend the current history
///   (last-writer-wins over prefixes), or the update conflicts.
pub fn apply_update(
    target: &RefIdentifier,
    slot: &mut Option<RefState>,
    update: &RefUpdate,
) -> OtResult<()> {
    update.validate()?;

    if update.ack {
        return Ok(());
    }

    if update.delete {
        if slot.is_none() {
            return Err(OtError::DeleteMissing {
                target: target.to_string(),
            });
        }
        *slot = None;
        return Ok(());
    }

    // validate() guarantees state is present past this point.
    let Some(incoming) = update.state.as_ref() else {
        return Err(OtError::InvalidUpdate(
            refhub_types::TypeError::InvalidUpdate("update carries no state".into()),
        ));
    };

    let current = match (update.force, slot.as_ref()) {
        (true, _) | (false, None) => {
            *slot = Some(incoming.deep_copy());
            return Ok(());
        }
        (false, Some(current)) => current,
    };
    if current.base != incoming.base || current.branch != incoming.branch {
        return Err(OtError::BaseMismatch {
            target: target.to_string(),
            current: format!("{}@{}", current.branch, current.base),
            incoming: format!("{}@{}", incoming.branch, incoming.base),
        });
    }
    if !extends(&incoming.history, &current.history) {
        return Err(OtError::Conflict {
            target: target.to_string(),
        });
    }

    *slot = Some(incoming.deep_copy());
    Ok(())
}

/// Returns `true` iff `longer` starts with `prefix`.
fn extends(longer: &[refhub_types::Op], prefix: &[refhub_types::Op]) -> bool {
    longer.len() >= prefix.len() && &longer[..prefix.len()] == prefix
}
