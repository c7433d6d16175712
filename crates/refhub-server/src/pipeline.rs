//! The ref update pipeline: validate, apply, hook, broadcast, relay.

use std::sync::Arc;

use tracing::debug;

use refhub_types::{RefIdentifier, RefUpdate};

use crate::error::ServerResult;
use crate::fanout;
use crate::registry::Connection;
use crate::server::Hub;

/// Apply `update` to `target` and propagate it.
///
/// `sender` is the local connection that submitted the update, or
/// `None` when the update arrived from an upstream server. Only
/// locally originated updates are relayed upstream, which is what
/// keeps an update from ping-ponging between linked servers.
///
/// The repo's order lock and the ref lock are held through the store
/// write, the reactor hooks, and the broadcast, so every watcher
/// observes updates to one ref in apply order and a `repo/watch`
/// replay never races a broadcast. Both are released before the
/// upstream relay.
pub async fn apply_and_broadcast(
    hub: &Arc<Hub>,
    target: &RefIdentifier,
    update: &RefUpdate,
    sender: Option<&Arc<Connection>>,
) -> ServerResult<()> {
    let order = hub.update_order(&target.repo);
    let order_guard = order.lock().await;
    let mut guard = hub.store().acquire_ref(target).await;
    refhub_ot::apply_update(target, guard.slot_mut(), update)?;

    for ext in hub.extensions().iter() {
        if let Some(reactor) = ext.ref_update_reactor() {
            reactor.after_ref_update(target, update).await?;
        }
    }

    // An ack carries no new state; it settles the sender's request
    // without waking watchers.
    if update.ack {
        return Ok(());
    }

    fanout::broadcast(hub, target, update, sender).await;
    drop(guard);
    drop(order_guard);

    if sender.is_some() {
        relay_upstream(hub, target, update).await;
    }
    Ok(())
}

/// Forward a locally originated update to the repo's remote, if one is
/// configured.
///
/// Every update of a remote-configured repo goes up, the head ref
/// included. The remote's refspecs scope the downstream subscription,
/// not this relay.
async fn relay_upstream(hub: &Arc<Hub>, target: &RefIdentifier, update: &RefUpdate) {
    let (endpoint, remote_repo) = {
        let repo = hub.store().acquire_repo(&target.repo).await;
        match repo.config().remote() {
            Some((_name, remote)) => (remote.endpoint.clone(), remote.repo.clone()),
            None => return,
        }
    };
    debug!(target = %target, %endpoint, "relaying update upstream");
    hub.remotes()
        .enqueue(
            &endpoint,
            refhub_protocol::RefUpdateParams {
                repo: remote_repo,
                ref_name: target.ref_name.clone(),
                update: update.clone(),
            },
        )
        .await;
}
