//! Broadcast fan-out: pushing an applied update to every watcher.

use std::sync::Arc;

use tracing::warn;

use refhub_protocol::{methods, Message, RefUpdateParams, Request};
use refhub_types::{RefIdentifier, RefUpdate};

use crate::registry::{Connection, NotifyAttempt};
use crate::server::Hub;

/// Deliver a `ref/update` notification to every watcher of `target`.
///
/// The sender's copy carries `ack: true`; everyone else's carries the
/// update as-is. A sender that is not watching the target still gets
/// exactly one ack notification, so submitters can always correlate
/// their own update coming back.
///
/// The caller holds the target's ref lock, which is what gives every
/// watcher updates to one ref in apply order. A watcher with a full
/// queue may stall delivery up to the configured notify timeout;
/// past that it is disconnected, and delivery continues with the
/// remaining watchers.
pub async fn broadcast(
    hub: &Arc<Hub>,
    target: &RefIdentifier,
    update: &RefUpdate,
    sender: Option<&Arc<Connection>>,
) {
    let watchers = hub.registry().watchers(target);
    let sender_seq = sender.map(|c| c.seq());
    let mut sender_notified = false;

    for watcher in watchers {
        let is_sender = Some(watcher.seq()) == sender_seq;
        sender_notified |= is_sender;
        deliver(hub, &watcher, notification(target, update.with_ack(is_sender))).await;
    }

    if let Some(sender) = sender {
        if !sender_notified {
            deliver(hub, sender, notification(target, update.with_ack(true))).await;
        }
    }
}

fn notification(target: &RefIdentifier, update: RefUpdate) -> Message {
    let params = RefUpdateParams {
        repo: target.repo.clone(),
        ref_name: target.ref_name.clone(),
        update,
    };
    let value = match serde_json::to_value(&params) {
        Ok(v) => v,
        // RefUpdateParams serialization is infallible in practice.
        Err(e) => serde_json::Value::String(e.to_string()),
    };
    Message::Request(Request::notification(methods::REF_UPDATE, Some(value)))
}

async fn deliver(hub: &Arc<Hub>, watcher: &Arc<Connection>, msg: Message) {
    match watcher.try_notify(msg) {
        NotifyAttempt::Sent => {}
        NotifyAttempt::Closed => drop_watcher(hub, watcher),
        NotifyAttempt::Busy(msg) => {
            let timeout = hub.config().notify_timeout();
            if watcher.notify(msg, timeout).await.is_err() {
                warn!(seq = watcher.seq(), "watcher stalled, disconnecting");
                drop_watcher(hub, watcher);
            }
        }
    }
}

fn drop_watcher(hub: &Arc<Hub>, watcher: &Arc<Connection>) {
    hub.registry().unregister(watcher.seq());
    watcher.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::ext::ExtensionRegistry;
    use refhub_types::RefState;
    use tokio::sync::mpsc;

    fn hub() -> Arc<Hub> {
        Hub::new(ServerConfig::default(), ExtensionRegistry::new()).unwrap()
    }

    fn ref_update_payload(msg: Message) -> RefUpdateParams {
        match msg {
            Message::Request(req) => {
                assert_eq!(req.method, methods::REF_UPDATE);
                serde_json::from_value(req.params.unwrap()).unwrap()
            }
            Message::Response(_) => panic!("expected a notification"),
        }
    }

    #[tokio::test]
    async fn sender_gets_ack_watcher_gets_update() {
        let hub = hub();
        let target = RefIdentifier::new("r", "branch/x");
        let update = RefUpdate::with_state(RefState::new("b0", "main"));

        let (a_tx, mut a_rx) = mpsc::channel(4);
        let (a, _closed_a) = hub.registry().register(a_tx);
        a.set_watch("r".into(), vec!["*".into()]);

        let (b_tx, mut b_rx) = mpsc::channel(4);
        let (b, _closed_b) = hub.registry().register(b_tx);
        b.set_watch("r".into(), vec!["branch/*".into()]);

        broadcast(&hub, &target, &update, Some(&b)).await;

        let to_a = ref_update_payload(a_rx.recv().await.unwrap());
        assert!(!to_a.update.ack);
        assert_eq!(to_a.update.state, update.state);

        let to_b = ref_update_payload(b_rx.recv().await.unwrap());
        assert!(to_b.update.ack);
    }

    #[tokio::test]
    async fn non_watching_sender_still_gets_one_ack() {
        let hub = hub();
        let target = RefIdentifier::new("r", "branch/x");
        let update = RefUpdate::with_state(RefState::new("b0", "main"));

        let (tx, mut rx) = mpsc::channel(4);
        let (sender, _closed) = hub.registry().register(tx);
        // No watch set at all.

        broadcast(&hub, &target, &update, Some(&sender)).await;

        let msg = ref_update_payload(rx.recv().await.unwrap());
        assert!(msg.update.ack);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn upstream_update_reaches_watchers_without_ack() {
        let hub = hub();
        let target = RefIdentifier::new("r", "branch/x");
        let update = RefUpdate::with_state(RefState::new("b0", "main"));

        let (tx, mut rx) = mpsc::channel(4);
        let (conn, _closed) = hub.registry().register(tx);
        conn.set_watch("r".into(), vec!["*".into()]);

        broadcast(&hub, &target, &update, None).await;

        let msg = ref_update_payload(rx.recv().await.unwrap());
        assert!(!msg.update.ack);
    }

    #[tokio::test]
    async fn stalled_watcher_is_disconnected_without_blocking_others() {
        let config = ServerConfig {
            notify_timeout_secs: 0,
            ..ServerConfig::default()
        };
        let hub = Hub::new(config, ExtensionRegistry::new()).unwrap();
        let target = RefIdentifier::new("r", "branch/x");
        let update = RefUpdate::with_state(RefState::new("b0", "main"));

        // A watcher whose queue is full and never drained.
        let (stalled_tx, _stalled_rx) = mpsc::channel(1);
        let (stalled, _closed) = hub.registry().register(stalled_tx);
        stalled.set_watch("r".into(), vec!["*".into()]);

        let (ok_tx, mut ok_rx) = mpsc::channel(4);
        let (healthy, _closed_ok) = hub.registry().register(ok_tx);
        healthy.set_watch("r".into(), vec!["*".into()]);

        // First broadcast fills the stalled watcher's queue, the second
        // times out on it and disconnects it.
        broadcast(&hub, &target, &update, None).await;
        broadcast(&hub, &target, &update, None).await;

        assert!(stalled.is_closed());
        assert!(!healthy.is_closed());
        assert_eq!(hub.registry().len(), 1);

        // The healthy watcher got both notifications in order.
        assert!(ok_rx.recv().await.is_some());
        assert!(ok_rx.recv().await.is_some());
    }
}
