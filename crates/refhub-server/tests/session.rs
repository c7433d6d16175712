//! End-to-end sessions against an in-process hub.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use refhub_client::{Client, ClientError, NotificationHandler, NullHandler};
use refhub_protocol::ErrorCode;
use refhub_server::{conn, ExtensionRegistry, Hub, Server, ServerConfig};
use refhub_types::{RefIdentifier, RefState, RefUpdate};

/// Collects server-initiated notifications for assertions.
struct Collector {
    tx: mpsc::UnboundedSender<(String, Option<Value>)>,
}

#[async_trait]
impl NotificationHandler for Collector {
    async fn notify(&self, method: &str, params: Option<Value>) {
        let _ = self.tx.send((method.to_string(), params));
    }
}

fn collector() -> (Arc<Collector>, mpsc::UnboundedReceiver<(String, Option<Value>)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Collector { tx }), rx)
}

fn hub() -> Arc<Hub> {
    Hub::new(ServerConfig::default(), ExtensionRegistry::new()).unwrap()
}

/// Wire a client to `hub` over an in-memory stream.
fn attach(hub: &Arc<Hub>, handler: Arc<dyn NotificationHandler>) -> Client {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let hub = Arc::clone(hub);
    tokio::spawn(async move {
        conn::run(hub, server_side).await;
    });
    Client::from_stream(client_side, handler)
}

fn rpc_code(err: ClientError) -> Option<ErrorCode> {
    match err {
        ClientError::Rpc(e) => e.error_code(),
        _ => None,
    }
}

async fn recv_update(
    rx: &mut mpsc::UnboundedReceiver<(String, Option<Value>)>,
) -> refhub_protocol::RefUpdateParams {
    let (method, params) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification stream ended");
    assert_eq!(method, "ref/update");
    serde_json::from_value(params.unwrap()).unwrap()
}

#[tokio::test]
async fn initialize_then_ping() {
    let hub = hub();
    let client = attach(&hub, Arc::new(NullHandler));
    let init = client.initialize(Some("session-test".into())).await.unwrap();
    assert!(init.capabilities.watch);
    assert!(init.capabilities.remotes);
    assert_eq!(client.ping().await.unwrap(), "pong");
}

#[tokio::test]
async fn requests_before_initialize_are_rejected() {
    let hub = hub();
    let client = attach(&hub, Arc::new(NullHandler));
    let err = client.ping().await.unwrap_err();
    assert_eq!(rpc_code(err), Some(ErrorCode::NotInitialized));
}

#[tokio::test]
async fn double_initialize_is_rejected() {
    let hub = hub();
    let client = attach(&hub, Arc::new(NullHandler));
    client.initialize(None).await.unwrap();
    let err = client.initialize(None).await.unwrap_err();
    assert_eq!(rpc_code(err), Some(ErrorCode::AlreadyInitialized));
}

#[tokio::test]
async fn update_fans_out_with_one_ack_for_the_sender() {
    let hub = hub();

    let (a_handler, mut a_rx) = collector();
    let a = attach(&hub, a_handler);
    a.initialize(Some("watcher".into())).await.unwrap();
    a.watch("r", vec!["*".into()]).await.unwrap();

    let (b_handler, mut b_rx) = collector();
    let b = attach(&hub, b_handler);
    b.initialize(Some("sender".into())).await.unwrap();
    b.watch("r", vec!["branch/*".into()]).await.unwrap();

    let target = RefIdentifier::new("r", "branch/x");
    b.ref_update(&target, RefUpdate::with_state(RefState::new("b0", "main")))
        .await
        .unwrap();

    let to_a = recv_update(&mut a_rx).await;
    assert_eq!(to_a.ref_name, "branch/x");
    assert!(!to_a.update.ack);
    assert_eq!(
        to_a.update.state.as_ref().map(|s| s.base.as_str()),
        Some("b0")
    );

    let to_b = recv_update(&mut b_rx).await;
    assert!(to_b.update.ack);
}

#[tokio::test]
async fn conflicting_update_surfaces_as_invalid_request() {
    let hub = hub();
    let client = attach(&hub, Arc::new(NullHandler));
    client.initialize(None).await.unwrap();

    let target = RefIdentifier::new("r", "branch/x");
    client
        .ref_update(&target, RefUpdate::with_state(RefState::new("b0", "main")))
        .await
        .unwrap();
    let err = client
        .ref_update(&target, RefUpdate::with_state(RefState::new("b1", "main")))
        .await
        .unwrap_err();
    assert_eq!(rpc_code(err), Some(ErrorCode::InvalidRequest));

    // A forced update wins regardless of the stored base.
    client
        .ref_update(&target, RefUpdate::forced(RefState::new("b1", "main")))
        .await
        .unwrap();
}

#[tokio::test]
async fn watching_replays_current_state() {
    let hub = hub();

    let writer = attach(&hub, Arc::new(NullHandler));
    writer.initialize(None).await.unwrap();
    let target = RefIdentifier::new("r", "branch/x");
    writer
        .ref_update(&target, RefUpdate::with_state(RefState::new("b0", "main")))
        .await
        .unwrap();

    let (handler, mut rx) = collector();
    let late = attach(&hub, handler);
    late.initialize(Some("late".into())).await.unwrap();
    late.watch("r", vec!["branch/*".into()]).await.unwrap();

    let replay = recv_update(&mut rx).await;
    assert_eq!(replay.ref_name, "branch/x");
    assert!(!replay.update.ack);
    assert_eq!(
        replay.update.state.as_ref().map(|s| s.base.as_str()),
        Some("b0")
    );
}

#[tokio::test]
async fn delete_reaches_watchers_and_clears_state() {
    let hub = hub();

    let (handler, mut rx) = collector();
    let watcher = attach(&hub, handler);
    watcher.initialize(None).await.unwrap();
    watcher.watch("r", vec!["*".into()]).await.unwrap();

    let writer = attach(&hub, Arc::new(NullHandler));
    writer.initialize(None).await.unwrap();
    let target = RefIdentifier::new("r", "branch/x");
    writer
        .ref_update(&target, RefUpdate::with_state(RefState::new("b0", "main")))
        .await
        .unwrap();
    writer.ref_update(&target, RefUpdate::deletion()).await.unwrap();

    let created = recv_update(&mut rx).await;
    assert!(created.update.state.is_some());
    let deleted = recv_update(&mut rx).await;
    assert!(deleted.update.delete);

    let err = writer.ref_update(&target, RefUpdate::deletion()).await.unwrap_err();
    assert_eq!(rpc_code(err), Some(ErrorCode::RefNotExists));
}

#[tokio::test]
async fn panicking_extension_fails_one_request_only() {
    struct Panicky;

    #[async_trait]
    impl refhub_server::ext::MethodHandler for Panicky {
        async fn handle(
            &self,
            method: &str,
            _params: Option<&Value>,
        ) -> Option<refhub_server::ServerResult<Value>> {
            if method == "custom/explode" {
                panic!("handler blew up");
            }
            None
        }
    }

    impl refhub_server::Extension for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }
        fn method_handler(&self) -> Option<&dyn refhub_server::ext::MethodHandler> {
            Some(self)
        }
    }

    let mut exts = ExtensionRegistry::new();
    exts.push(Arc::new(Panicky));
    let hub = Hub::new(ServerConfig::default(), exts).unwrap();

    let client = attach(&hub, Arc::new(NullHandler));
    client.initialize(None).await.unwrap();

    let err = client.request("custom/explode", None).await.unwrap_err();
    assert_eq!(rpc_code(err), Some(ErrorCode::InternalError));

    // The connection outlives its crashed request.
    assert_eq!(client.ping().await.unwrap(), "pong");
}

#[tokio::test]
async fn relay_to_upstream_and_back() {
    // Upstream hub on a real socket; proxies dial it over TCP.
    let upstream = hub();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = Server::with_listener(Arc::clone(&upstream), listener);
    let endpoint = server.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let _ = server.serve().await;
    });

    let downstream = hub();
    let client = attach(&downstream, Arc::new(NullHandler));
    client.initialize(Some("editor".into())).await.unwrap();
    client
        .request(
            "repo/configure",
            Some(json!({
                "repo": "local",
                "remotes": {
                    "origin": {
                        "endpoint": endpoint,
                        "repo": "up",
                        "refspecs": ["branch/*"],
                    },
                },
            })),
        )
        .await
        .unwrap();

    // A local update is relayed into the upstream's store.
    let local = RefIdentifier::new("local", "branch/x");
    client
        .ref_update(&local, RefUpdate::with_state(RefState::new("b0", "main")))
        .await
        .unwrap();
    let up_target = RefIdentifier::new("up", "branch/x");
    wait_for(|| {
        let upstream = Arc::clone(&upstream);
        let up_target = up_target.clone();
        async move { upstream.store().acquire_existing_ref(&up_target).await.is_ok() }
    })
    .await;

    // Updates outside the subscribed refspecs still flow upstream; the
    // refspecs scope what comes back down, not what goes up.
    let local_head = RefIdentifier::new("local", "head");
    client
        .ref_update(&local_head, RefUpdate::with_state(RefState::new("h0", "main")))
        .await
        .unwrap();
    let up_head = RefIdentifier::new("up", "head");
    wait_for(|| {
        let upstream = Arc::clone(&upstream);
        let up_head = up_head.clone();
        async move { upstream.store().acquire_existing_ref(&up_head).await.is_ok() }
    })
    .await;

    // An update landing upstream is pushed back down into the
    // downstream's store.
    let direct = Client::connect(&endpoint, Arc::new(NullHandler)).await.unwrap();
    direct.initialize(Some("other-editor".into())).await.unwrap();
    let up_other = RefIdentifier::new("up", "branch/y");
    direct
        .ref_update(&up_other, RefUpdate::with_state(RefState::new("b1", "dev")))
        .await
        .unwrap();
    let local_other = RefIdentifier::new("local", "branch/y");
    wait_for(|| {
        let downstream = Arc::clone(&downstream);
        let local_other = local_other.clone();
        async move {
            downstream
                .store()
                .acquire_existing_ref(&local_other)
                .await
                .is_ok()
        }
    })
    .await;
}

async fn wait_for<F, Fut>(mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if cond().await {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within the deadline");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
