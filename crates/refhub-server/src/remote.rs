//! Upstream proxy connections.
//!
//! A server acting as a proxy keeps one client connection per upstream
//! endpoint, shared by every repo configured against that endpoint.
//! Locally originated updates are queued to the proxy and forwarded in
//! order; updates pushed down by the upstream re-enter the local
//! pipeline with no sender, which is what stops them from being
//! relayed straight back up.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use refhub_client::{Client, NotificationHandler};
use refhub_protocol::{methods, RefUpdateParams};
use refhub_types::RefIdentifier;

use crate::error::{ServerError, ServerResult};
use crate::pipeline;
use crate::server::Hub;

struct RemoteProxy {
    client: Arc<Client>,
    queue: mpsc::Sender<RefUpdateParams>,
}

/// All upstream proxies, keyed by endpoint.
pub struct RemoteManager {
    hub: Weak<Hub>,
    proxies: AsyncMutex<HashMap<String, Arc<RemoteProxy>>>,
}

impl RemoteManager {
    pub fn new(hub: Weak<Hub>) -> Self {
        Self {
            hub,
            proxies: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Ensure a connected, initialized proxy exists for `endpoint`.
    pub async fn connect(&self, endpoint: &str) -> ServerResult<()> {
        self.get_or_create(endpoint).await.map(|_| ())
    }

    /// Subscribe the proxy for `endpoint` to `refspecs` on the
    /// upstream's `repo`.
    pub async fn watch(
        &self,
        endpoint: &str,
        repo: &str,
        refspecs: Vec<String>,
    ) -> ServerResult<()> {
        let proxy = self.get_or_create(endpoint).await?;
        proxy.client.watch(repo, refspecs).await?;
        Ok(())
    }

    /// Queue a locally originated update for forwarding. Fire-and-forget:
    /// forwarding failures are logged, not surfaced to the local sender.
    pub async fn enqueue(&self, endpoint: &str, params: RefUpdateParams) {
        let proxy = match self.get_or_create(endpoint).await {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!(%endpoint, error = %e, "dropping upstream relay, no connection");
                return;
            }
        };
        if proxy.queue.send(params).await.is_err() {
            warn!(%endpoint, "dropping upstream relay, forwarder stopped");
        }
    }

    /// Drop the proxy for `endpoint`.
    pub async fn close_and_remove(&self, endpoint: &str) -> ServerResult<()> {
        let removed = self.proxies.lock().await.remove(endpoint);
        match removed {
            Some(_proxy) => {
                info!(%endpoint, "detached upstream connection");
                Ok(())
            }
            None => Err(ServerError::UnknownEndpoint(endpoint.to_string())),
        }
    }

    async fn get_or_create(&self, endpoint: &str) -> ServerResult<Arc<RemoteProxy>> {
        if let Some(proxy) = self.proxies.lock().await.get(endpoint) {
            return Ok(Arc::clone(proxy));
        }

        // Connect outside the map lock; dialing can be slow.
        let handler = Arc::new(DownstreamHandler {
            hub: self.hub.clone(),
            endpoint: endpoint.to_string(),
        });
        let client = Arc::new(Client::connect(endpoint, handler).await?);
        client.initialize(None).await?;

        let mut proxies = self.proxies.lock().await;
        if let Some(existing) = proxies.get(endpoint) {
            // Lost the race; the duplicate connection is dropped.
            return Ok(Arc::clone(existing));
        }

        let (queue_tx, mut queue_rx) = mpsc::channel::<RefUpdateParams>(256);
        let proxy = Arc::new(RemoteProxy {
            client: Arc::clone(&client),
            queue: queue_tx,
        });
        proxies.insert(endpoint.to_string(), Arc::clone(&proxy));
        drop(proxies);

        // Forwarding loop: preserves per-endpoint ordering.
        let forward_client = Arc::clone(&client);
        let forward_endpoint = endpoint.to_string();
        tokio::spawn(async move {
            while let Some(params) = queue_rx.recv().await {
                let target = RefIdentifier::new(&params.repo, &params.ref_name);
                if let Err(e) = forward_client.ref_update(&target, params.update).await {
                    warn!(endpoint = %forward_endpoint, %target, error = %e, "upstream relay failed");
                }
            }
        });

        // Disconnect watcher: forget the proxy when the upstream hangs up.
        let hub = self.hub.clone();
        let watch_endpoint = endpoint.to_string();
        tokio::spawn(async move {
            client.wait_closed().await;
            let Some(hub) = hub.upgrade() else { return };
            if hub.is_shutting_down() {
                return;
            }
            warn!(endpoint = %watch_endpoint, "upstream connection lost");
            let mut proxies = hub.remotes().proxies.lock().await;
            proxies.remove(&watch_endpoint);
        });

        info!(%endpoint, "attached upstream connection");
        Ok(proxy)
    }
}

/// Receives `ref/update` pushes from an upstream server and feeds them
/// into the local pipeline.
struct DownstreamHandler {
    hub: Weak<Hub>,
    endpoint: String,
}

#[async_trait]
impl NotificationHandler for DownstreamHandler {
    async fn notify(&self, method: &str, params: Option<Value>) {
        if method != methods::REF_UPDATE {
            return;
        }
        let Some(params) = params else { return };
        let params: RefUpdateParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "malformed upstream push");
                return;
            }
        };
        // Acks settle our own relayed updates; they carry nothing new.
        if params.update.ack {
            return;
        }
        if let Err(e) = params.update.validate() {
            warn!(endpoint = %self.endpoint, error = %e, "invalid upstream push");
            return;
        }
        let Some(hub) = self.hub.upgrade() else { return };

        // An upstream delete or forced reset must not clobber a local
        // head ref; the head belongs to the local client.
        if params.ref_name == refhub_types::HEAD_REF
            && (params.update.delete || params.update.force)
        {
            debug!(endpoint = %self.endpoint, "ignoring upstream head reset");
            return;
        }

        // Fan the push into every local repo tracking this upstream repo
        // on this endpoint.
        for local_repo in hub.store().list_repos() {
            let tracks = {
                let guard = hub.store().acquire_repo(&local_repo).await;
                guard.config().remote().is_some_and(|(_, r)| {
                    r.endpoint == self.endpoint
                        && r.repo == params.repo
                        && refhub_types::matches_any(&r.refspecs, &params.ref_name)
                })
            };
            if !tracks {
                continue;
            }
            let target = RefIdentifier::new(&local_repo, &params.ref_name);
            if let Err(e) =
                pipeline::apply_and_broadcast(&hub, &target, &params.update, None).await
            {
                warn!(endpoint = %self.endpoint, %target, error = %e, "upstream push rejected");
            }
        }
    }
}
