//! The hub: shared server state and the TCP accept loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use refhub_store::MemoryStore;

use crate::config::ServerConfig;
use crate::conn;
use crate::error::ServerResult;
use crate::ext::ExtensionRegistry;
use crate::registry::ConnectionRegistry;
use crate::remote::RemoteManager;

/// Shared state behind every connection: the ref store, the live
/// connection registry, installed extensions, and upstream proxies.
pub struct Hub {
    config: ServerConfig,
    store: MemoryStore,
    registry: ConnectionRegistry,
    extensions: ExtensionRegistry,
    remotes: RemoteManager,
    update_order: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    shutting_down: AtomicBool,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Build a hub and pre-create any configured repos.
    pub fn new(config: ServerConfig, extensions: ExtensionRegistry) -> ServerResult<Arc<Self>> {
        let hub = Arc::new_cyclic(|weak| Self {
            config,
            store: MemoryStore::new(),
            registry: ConnectionRegistry::new(),
            extensions,
            remotes: RemoteManager::new(weak.clone()),
            update_order: StdMutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        });
        for repo in &hub.config.repos {
            refhub_types::validate_repo_name(repo)?;
            hub.store.create_repo(repo)?;
        }
        Ok(hub)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn remotes(&self) -> &RemoteManager {
        &self.remotes
    }

    /// The repo's broadcast order lock.
    ///
    /// Held across apply-plus-broadcast and across a `repo/watch`
    /// replay, so a new watcher's snapshot and the first live update
    /// it sees never interleave. Always taken before any ref lock of
    /// the same repo.
    pub fn update_order(&self, repo: &str) -> Arc<AsyncMutex<()>> {
        let mut order = self
            .update_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            order
                .entry(repo.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }
}

/// A hub bound to a listener and ready to accept connections.
pub struct Server {
    hub: Arc<Hub>,
    listener: TcpListener,
}

impl Server {
    /// Bind the configured address.
    pub async fn bind(hub: Arc<Hub>) -> ServerResult<Self> {
        let listener = TcpListener::bind(hub.config().bind_addr).await?;
        Ok(Self { hub, listener })
    }

    /// Wrap an already-bound listener. Tests bind port 0 and read the
    /// address back from here.
    pub fn with_listener(hub: Arc<Hub>, listener: TcpListener) -> Self {
        Self { hub, listener }
    }

    pub fn local_addr(&self) -> ServerResult<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Run startup hooks, then accept connections until shutdown.
    pub async fn serve(self) -> ServerResult<()> {
        for ext in self.hub.extensions().iter() {
            if let Some(starter) = ext.starter() {
                starter.start(&self.hub).await?;
                info!(extension = ext.name(), "extension started");
            }
        }

        info!(addr = %self.listener.local_addr()?, "listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            if self.hub.is_shutting_down() {
                break;
            }
            if self.hub.registry().len() >= self.hub.config().max_connections {
                warn!(%peer, "connection limit reached, refusing");
                drop(stream);
                continue;
            }
            let hub = Arc::clone(&self.hub);
            tokio::spawn(async move {
                conn::run(hub, stream).await;
            });
        }
        Ok(())
    }
}
