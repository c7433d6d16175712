//! Server extensions.
//!
//! An extension opts into hub hook points by returning capability views
//! from [`Extension`]. The hub only calls the hooks an extension
//! actually exposes, so adding a hook point never forces every
//! extension to grow a no-op method.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use refhub_types::{RefIdentifier, RefUpdate, RepoConfiguration};

use crate::error::ServerResult;
use crate::server::Hub;

/// Runs once when the server starts, before the listener accepts.
#[async_trait]
pub trait Starter: Send + Sync {
    async fn start(&self, hub: &Arc<Hub>) -> ServerResult<()>;
}

/// Handles methods the core dispatcher does not know.
///
/// Returning `None` declines the method and lets the next extension
/// try; `Some` settles the request.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, method: &str, params: Option<&Value>) -> Option<ServerResult<Value>>;
}

/// Observes repo configuration changes before they are persisted.
///
/// An error aborts the configuration update. Hooks that already ran
/// are not rolled back.
#[async_trait]
pub trait RepoConfigurer: Send + Sync {
    async fn configure_repo(
        &self,
        repo: &str,
        old: &RepoConfiguration,
        new: &RepoConfiguration,
    ) -> ServerResult<()>;
}

/// Reacts to a ref update after it has been applied to the store but
/// before it is broadcast. An error fails the update for the sender;
/// the store is not rolled back.
#[async_trait]
pub trait RefUpdateReactor: Send + Sync {
    async fn after_ref_update(
        &self,
        target: &RefIdentifier,
        update: &RefUpdate,
    ) -> ServerResult<()>;
}

/// A named bundle of hook capabilities.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn starter(&self) -> Option<&dyn Starter> {
        None
    }

    fn method_handler(&self) -> Option<&dyn MethodHandler> {
        None
    }

    fn repo_configurer(&self) -> Option<&dyn RepoConfigurer> {
        None
    }

    fn ref_update_reactor(&self) -> Option<&dyn RefUpdateReactor> {
        None
    }
}

/// The ordered set of extensions installed on a hub. Hooks run in
/// registration order.
#[derive(Default)]
pub struct ExtensionRegistry {
    exts: Vec<Arc<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ext: Arc<dyn Extension>) {
        self.exts.push(ext);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Extension>> {
        self.exts.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.exts.is_empty()
    }
}
