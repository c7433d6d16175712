//! The refhub server: a stateful hub that keeps the authoritative
//! state of watched refs, applies client updates, fans them out to
//! watchers, and optionally relays them to an upstream server.
//!
//! The pieces, roughly in the order a request meets them:
//!
//! - [`server::Server`] accepts TCP connections and hands each to
//!   [`conn::run`].
//! - [`handlers`] dispatches decoded requests, enforcing the
//!   initialize-first lifecycle.
//! - [`pipeline`] applies `ref/update` submissions to the store and
//!   drives [`fanout`] and the upstream relay.
//! - [`remote::RemoteManager`] owns proxy connections to upstream
//!   servers and feeds their pushes back into the pipeline.
//! - [`ext`] lets embedders hook startup, unknown methods, repo
//!   configuration, and applied updates.

pub mod config;
pub mod conn;
pub mod error;
pub mod ext;
pub mod fanout;
pub mod handlers;
pub mod pipeline;
pub mod registry;
pub mod remote;
pub mod repoconfig;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use ext::{Extension, ExtensionRegistry};
pub use server::{Hub, Server};
