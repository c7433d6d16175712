//! Server configuration, loadable from a TOML file.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4288))
}

fn default_notify_timeout_secs() -> u64 {
    20
}

fn default_max_connections() -> usize {
    1024
}

/// Configuration for a hub server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: SocketAddr,

    /// Private servers expose `repo/list` and are expected to serve a
    /// single trusted client. Public servers reject it.
    pub is_private: bool,

    /// How long a slow watcher may stall a notification before the hub
    /// drops its connection.
    pub notify_timeout_secs: u64,

    /// Maximum concurrently accepted connections.
    pub max_connections: usize,

    /// Repos created at startup. Creation fails if one already exists,
    /// which only happens with duplicates in this list.
    pub repos: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            is_private: false,
            notify_timeout_secs: default_notify_timeout_secs(),
            max_connections: default_max_connections(),
            repos: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::InvalidConfig(e.to_string()))
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The notify timeout as a [`Duration`].
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}
