//! Per-repo configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypeError};

/// Settings for one upstream remote of a repo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfiguration {
    /// Endpoint address of the upstream server (host:port).
    pub endpoint: String,
    /// Name of the repo on the upstream server.
    pub repo: String,
    /// Refspecs the local repo subscribes to on the upstream.
    #[serde(default)]
    pub refspecs: Vec<String>,
}

/// Per-repo configuration, principally the remote map.
///
/// The current policy permits at most one remote per repo, and no two
/// remotes of the same repo may share an endpoint; [`validate`](Self::validate)
/// enforces both before a configuration is applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfiguration {
    /// Remote name ("origin", ...) to remote settings.
    #[serde(default)]
    pub remotes: BTreeMap<String, RemoteConfiguration>,
}

impl RepoConfiguration {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.remotes.len() > 1 {
            return Err(TypeError::InvalidConfig(format!(
                "at most one remote is supported, got {}",
                self.remotes.len()
            )));
        }
        let mut endpoints: Vec<&str> = self
            .remotes
            .values()
            .map(|r| r.endpoint.as_str())
            .collect();
        endpoints.sort_unstable();
        let before = endpoints.len();
        endpoints.dedup();
        if endpoints.len() != before {
            return Err(TypeError::InvalidConfig(
                "two remotes share one endpoint".into(),
            ));
        }
        for (name, remote) in &self.remotes {
            if remote.endpoint.is_empty() {
                return Err(TypeError::InvalidConfig(format!(
                    "remote {name:?} has an empty endpoint"
                )));
            }
            if remote.repo.is_empty() {
                return Err(TypeError::InvalidConfig(format!(
                    "remote {name:?} has an empty repo"
                )));
            }
        }
        Ok(())
    }

    /// The single configured remote, if any.
    pub fn remote(&self) -> Option<(&String, &RemoteConfiguration)> {
        self.remotes.iter().next()
    }

    /// An independent copy sharing no data with `self`.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }
}
