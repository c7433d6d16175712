//! Typed request, result, and notification payload shapes.

use std::collections::BTreeMap;

use refhub_types::{RefState, RefUpdate, RemoteConfiguration};
use serde::{Deserialize, Serialize};

/// Params for `initialize`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializeParams {
    /// Stable client identity. Generated by the server when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Capability flags advertised in the `initialize` result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The server watches refs and pushes `ref/update` notifications.
    #[serde(default)]
    pub watch: bool,
    /// The server can relay updates to an upstream server.
    #[serde(default)]
    pub remotes: bool,
}

/// Result of `initialize`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializeResult {
    pub capabilities: Capabilities,
}

/// Params addressing a whole repo (`repo/info`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoParams {
    pub repo: String,
}

/// Params for `repo/configure`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigureParams {
    pub repo: String,
    /// Replacement remote map; at most one entry is accepted.
    #[serde(default)]
    pub remotes: BTreeMap<String, RemoteConfiguration>,
}

/// Params for `repo/watch`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchParams {
    pub repo: String,
    /// Replaces the connection's previous watch set for this repo.
    #[serde(default)]
    pub refspecs: Vec<String>,
}

/// Params for `ref/info`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefInfoParams {
    pub repo: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// Also try `branch/<ref>` when the exact name does not exist.
    #[serde(default)]
    pub fuzzy: bool,
}

/// Result of `ref/info`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefInfoResult {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub state: RefState,
}

/// One entry in a `ref/list` result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefListItem {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub state: RefState,
    /// Identities of the connections currently watching this ref.
    #[serde(default)]
    pub watchers: Vec<String>,
}

/// Params for `ref/update`, and the payload of the server-to-client
/// `ref/update` notification (where `update.ack` distinguishes the
/// sender's acknowledgement from a fresh observation).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefUpdateParams {
    pub repo: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub update: RefUpdate,
}

/// The downstream push notification shares the request payload shape.
pub type RefUpdateNotification = RefUpdateParams;

/// Params for `debug/log`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DebugLogParams {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}
