//! The hub's RPC method surface.
//!
//! Anything not listed here is offered to registered extensions in order,
//! and fails with `MethodNotFound` when all of them decline.

/// Must be the first call on every connection.
pub const INITIALIZE: &str = "initialize";
/// No-op acknowledgement after `initialize`.
pub const INITIALIZED: &str = "initialized";
/// Repo configuration lookup; creates the repo record if absent.
pub const REPO_INFO: &str = "repo/info";
/// Apply a repo configuration change and reconcile upstream connections.
pub const REPO_CONFIGURE: &str = "repo/configure";
/// Register a watch set and replay current matching ref states.
pub const REPO_WATCH: &str = "repo/watch";
/// List all known repo paths (private servers only).
pub const REPO_LIST: &str = "repo/list";
/// List a repo's refs with state and watcher identities.
pub const REF_LIST: &str = "ref/list";
/// Exact or fuzzy ref lookup.
pub const REF_INFO: &str = "ref/info";
/// Apply and broadcast a ref update. Also the server-to-client
/// notification method for downstream pushes.
pub const REF_UPDATE: &str = "ref/update";
/// Liveness check; returns the literal `"pong"`.
pub const PING: &str = "ping";
/// Echo text into the server log; gated by an env toggle.
pub const DEBUG_LOG: &str = "debug/log";
/// Mark the connection as shutting down.
pub const SHUTDOWN: &str = "shutdown";
/// Close the connection.
pub const EXIT: &str = "exit";
