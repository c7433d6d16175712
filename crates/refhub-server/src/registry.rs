//! Connected clients and their watch subscriptions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use refhub_protocol::Message;
use refhub_types::{refspec, RefIdentifier};

use crate::error::{ServerError, ServerResult};

/// Mutable per-connection session state, behind the connection's lock.
#[derive(Default)]
struct ConnState {
    client_id: Option<String>,
    /// repo -> refspecs, replaced wholesale by each `repo/watch`.
    watches: HashMap<String, Vec<String>>,
    shutting_down: bool,
    closed: bool,
}

/// One accepted client connection.
///
/// The hub addresses connections by `seq`; the `client_id` chosen at
/// `initialize` is informational and surfaced in `ref/list` output.
pub struct Connection {
    seq: u64,
    outbound: mpsc::Sender<Message>,
    closed_tx: watch::Sender<bool>,
    state: StdMutex<ConnState>,
}

/// Outcome of a fast-path notification attempt.
pub enum NotifyAttempt {
    Sent,
    /// The queue is full; the caller should fall back to [`Connection::notify`].
    Busy(Message),
    Closed,
}

impl Connection {
    fn new(seq: u64, outbound: mpsc::Sender<Message>) -> (Arc<Self>, watch::Receiver<bool>) {
        let (closed_tx, closed_rx) = watch::channel(false);
        let conn = Arc::new(Self {
            seq,
            outbound,
            closed_tx,
            state: StdMutex::new(ConnState::default()),
        });
        (conn, closed_rx)
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ConnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client_id(&self) -> Option<String> {
        self.state().client_id.clone()
    }

    /// Record the identity chosen at `initialize`. Fails the second time.
    pub fn initialize(&self, client_id: String) -> ServerResult<()> {
        let mut st = self.state();
        if st.client_id.is_some() {
            return Err(ServerError::AlreadyInitialized);
        }
        st.client_id = Some(client_id);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state().client_id.is_some()
    }

    /// Replace this connection's watch set for `repo`.
    pub fn set_watch(&self, repo: String, refspecs: Vec<String>) {
        self.state().watches.insert(repo, refspecs);
    }

    /// Whether a broadcast for `target` should reach this connection.
    pub fn is_watching(&self, target: &RefIdentifier) -> bool {
        let st = self.state();
        if st.closed {
            return false;
        }
        st.watches
            .get(&target.repo)
            .is_some_and(|specs| refspec::matches_any(specs, &target.ref_name))
    }

    pub fn mark_shutting_down(&self) {
        self.state().shutting_down = true;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }

    /// Queue a message without waiting.
    pub fn try_notify(&self, msg: Message) -> NotifyAttempt {
        if self.state().closed {
            return NotifyAttempt::Closed;
        }
        match self.outbound.try_send(msg) {
            Ok(()) => NotifyAttempt::Sent,
            Err(mpsc::error::TrySendError::Full(msg)) => NotifyAttempt::Busy(msg),
            Err(mpsc::error::TrySendError::Closed(_)) => NotifyAttempt::Closed,
        }
    }

    /// Queue a message, waiting up to `timeout` for a slow consumer.
    pub async fn notify(&self, msg: Message, timeout: Duration) -> ServerResult<()> {
        match tokio::time::timeout(timeout, self.outbound.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ServerError::Internal(format!(
                "connection {} closed while notifying",
                self.seq
            ))),
            Err(_) => Err(ServerError::Internal(format!(
                "connection {} stalled past the notify timeout",
                self.seq
            ))),
        }
    }

    /// Mark closed and wake the writer so it drains and exits.
    pub fn close(&self) {
        self.state().closed = true;
        if self.closed_tx.send(true).is_err() {
            // Writer already gone.
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

struct RegistryInner {
    next_seq: u64,
    conns: HashMap<u64, Arc<Connection>>,
}

/// All live connections, addressable for broadcast fan-out.
pub struct ConnectionRegistry {
    inner: StdMutex<RegistryInner>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: StdMutex::new(RegistryInner {
                next_seq: 1,
                conns: HashMap::new(),
            }),
        }
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a new connection, returning it and its close signal.
    pub fn register(&self, outbound: mpsc::Sender<Message>) -> (Arc<Connection>, watch::Receiver<bool>) {
        let mut inner = self.inner();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let (conn, closed_rx) = Connection::new(seq, outbound);
        inner.conns.insert(seq, Arc::clone(&conn));
        (conn, closed_rx)
    }

    /// Remove a connection. Idempotent: fan-out may drop a stalled
    /// watcher before its read loop unregisters it on exit.
    pub fn unregister(&self, seq: u64) {
        if self.inner().conns.remove(&seq).is_none() {
            debug!(seq, "connection already unregistered");
        }
    }

    pub fn len(&self) -> usize {
        self.inner().conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().conns.is_empty()
    }

    /// Snapshot of every live connection.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.inner().conns.values().cloned().collect()
    }

    /// Connections whose watch set matches `target`.
    pub fn watchers(&self, target: &RefIdentifier) -> Vec<Arc<Connection>> {
        self.inner()
            .conns
            .values()
            .filter(|c| c.is_watching(target))
            .cloned()
            .collect()
    }
}
