//! The connection-owning client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use refhub_protocol::{
    methods, InitializeParams, InitializeResult, Message, RefUpdateParams, Request, RequestId,
    Response, RpcCodec, WatchParams,
};
use refhub_types::{RefIdentifier, RefUpdate};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::error::{ClientError, ClientResult};

/// Receives server-initiated requests and notifications.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Called for every inbound message that is not a response to one of
    /// our requests. `ref/update` pushes arrive here.
    async fn notify(&self, method: &str, params: Option<Value>);
}

/// Handler that drops every notification.
pub struct NullHandler;

#[async_trait]
impl NotificationHandler for NullHandler {
    async fn notify(&self, _method: &str, _params: Option<Value>) {}
}

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Response>>>>;

/// One client connection to a refhub server.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Client {
    next_id: AtomicU64,
    pending: PendingMap,
    outbound: mpsc::Sender<Message>,
    closed_rx: watch::Receiver<bool>,
}

impl Client {
    /// Connect to a server endpoint ("host:port") over TCP.
    pub async fn connect(
        endpoint: &str,
        handler: Arc<dyn NotificationHandler>,
    ) -> ClientResult<Self> {
        let stream = TcpStream::connect(endpoint).await?;
        Ok(Self::from_stream(stream, handler))
    }

    /// Drive a client over an already-established bidirectional stream.
    pub fn from_stream<S>(stream: S, handler: Arc<dyn NotificationHandler>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, mut write) = tokio::io::split(stream);
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
        let (closed_tx, closed_rx) = watch::channel(false);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        // Serialized send queue: one writer task owns the write half.
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let frame = match RpcCodec::encode(&msg) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(%err, "failed to encode outbound frame");
                        continue;
                    }
                };
                if write.write_all(&frame).await.is_err() {
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            let mut lines = BufReader::new(read).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match RpcCodec::decode_line(&line) {
                            Ok(Message::Response(resp)) => {
                                let waiter = reader_pending.lock().await.remove(&resp.id);
                                match waiter {
                                    Some(tx) => {
                                        let _ = tx.send(resp);
                                    }
                                    None => {
                                        tracing::debug!(id = resp.id, "response with no waiter")
                                    }
                                }
                            }
                            Ok(Message::Request(req)) => {
                                handler.notify(&req.method, req.params).await;
                            }
                            Err(err) => tracing::warn!(%err, "dropping malformed frame"),
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::debug!(%err, "read failed, closing");
                        break;
                    }
                }
            }
            // Wake request waiters: dropping their senders surfaces Closed.
            reader_pending.lock().await.clear();
            let _ = closed_tx.send(true);
        });

        Self {
            next_id: AtomicU64::new(1),
            pending,
            outbound: out_tx,
            closed_rx,
        }
    }

    /// Send a request and await its response.
    pub async fn request(&self, method: &str, params: Option<Value>) -> ClientResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        let sent = self
            .outbound
            .send(Message::Request(Request::call(id, method, params)))
            .await;
        if sent.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::Closed);
        }
        let resp = rx.await.map_err(|_| ClientError::Closed)?;
        if let Some(err) = resp.error {
            return Err(ClientError::Rpc(err));
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> ClientResult<()> {
        self.outbound
            .send(Message::Request(Request::notification(method, params)))
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// `initialize` with the given client identity.
    pub async fn initialize(&self, id: Option<String>) -> ClientResult<InitializeResult> {
        let params = serde_json::to_value(InitializeParams { id })
            .map_err(|e| refhub_protocol::ProtocolError::Serialization(e.to_string()))?;
        let result = self.request(methods::INITIALIZE, Some(params)).await?;
        serde_json::from_value(result)
            .map_err(|e| refhub_protocol::ProtocolError::Deserialization(e.to_string()).into())
    }

    /// `repo/watch` with the given refspecs.
    pub async fn watch(&self, repo: &str, refspecs: Vec<String>) -> ClientResult<()> {
        let params = serde_json::to_value(WatchParams {
            repo: repo.to_string(),
            refspecs,
        })
        .map_err(|e| refhub_protocol::ProtocolError::Serialization(e.to_string()))?;
        self.request(methods::REPO_WATCH, Some(params)).await?;
        Ok(())
    }

    /// `ref/update` for one target ref.
    pub async fn ref_update(&self, target: &RefIdentifier, update: RefUpdate) -> ClientResult<()> {
        let params = serde_json::to_value(RefUpdateParams {
            repo: target.repo.clone(),
            ref_name: target.ref_name.clone(),
            update,
        })
        .map_err(|e| refhub_protocol::ProtocolError::Serialization(e.to_string()))?;
        self.request(methods::REF_UPDATE, Some(params)).await?;
        Ok(())
    }

    /// `ping`, returning the server's literal reply.
    pub async fn ping(&self) -> ClientResult<String> {
        let result = self.request(methods::PING, None).await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    /// Returns `true` once the connection has closed.
    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    /// Resolves when the connection closes (or immediately if it already
    /// has).
    pub async fn wait_closed(&self) {
        let mut rx = self.closed_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}
