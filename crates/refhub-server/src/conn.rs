//! Per-connection I/O loop.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use refhub_protocol::{Message, Request, Response, RpcCodec};

use crate::error::ServerError;
use crate::handlers;
use crate::registry::Connection;
use crate::server::Hub;

/// Drive one client connection until it closes.
///
/// Each request runs in its own task so slow or panicking handlers
/// cannot stall the read loop; a recovered panic turns into an
/// internal-error response instead of taking the whole server down.
pub async fn run<S>(hub: Arc<Hub>, stream: S)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, mut write) = tokio::io::split(stream);
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
    let (conn, mut closed_rx) = hub.registry().register(out_tx);
    let seq = conn.seq();
    debug!(seq, "connection accepted");

    // One writer task owns the write half; every response and
    // notification funnels through its queue in order.
    let mut writer_closed = closed_rx.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = writer_closed.changed() => {
                    if changed.is_err() || *writer_closed.borrow() {
                        break;
                    }
                }
                maybe_msg = out_rx.recv() => {
                    let Some(msg) = maybe_msg else { break };
                    let frame = match RpcCodec::encode(&msg) {
                        Ok(frame) => frame,
                        Err(err) => {
                            warn!(%err, "failed to encode outbound frame");
                            continue;
                        }
                    };
                    if write.write_all(&frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut lines = BufReader::new(read).lines();
    loop {
        let line = tokio::select! {
            changed = closed_rx.changed() => {
                if changed.is_err() || *closed_rx.borrow() {
                    break;
                }
                continue;
            }
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                debug!(seq, %err, "read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match RpcCodec::decode_line(&line) {
            Ok(Message::Request(req)) => {
                handle_request(Arc::clone(&hub), Arc::clone(&conn), req);
            }
            Ok(Message::Response(_)) => {
                debug!(seq, "ignoring unsolicited response frame");
            }
            Err(err) => {
                warn!(seq, %err, "dropping malformed frame");
            }
        }
    }

    hub.registry().unregister(seq);
    conn.close();
    writer.abort();
    debug!(seq, "connection closed");
}

fn handle_request(hub: Arc<Hub>, conn: Arc<Connection>, req: Request) {
    let timeout = hub.config().notify_timeout();
    tokio::spawn(async move {
        let method = req.method.clone();
        let joined = tokio::spawn(handlers::dispatch(
            Arc::clone(&hub),
            Arc::clone(&conn),
            req.method,
            req.params,
        ))
        .await;

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_err) if join_err.is_panic() => {
                warn!(%method, "handler panicked");
                Err(ServerError::Internal(format!("panic handling {method}")))
            }
            Err(_) => Err(ServerError::Internal(format!("{method} was cancelled"))),
        };

        match (req.id, outcome) {
            (Some(id), Ok(result)) => {
                let msg = Message::Response(Response::success(id, result));
                if conn.notify(msg, timeout).await.is_err() {
                    debug!(seq = conn.seq(), "response dropped, connection gone");
                }
            }
            (Some(id), Err(err)) => {
                let msg = Message::Response(Response::failure(id, err.to_rpc_error()));
                if conn.notify(msg, timeout).await.is_err() {
                    debug!(seq = conn.seq(), "error response dropped, connection gone");
                }
            }
            (None, Ok(_)) => {}
            (None, Err(err)) => {
                debug!(%method, %err, "notification failed");
            }
        }
    });
}
