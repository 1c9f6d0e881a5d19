//! Connection Session
//!
//! One instance of [`run_connection`] owns each upgraded WebSocket. The
//! socket is split into a reader loop (decode frames, hand them to the
//! dispatcher) and a dedicated writer task draining a bounded per-connection
//! delivery queue. Every byte written to a socket originates from that
//! connection's own writer; peers communicate only by enqueuing onto each
//! other's queues.

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatch::ConnContext;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::registry::SessionRegistry;

/// Opaque per-connection identity, used for slot membership checks and log
/// correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    /// Mint a fresh connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a connection's outbound delivery queue.
///
/// Cloned into registry slots so the dispatcher can forward frames to the
/// peer without ever touching the peer's socket directly.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: ConnId,
    tx: mpsc::Sender<ServerFrame>,
}

impl PeerHandle {
    /// Pair a connection id with its queue sender.
    pub fn new(id: ConnId, tx: mpsc::Sender<ServerFrame>) -> Self {
        Self { id, tx }
    }

    /// The owning connection's id.
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Queue a frame for delivery without blocking.
    ///
    /// A full queue drops the frame with a warning (a stalled peer must not
    /// back-pressure the sender's read loop); a closed queue drops it
    /// silently (the peer is already gone).
    pub fn enqueue(&self, frame: ServerFrame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(frame)) => {
                warn!(
                    conn = %self.id,
                    channel = frame.channel(),
                    "delivery queue full, dropping frame"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Drive one WebSocket connection until it closes.
///
/// Returns after teardown: on read error or clean close the connection's
/// room (if any) is closed, the remaining peer notified, and the writer task
/// drained to completion.
pub async fn run_connection(socket: WebSocket, registry: Arc<SessionRegistry>, queue_depth: usize) {
    let conn_id = ConnId::new();
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(queue_depth);
    let handle = PeerHandle::new(conn_id, tx);
    let (mut sink, mut stream) = socket.split();

    info!(conn = %conn_id, "client connected");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match frame.to_json() {
                Ok(text) => text,
                Err(err) => {
                    error!(%err, "failed to serialize outbound frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut ctx = ConnContext::new(handle, registry);
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => match ClientFrame::from_json(&text) {
                Ok(frame) => ctx.handle_frame(frame).await,
                Err(err) => {
                    // Protocol errors keep the connection open.
                    warn!(conn = %conn_id, %err, "undecodable frame, skipping");
                }
            },
            Ok(Message::Binary(_)) => {
                debug!(conn = %conn_id, "binary frame ignored");
            }
            Ok(Message::Close(_)) => {
                debug!(conn = %conn_id, "close frame received");
                break;
            }
            // Ping/pong are handled by the protocol layer.
            Ok(_) => {}
            Err(err) => {
                debug!(conn = %conn_id, %err, "read error");
                break;
            }
        }
    }

    ctx.teardown().await;

    // Teardown removed the registry's sender clones; dropping the context
    // drops the last one, so the writer drains what is queued and exits.
    drop(ctx);
    let _ = writer.await;

    info!(conn = %conn_id, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conn_ids_are_unique() {
        assert_ne!(ConnId::new(), ConnId::new());
    }

    #[tokio::test]
    async fn enqueue_on_full_queue_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = PeerHandle::new(ConnId::new(), tx);

        handle.enqueue(ServerFrame::Retry);
        handle.enqueue(ServerFrame::WinClaim); // dropped, queue depth 1

        assert_eq!(rx.recv().await, Some(ServerFrame::Retry));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn enqueue_on_closed_queue_is_silent() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = PeerHandle::new(ConnId::new(), tx);
        handle.enqueue(ServerFrame::ExitRoom); // must not panic
    }
}
