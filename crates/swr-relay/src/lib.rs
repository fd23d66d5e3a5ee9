//! Best-effort websocket progress relay.
//!
//! One outbound connection per job, opened with a single attempt. A failed
//! or absent connection degrades the job to silent mode instead of aborting
//! it. Sends are fire-and-forget: the pipeline enqueues an envelope without
//! blocking and a background task owns the socket, so a stalled relay never
//! stalls tool-output classification. `close` drops the queue and waits
//! (bounded) for the task, so outstanding sends flush before the socket
//! goes away.

use std::time::Duration;

use futures_util::SinkExt;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use swr_models::RelayEnvelope;

/// Default bound on the connect handshake. An endpoint that accepts TCP but
/// never completes the websocket upgrade must not stall the job.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `close` waits for queued sends to flush.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Progress relay handle owned by exactly one job.
pub struct ProgressRelay {
    key: String,
    index: Option<u32>,
    tx: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
}

impl ProgressRelay {
    /// Attempt the relay connection. Any failure (or no endpoint at all)
    /// yields an inert relay; the job proceeds without live progress.
    pub async fn connect(endpoint: Option<&str>, key: impl Into<String>, index: Option<u32>) -> Self {
        Self::connect_with_timeout(endpoint, key, index, CONNECT_TIMEOUT).await
    }

    /// Like [`ProgressRelay::connect`] with an explicit handshake deadline.
    pub async fn connect_with_timeout(
        endpoint: Option<&str>,
        key: impl Into<String>,
        index: Option<u32>,
        deadline: Duration,
    ) -> Self {
        let key = key.into();
        let Some(endpoint) = endpoint else {
            return Self::inert(key, index);
        };

        match tokio::time::timeout(deadline, connect_async(endpoint)).await {
            Ok(Ok((socket, _))) => {
                info!(endpoint, "connected progress relay");
                let (tx, rx) = mpsc::unbounded_channel();
                let task = tokio::spawn(relay_task(socket, rx));
                Self {
                    key,
                    index,
                    tx: Some(tx),
                    task: Some(task),
                }
            }
            Ok(Err(e)) => {
                warn!(endpoint, "could not connect progress relay, continuing without live progress: {e}");
                Self::inert(key, index)
            }
            Err(_) => {
                warn!(endpoint, "progress relay connect timed out, continuing without live progress");
                Self::inert(key, index)
            }
        }
    }

    fn inert(key: String, index: Option<u32>) -> Self {
        Self {
            key,
            index,
            tx: None,
            task: None,
        }
    }

    /// Whether a connection was established.
    pub fn is_connected(&self) -> bool {
        self.tx.is_some()
    }

    /// Enqueue one progress payload, wrapped as `{payload, key, index?}`.
    /// Never blocks and never fails the pipeline.
    pub fn send(&self, payload: &Value) {
        let Some(tx) = &self.tx else {
            return;
        };
        let envelope = RelayEnvelope {
            payload,
            key: &self.key,
            index: self.index,
        };
        match serde_json::to_string(&envelope) {
            Ok(text) => {
                let _ = tx.send(text);
            }
            Err(e) => debug!("could not serialize progress envelope: {e}"),
        }
    }

    /// Scoped release: flush queued sends (bounded) and close the socket.
    /// Invoked exactly once per job, on every exit path.
    pub async fn close(mut self) {
        drop(self.tx.take());
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, task).await.is_err() {
                warn!("progress relay did not flush in time, abandoning outstanding sends");
            }
        }
    }
}

/// Background task owning the socket. Send failures flip the relay into a
/// drain-and-discard mode; the pipeline never observes them.
async fn relay_task(
    mut socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let mut degraded = false;
    while let Some(text) = rx.recv().await {
        if degraded {
            continue;
        }
        if let Err(e) = socket.send(Message::Text(text)).await {
            warn!("progress relay send failed, continuing without live progress: {e}");
            degraded = true;
        }
    }
    let _ = socket.close(None).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_absent_endpoint_is_inert() {
        let relay = ProgressRelay::connect(None, "abc", None).await;
        assert!(!relay.is_connected());
        relay.send(&serde_json::json!({"type": "PROGRESS"}));
        relay.close().await;
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_degrades() {
        let relay = ProgressRelay::connect(Some("ws://127.0.0.1:9"), "abc", None).await;
        assert!(!relay.is_connected());
        relay.send(&serde_json::json!({"type": "PROGRESS"}));
        relay.close().await;
    }

    #[tokio::test]
    async fn test_stalled_handshake_degrades() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept the TCP connection but never answer the websocket upgrade.
        let _blackhole = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let endpoint = format!("ws://{addr}");
        let relay = tokio::time::timeout(
            Duration::from_secs(5),
            ProgressRelay::connect_with_timeout(
                Some(&endpoint),
                "abc",
                None,
                Duration::from_millis(100),
            ),
        )
        .await
        .expect("connect must give up at its deadline");
        assert!(!relay.is_connected());
        relay.send(&serde_json::json!({"type": "PROGRESS"}));
        relay.close().await;
    }

    #[tokio::test]
    async fn test_envelopes_delivered_before_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut received = Vec::new();
            while let Some(Ok(msg)) = socket.next().await {
                if let Message::Text(text) = msg {
                    received.push(text);
                }
            }
            received
        });

        let endpoint = format!("ws://{addr}");
        let relay = ProgressRelay::connect(Some(&endpoint), "abc", Some(1)).await;
        assert!(relay.is_connected());
        relay.send(&serde_json::json!({"type": "PROGRESS", "pct": 50}));
        relay.send(&serde_json::json!({"type": "PROGRESS_STAGE", "stage": "Joining"}));
        relay.close().await;

        let received = server.await.unwrap();
        assert_eq!(received.len(), 2);
        let first: Value = serde_json::from_str(&received[0]).unwrap();
        assert_eq!(first["key"], "abc");
        assert_eq!(first["index"], 1);
        assert_eq!(first["payload"]["pct"], 50);
    }
}
