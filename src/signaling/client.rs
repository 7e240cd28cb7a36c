//! WebSocket Client für den Relay-Server
//!
//! Verwaltet die WebSocket-Verbindung zum Relay:
//! - Read-Task: Frames parsen und an den [`SignalChannel`] weiterleiten
//! - Write-Task: ausgehende Frames aus einer Queue schreiben
//! - Verbindungsende wird als Disconnect am Kanal gemeldet

use super::channel::{RelayTransport, SignalChannel};
use super::messages::RelayFrame;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone)]
pub enum SignalingError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected to relay")]
    NotConnected,

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Failed to decode message: {0}")]
    Decode(String),
}

/// Größe der ausgehenden Queue
const OUTBOUND_QUEUE_SIZE: usize = 100;

// ============================================================================
// TRANSPORT
// ============================================================================

/// Schreibseite der WebSocket-Verbindung
struct WebSocketTransport {
    tx: mpsc::Sender<String>,
}

impl RelayTransport for WebSocketTransport {
    fn send(&self, frame: RelayFrame) -> Result<(), SignalingError> {
        let text =
            serde_json::to_string(&frame).map_err(|e| SignalingError::Encode(e.to_string()))?;

        // try_send ist non-blocking
        self.tx
            .try_send(text)
            .map_err(|e| SignalingError::SendFailed(e.to_string()))
    }
}

// ============================================================================
// WEBSOCKET RELAY
// ============================================================================

/// Aktive WebSocket-Verbindung zum Relay
///
/// Beim Droppen werden beide Tasks beendet.
pub struct WebSocketRelay {
    url: String,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl WebSocketRelay {
    /// Verbindet mit dem Relay und hängt den Transport an `channel`
    pub async fn connect(url: &str, channel: Arc<SignalChannel>) -> Result<Self, SignalingError> {
        tracing::info!("Connecting to relay: {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| SignalingError::ConnectionFailed(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_SIZE);

        channel.attach(Arc::new(WebSocketTransport { tx }));

        // Read-Task starten
        let inbound = Arc::clone(&channel);
        let read_task = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<RelayFrame>(&text) {
                        Ok(frame) => inbound.deliver(frame),
                        Err(e) => tracing::warn!("Invalid relay frame: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket closed by relay");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            inbound.notify_disconnected();
        });

        // Write-Task starten
        let outbound = Arc::clone(&channel);
        let write_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = write.send(Message::Text(msg)).await {
                    tracing::error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            outbound.notify_disconnected();
        });

        tracing::info!("Connected to relay");

        Ok(Self {
            url: url.to_string(),
            read_task,
            write_task,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for WebSocketRelay {
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

impl std::fmt::Debug for WebSocketRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketRelay")
            .field("url", &self.url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let channel = SignalChannel::new();
        let result = WebSocketRelay::connect("ws://127.0.0.1:1/ws", Arc::clone(&channel)).await;

        assert!(matches!(result, Err(SignalingError::ConnectionFailed(_))));
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_connect_exchanges_frames_with_relay() {
        use crate::signaling::{SignalKind, SignalingMessage};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"event":"hang-up","payload":null}"#.to_string()))
                .await
                .unwrap();
            ws.next().await.unwrap().unwrap()
        });

        let channel = SignalChannel::new();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        channel.on(SignalKind::HangUp, move |message| {
            let _ = seen_tx.send(message);
        });

        let relay = WebSocketRelay::connect(&url, Arc::clone(&channel)).await.unwrap();
        assert_eq!(relay.url(), url);
        assert!(channel.is_connected());

        let received = tokio::time::timeout(std::time::Duration::from_secs(2), seen_rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(SignalingMessage::HangUp));

        channel.send(SignalingMessage::HangUp);
        let frame = server.await.unwrap();
        assert_eq!(
            frame,
            Message::Text(r#"{"event":"hang-up","payload":null}"#.to_string())
        );
    }

    #[test]
    fn test_transport_serializes_frame() {
        let (tx, mut rx) = mpsc::channel(1);
        let transport = WebSocketTransport { tx };

        transport
            .send(RelayFrame {
                event: "hang-up".to_string(),
                payload: serde_json::Value::Null,
            })
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            r#"{"event":"hang-up","payload":null}"#
        );
    }
}
