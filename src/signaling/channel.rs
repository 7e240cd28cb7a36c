//! SignalChannel - Wrapper um den Relay-Transport
//!
//! - Senden ist fire-and-forget, Fehler werden nur geloggt
//! - Genau ein Handler pro Nachrichtenart, neue Registrierungen ersetzen alte
//! - Ein Abbruch des Relays wird als eigenes Kanal-Event gemeldet

use super::messages::{RelayFrame, SignalKind, SignalingMessage};
use super::SignalingError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ausgehende Seite des Relays (WebSocket, Loopback, ...)
pub trait RelayTransport: Send + Sync {
    fn send(&self, frame: RelayFrame) -> Result<(), SignalingError>;
}

type MessageHandler = Arc<dyn Fn(SignalingMessage) + Send + Sync>;
type DisconnectHandler = Arc<dyn Fn() + Send + Sync>;

/// Signalisierungskanal zwischen genau zwei Teilnehmern
pub struct SignalChannel {
    transport: RwLock<Option<Arc<dyn RelayTransport>>>,
    handlers: RwLock<HashMap<SignalKind, MessageHandler>>,
    disconnect_handler: RwLock<Option<DisconnectHandler>>,
    connected: AtomicBool,
}

impl SignalChannel {
    /// Erstellt einen Kanal ohne Transport
    ///
    /// Bis [`attach`](Self::attach) aufgerufen wurde, werden Nachrichten verworfen.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            transport: RwLock::new(None),
            handlers: RwLock::new(HashMap::new()),
            disconnect_handler: RwLock::new(None),
            connected: AtomicBool::new(false),
        })
    }

    /// Verbindet den Kanal mit einem Transport
    pub fn attach(&self, transport: Arc<dyn RelayTransport>) {
        *self.transport.write() = Some(transport);
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Sendet eine Nachricht (fire-and-forget)
    pub fn send(&self, message: SignalingMessage) {
        if let Err(e) = self.try_send(&message) {
            tracing::warn!("Dropping {} message: {}", message.kind().event(), e);
        }
    }

    fn try_send(&self, message: &SignalingMessage) -> Result<(), SignalingError> {
        if !self.is_connected() {
            return Err(SignalingError::NotConnected);
        }
        let transport = self
            .transport
            .read()
            .clone()
            .ok_or(SignalingError::NotConnected)?;

        let frame = message.to_frame()?;
        tracing::debug!("Sending {} message", frame.event);
        transport.send(frame)
    }

    /// Registriert den Handler für eine Nachrichtenart (ersetzt einen vorhandenen)
    pub fn on<F>(&self, kind: SignalKind, handler: F)
    where
        F: Fn(SignalingMessage) + Send + Sync + 'static,
    {
        if self.handlers.write().insert(kind, Arc::new(handler)).is_some() {
            tracing::debug!("Replaced {} handler", kind.event());
        }
    }

    /// Registriert den Handler für Verbindungsabbrüche (ersetzt einen vorhandenen)
    pub fn on_disconnect<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.disconnect_handler.write() = Some(Arc::new(handler));
    }

    /// Verarbeitet einen eingehenden Frame vom Transport
    pub fn deliver(&self, frame: RelayFrame) {
        let message = match SignalingMessage::from_frame(&frame) {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::debug!("Ignoring unknown relay event '{}'", frame.event);
                return;
            }
            Err(e) => {
                tracing::warn!("Malformed '{}' payload: {}", frame.event, e);
                return;
            }
        };

        // Handler außerhalb des Locks aufrufen
        let handler = self.handlers.read().get(&message.kind()).cloned();
        match handler {
            Some(handler) => handler(message),
            None => tracing::debug!("No handler for {} message", message.kind().event()),
        }
    }

    /// Meldet, dass der Relay-Transport getrennt wurde
    pub fn notify_disconnected(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Signal channel disconnected");
        self.transport.write().take();

        let handler = self.disconnect_handler.read().clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

impl std::fmt::Debug for SignalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalChannel")
            .field("connected", &self.is_connected())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::messages::SessionDescription;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingTransport {
        frames: Mutex<Vec<RelayFrame>>,
    }

    impl RelayTransport for RecordingTransport {
        fn send(&self, frame: RelayFrame) -> Result<(), SignalingError> {
            self.frames.lock().push(frame);
            Ok(())
        }
    }

    fn offer_frame() -> RelayFrame {
        SignalingMessage::Offer(SessionDescription::offer("v=0"))
            .to_frame()
            .unwrap()
    }

    #[test]
    fn test_later_registration_replaces_handler() {
        let channel = SignalChannel::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        channel.on(SignalKind::Offer, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        channel.on(SignalKind::Offer, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        channel.deliver(offer_frame());

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_before_attach_is_dropped() {
        let channel = SignalChannel::new();
        // darf nicht paniken
        channel.send(SignalingMessage::HangUp);
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_send_uses_transport() {
        let channel = SignalChannel::new();
        let transport = Arc::new(RecordingTransport::default());
        channel.attach(transport.clone());

        channel.send(SignalingMessage::HangUp);

        let frames = transport.frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "hang-up");
    }

    #[test]
    fn test_disconnect_fires_once_and_blocks_sends() {
        let channel = SignalChannel::new();
        let transport = Arc::new(RecordingTransport::default());
        channel.attach(transport.clone());

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        channel.on_disconnect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        channel.notify_disconnected();
        channel.notify_disconnected();
        channel.send(SignalingMessage::HangUp);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(transport.frames.lock().is_empty());
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let channel = SignalChannel::new();
        let called = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&called);
        channel.on(SignalKind::Answer, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        channel.deliver(RelayFrame {
            event: "answer".to_string(),
            payload: serde_json::json!({"sdp": 42}),
        });

        assert_eq!(called.load(Ordering::SeqCst), 0);
    }
}
