//! In-Process Relay für zwei Kanäle
//!
//! Verbindet zwei [`SignalChannel`]s direkt miteinander. Nachrichten werden
//! synchron und in Sendereihenfolge zugestellt. Wird für Tests und lokale
//! Demos ohne Signaling-Server verwendet.

use super::channel::{RelayTransport, SignalChannel};
use super::messages::RelayFrame;
use super::SignalingError;
use std::sync::{Arc, Weak};

struct LoopbackTransport {
    peer: Weak<SignalChannel>,
}

impl RelayTransport for LoopbackTransport {
    fn send(&self, frame: RelayFrame) -> Result<(), SignalingError> {
        let peer = self.peer.upgrade().ok_or(SignalingError::NotConnected)?;
        peer.deliver(frame);
        Ok(())
    }
}

/// Ein verbundenes Kanalpaar
pub struct LoopbackRelay {
    a: Arc<SignalChannel>,
    b: Arc<SignalChannel>,
}

impl LoopbackRelay {
    pub fn pair() -> Self {
        let a = SignalChannel::new();
        let b = SignalChannel::new();

        a.attach(Arc::new(LoopbackTransport {
            peer: Arc::downgrade(&b),
        }));
        b.attach(Arc::new(LoopbackTransport {
            peer: Arc::downgrade(&a),
        }));

        Self { a, b }
    }

    pub fn a(&self) -> Arc<SignalChannel> {
        Arc::clone(&self.a)
    }

    pub fn b(&self) -> Arc<SignalChannel> {
        Arc::clone(&self.b)
    }

    /// Simuliert einen Verbindungsabbruch auf beiden Seiten
    pub fn disconnect(&self) {
        self.a.notify_disconnected();
        self.b.notify_disconnected();
    }
}
