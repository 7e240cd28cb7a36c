//! Signaling Module - Relay-Kanal zwischen den zwei Teilnehmern
//!
//! Dieses Modul verwaltet:
//! - Die vier Signaling-Nachrichten (offer, answer, ice-candidate, hang-up)
//! - Den SignalChannel mit Handler-Registrierung
//! - Transporte: WebSocket-Client und In-Process Loopback
//!

mod channel;
mod client;
mod loopback;
mod messages;

pub use channel::{RelayTransport, SignalChannel};
pub use client::{SignalingError, WebSocketRelay};
pub use loopback::LoopbackRelay;
pub use messages::*;
