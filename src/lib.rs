//! Audio Call - 1:1 P2P Voice Calls über einen Relay-Kanal
//!
//! Eine Anrufsteuerung mit:
//! - WebSocket-Relay als Signaling-Kanal (offer, answer, ice-candidate, hang-up)
//! - WebRTC für P2P Audio-Kommunikation
//! - Einer expliziten Zustandsmaschine pro Anruf mit zentralem Teardown

pub mod call_engine;
pub mod config;
pub mod signaling;

pub use call_engine::{
    CallController, CallError, CallEvent, CallHandle, CallState, CpalMicrophone, EndReason,
    RtcNegotiationEngine,
};
pub use config::{CallConfig, ConfigError};
pub use signaling::{LoopbackRelay, SignalChannel, SignalingError, WebSocketRelay};

use tracing_subscriber::EnvFilter;

/// Logging-Default, wenn `RUST_LOG` nicht gesetzt ist
const DEFAULT_LOG_FILTER: &str = "audio_call=debug,webrtc=warn";

/// Initialisiert das Logging
///
/// Mehrfach aufrufbar, ein bereits installierter Subscriber bleibt bestehen.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
    {
        tracing::info!("Initializing Audio Call...");
    }
}
