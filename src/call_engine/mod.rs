//! Call Engine Module - Anrufsteuerung, WebRTC und Audio
//!
//! Dieses Modul verwaltet:
//! - Den Lebenszyklus eines Anrufs (CallController)
//! - WebRTC Peer Connections hinter dem NegotiationEngine-Trait
//! - Audio Capture (Mikrofon)

mod audio;
mod controller;
mod engine;
mod glare;
mod guard;
mod media;
mod negotiation;
mod session;

pub use audio::{CpalMicrophone, MicrophoneTrack, CHANNELS, SAMPLE_RATE};
pub use controller::{CallController, CallError, CallEvent, CallHandle, EndReason};
pub use engine::{default_ice_servers, RtcHandle, RtcNegotiationEngine};
pub use glare::{resolve_glare, GlareResolution};
pub use guard::ResourceGuard;
pub use media::{LocalMedia, MediaError, MediaSource, MediaTrack};
pub use negotiation::{
    EngineEvent, EngineEventSink, NegotiationEngine, NegotiationError, NegotiationHandle,
};
pub use session::{CallSession, CallState, RemoteDescriptionState, SessionId};
