//! Negotiation Engine - Schnittstelle zur Transport-Aushandlung
//!
//! Ein [`NegotiationHandle`] entspricht genau einer Peer Connection.
//! Die Engine puffert nichts: ICE Candidates vor der Remote Description
//! hält der Controller zurück.

use super::media::MediaTrack;
use crate::signaling::{IceCandidate, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone)]
pub enum NegotiationError {
    #[error("WebRTC error: {0}")]
    WebRTC(String),

    #[error("Invalid SDP: {0}")]
    InvalidSdp(String),

    #[error("Description rejected: {0}")]
    Rejected(String),

    #[error("Invalid ICE candidate: {0}")]
    InvalidCandidate(String),

    #[error("Peer connection closed")]
    Closed,
}

// ============================================================================
// ENGINE EVENTS
// ============================================================================

/// Events die ein Handle zurückmeldet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Lokal gefundener ICE Candidate, muss an den Peer
    LocalCandidate(IceCandidate),
    /// Eingehender Media-Track vom Peer
    RemoteTrack { track_id: String },
    /// ICE/DTLS Verbindung fehlgeschlagen
    ConnectionFailed,
}

/// Empfänger für [`EngineEvent`]s eines Handles
#[derive(Clone)]
pub struct EngineEventSink {
    inner: Arc<dyn Fn(EngineEvent) + Send + Sync>,
}

impl EngineEventSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn emit(&self, event: EngineEvent) {
        (self.inner)(event)
    }
}

impl std::fmt::Debug for EngineEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineEventSink").finish_non_exhaustive()
    }
}

// ============================================================================
// TRAITS
// ============================================================================

/// Eine einzelne Peer Connection
#[async_trait]
pub trait NegotiationHandle: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError>;

    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    /// Verwirft ein noch nicht beantwortetes lokales Offer
    async fn rollback(&self) -> Result<(), NegotiationError>;

    /// Schließt die Verbindung
    ///
    /// Mehrfach aufrufbar. Nach der Rückkehr werden keine Events mehr gemeldet.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Erzeugt Handles
#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    /// Erstellt eine Peer Connection mit den lokalen Tracks und registrierten Listenern
    async fn open(
        &self,
        tracks: Vec<Arc<dyn MediaTrack>>,
        events: EngineEventSink,
    ) -> Result<Arc<dyn NegotiationHandle>, NegotiationError>;
}
