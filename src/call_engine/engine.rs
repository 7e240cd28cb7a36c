//! WebRTC Negotiation Engine
//!
//! Adapter von [`NegotiationEngine`] auf `webrtc::RTCPeerConnection`.
//!
//! Hinweis: Die lokalen RTP-Tracks werden erst mit Opus-Samples befüllt,
//! sobald ein Encoder verfügbar ist.

use super::audio::{CHANNELS, SAMPLE_RATE};
use super::media::MediaTrack;
use super::negotiation::{
    EngineEvent, EngineEventSink, NegotiationEngine, NegotiationError, NegotiationHandle,
};
use crate::config::IceServerConfig;
use crate::signaling::{IceCandidate, SdpType, SessionDescription};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;

/// Stream-ID der lokalen RTP-Tracks
const LOCAL_STREAM_ID: &str = "audio-call";

// ============================================================================
// ICE SERVER CONFIGURATION
// ============================================================================

/// Standard STUN Server Konfiguration
pub fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![
        // Google STUN Server (kostenlos, für ~90% der Verbindungen)
        IceServerConfig {
            urls: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
                "stun:stun2.l.google.com:19302".to_string(),
            ],
            username: String::new(),
            credential: String::new(),
        },
    ]
}

// ============================================================================
// ENGINE
// ============================================================================

/// Erzeugt WebRTC Peer Connections
#[derive(Debug, Clone)]
pub struct RtcNegotiationEngine {
    ice_servers: Vec<RTCIceServer>,
}

impl RtcNegotiationEngine {
    pub fn new(ice_servers: &[IceServerConfig]) -> Self {
        let ice_servers = ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone(),
                credential: server.credential.clone(),
                ..Default::default()
            })
            .collect();

        Self { ice_servers }
    }

    /// Erstellt eine neue Peer Connection
    async fn create_peer_connection(&self) -> Result<Arc<RTCPeerConnection>, NegotiationError> {
        // Media Engine mit Opus konfigurieren
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| NegotiationError::WebRTC(e.to_string()))?;

        // Interceptors für RTCP, NACK etc.
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| NegotiationError::WebRTC(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };

        let pc = api
            .new_peer_connection(config)
            .await
            .map_err(|e| NegotiationError::WebRTC(e.to_string()))?;

        Ok(Arc::new(pc))
    }

    /// Peer Connection mit lokalen Tracks und registrierten Handlern
    async fn connect(
        &self,
        tracks: &[Arc<dyn MediaTrack>],
        events: &EngineEventSink,
    ) -> Result<Connection, NegotiationError> {
        let pc = self.create_peer_connection().await?;

        for track in tracks {
            let rtp_track = Arc::new(TrackLocalStaticRTP::new(
                RTCRtpCodecCapability {
                    mime_type: "audio/opus".to_string(),
                    clock_rate: SAMPLE_RATE,
                    channels: CHANNELS,
                    ..Default::default()
                },
                track.id().to_string(),
                LOCAL_STREAM_ID.to_string(),
            ));

            if let Err(e) = pc
                .add_track(rtp_track as Arc<dyn TrackLocal + Send + Sync>)
                .await
            {
                let _ = pc.close().await;
                return Err(NegotiationError::WebRTC(e.to_string()));
            }
        }

        let live = Arc::new(AtomicBool::new(true));
        register_handlers(&pc, &live, events.clone());

        Ok(Connection { pc, live })
    }
}

impl Default for RtcNegotiationEngine {
    fn default() -> Self {
        Self::new(&default_ice_servers())
    }
}

#[async_trait]
impl NegotiationEngine for RtcNegotiationEngine {
    async fn open(
        &self,
        tracks: Vec<Arc<dyn MediaTrack>>,
        events: EngineEventSink,
    ) -> Result<Arc<dyn NegotiationHandle>, NegotiationError> {
        let connection = self.connect(&tracks, &events).await?;
        tracing::info!("Peer connection opened with {} local track(s)", tracks.len());

        Ok(Arc::new(RtcHandle {
            engine: self.clone(),
            tracks,
            events,
            connection: Mutex::new(connection),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Registriert die Event Handler der Peer Connection
///
/// Events werden nur gemeldet, solange `live` gesetzt ist.
fn register_handlers(pc: &Arc<RTCPeerConnection>, live: &Arc<AtomicBool>, events: EngineEventSink) {
    // Connection State Handler
    let sink = events.clone();
    let is_live = Arc::clone(live);
    pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
        tracing::info!("Peer connection state: {:?}", s);
        if s == RTCPeerConnectionState::Failed && is_live.load(Ordering::SeqCst) {
            sink.emit(EngineEvent::ConnectionFailed);
        }
        Box::pin(async {})
    }));

    // ICE Candidate Handler
    let sink = events.clone();
    let is_live = Arc::clone(live);
    pc.on_ice_candidate(Box::new(move |candidate| {
        if let Some(c) = candidate {
            if is_live.load(Ordering::SeqCst) {
                match c.to_json() {
                    Ok(init) => sink.emit(EngineEvent::LocalCandidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_mline_index: init.sdp_mline_index,
                    })),
                    Err(e) => tracing::warn!("Failed to serialize local candidate: {}", e),
                }
            }
        }
        Box::pin(async {})
    }));

    // Track Handler (für eingehendes Audio)
    let is_live = Arc::clone(live);
    pc.on_track(Box::new(move |track, _, _| {
        let track_id = track.id().to_string();
        tracing::info!("Received track {}: {:?}", track_id, track.codec());
        if is_live.load(Ordering::SeqCst) {
            events.emit(EngineEvent::RemoteTrack { track_id });
        }
        Box::pin(async {})
    }));
}

// ============================================================================
// HANDLE
// ============================================================================

/// Aktuelle Peer Connection eines Handles
struct Connection {
    pc: Arc<RTCPeerConnection>,
    live: Arc<AtomicBool>,
}

impl Connection {
    /// Unterdrückt weitere Events und schließt im Hintergrund
    fn retire(&self) {
        self.live.store(false, Ordering::SeqCst);

        let pc = Arc::clone(&self.pc);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = pc.close().await {
                        tracing::warn!("Failed to close peer connection: {}", e);
                    }
                });
            }
            Err(_) => tracing::warn!("No runtime available, peer connection dropped unclosed"),
        }
    }
}

/// Eine WebRTC Peer Connection
///
/// `rollback` ersetzt die Verbindung durch eine frische mit denselben Tracks,
/// da webrtc-rs kein lokales Rollback aus `have-local-offer` annimmt.
pub struct RtcHandle {
    engine: RtcNegotiationEngine,
    tracks: Vec<Arc<dyn MediaTrack>>,
    events: EngineEventSink,
    connection: Mutex<Connection>,
    closed: AtomicBool,
}

impl RtcHandle {
    fn ensure_open(&self) -> Result<(), NegotiationError> {
        if self.is_closed() {
            Err(NegotiationError::Closed)
        } else {
            Ok(())
        }
    }

    fn pc(&self) -> Arc<RTCPeerConnection> {
        Arc::clone(&self.connection.lock().pc)
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, NegotiationError> {
    match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
    }
    .map_err(|e| NegotiationError::InvalidSdp(e.to_string()))
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription, NegotiationError> {
    match desc.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(desc.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(desc.sdp)),
        other => Err(NegotiationError::InvalidSdp(format!(
            "unexpected description type {:?}",
            other
        ))),
    }
}

#[async_trait]
impl NegotiationHandle for RtcHandle {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        self.ensure_open()?;
        let offer = self
            .pc()
            .create_offer(None)
            .await
            .map_err(|e| NegotiationError::WebRTC(e.to_string()))?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        self.ensure_open()?;
        let answer = self
            .pc()
            .create_answer(None)
            .await
            .map_err(|e| NegotiationError::WebRTC(e.to_string()))?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError> {
        self.ensure_open()?;
        self.pc()
            .set_local_description(to_rtc(desc)?)
            .await
            .map_err(|e| NegotiationError::Rejected(e.to_string()))
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.ensure_open()?;
        self.pc()
            .set_remote_description(to_rtc(desc)?)
            .await
            .map_err(|e| NegotiationError::Rejected(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.ensure_open()?;
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };

        self.pc()
            .add_ice_candidate(init)
            .await
            .map_err(|e| NegotiationError::InvalidCandidate(e.to_string()))
    }

    async fn rollback(&self) -> Result<(), NegotiationError> {
        self.ensure_open()?;
        if self.pc().pending_local_description().await.is_none() {
            return Err(NegotiationError::Rejected(
                "no local offer to roll back".to_string(),
            ));
        }

        let fresh = self.engine.connect(&self.tracks, &self.events).await?;

        let mut connection = self.connection.lock();
        // close() während des Verbindungsaufbaus
        if self.is_closed() {
            drop(connection);
            fresh.retire();
            return Err(NegotiationError::Closed);
        }
        let discarded = std::mem::replace(&mut *connection, fresh);
        drop(connection);

        discarded.retire();
        tracing::info!("Local offer discarded, peer connection replaced");
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.connection.lock().retire();
        tracing::info!("Peer connection closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for RtcHandle {
    fn drop(&mut self) {
        self.close();
    }
}
