//! Message Types für das Signaling-Protokoll
//!
//! Vier Nachrichten laufen über den Relay-Kanal: `offer`, `answer`,
//! `ice-candidate` und `hang-up`. Die Payloads entsprechen den
//! Browser-Objekten `RTCSessionDescriptionInit` und `RTCIceCandidateInit`.

use super::SignalingError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// PAYLOAD TYPES
// ============================================================================

/// Art einer Session Description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// SDP Offer oder Answer, wird opak durchgereicht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE Candidate im Browser-Format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

// ============================================================================
// SIGNALING MESSAGES
// ============================================================================

/// Die vier Nachrichtenarten (gleichzeitig Schlüssel für Handler)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    HangUp,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::Offer,
        SignalKind::Answer,
        SignalKind::IceCandidate,
        SignalKind::HangUp,
    ];

    /// Event-Name auf dem Relay-Kanal
    pub fn event(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
            SignalKind::HangUp => "hang-up",
        }
    }

    pub fn from_event(event: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.event() == event)
    }
}

/// Alle Nachrichten zwischen den beiden Teilnehmern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingMessage {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
    HangUp,
}

impl SignalingMessage {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalingMessage::Offer(_) => SignalKind::Offer,
            SignalingMessage::Answer(_) => SignalKind::Answer,
            SignalingMessage::IceCandidate(_) => SignalKind::IceCandidate,
            SignalingMessage::HangUp => SignalKind::HangUp,
        }
    }

    /// Baut den Frame für den Relay-Kanal
    pub fn to_frame(&self) -> Result<RelayFrame, SignalingError> {
        let payload = match self {
            SignalingMessage::Offer(desc) | SignalingMessage::Answer(desc) => {
                serde_json::to_value(desc)
            }
            SignalingMessage::IceCandidate(candidate) => serde_json::to_value(candidate),
            SignalingMessage::HangUp => Ok(Value::Null),
        }
        .map_err(|e| SignalingError::Encode(e.to_string()))?;

        Ok(RelayFrame {
            event: self.kind().event().to_string(),
            payload,
        })
    }

    /// Parst einen eingehenden Frame
    ///
    /// Unbekannte Events ergeben `Ok(None)`. Eine Description, deren `type`
    /// nicht zum Event passt, ist ein Fehler.
    pub fn from_frame(frame: &RelayFrame) -> Result<Option<Self>, SignalingError> {
        let Some(kind) = SignalKind::from_event(&frame.event) else {
            return Ok(None);
        };

        let message = match kind {
            SignalKind::Offer => {
                let desc = Self::description(&frame.payload, SdpType::Offer)?;
                SignalingMessage::Offer(desc)
            }
            SignalKind::Answer => {
                let desc = Self::description(&frame.payload, SdpType::Answer)?;
                SignalingMessage::Answer(desc)
            }
            SignalKind::IceCandidate => {
                let candidate = IceCandidate::deserialize(&frame.payload)
                    .map_err(|e| SignalingError::Decode(e.to_string()))?;
                SignalingMessage::IceCandidate(candidate)
            }
            SignalKind::HangUp => SignalingMessage::HangUp,
        };

        Ok(Some(message))
    }

    fn description(payload: &Value, expected: SdpType) -> Result<SessionDescription, SignalingError> {
        let desc = SessionDescription::deserialize(payload)
            .map_err(|e| SignalingError::Decode(e.to_string()))?;

        if desc.sdp_type != expected {
            return Err(SignalingError::Decode(format!(
                "expected {:?} description, got {:?}",
                expected, desc.sdp_type
            )));
        }
        Ok(desc)
    }
}

// ============================================================================
// WIRE FRAME
// ============================================================================

/// Ein Event auf dem Relay-Kanal: `{"event": "...", "payload": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}
