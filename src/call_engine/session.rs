//! Call Session - Zustand eines einzelnen Anrufs
//!
//! Eine Session wird nie wiederbelebt: nach `Ended` legt der Controller
//! eine neue an.

use super::guard::ResourceGuard;
use super::media::LocalMedia;
use super::negotiation::NegotiationHandle;
use crate::signaling::{IceCandidate, SdpType, SessionDescription};
use std::collections::VecDeque;
use std::sync::Arc;

pub type SessionId = u64;

// ============================================================================
// CALL STATE
// ============================================================================

/// Aktueller Status eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Noch keine lokalen Medien
    Idle,
    /// Mikrofon und Peer Connection bereit
    AwaitingLocalMedia,
    /// Offer gesendet, warte auf Answer
    OfferSent,
    /// Eingehender Anruf wartet auf Annahme
    OfferReceived,
    /// Answer gesendet
    AnswerSent,
    /// Anruf aktiv
    Connected,
    /// Anruf beendet, alle Ressourcen freigegeben
    Ended,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        self == CallState::Ended
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::AwaitingLocalMedia => "awaiting-local-media",
            CallState::OfferSent => "offer-sent",
            CallState::OfferReceived => "offer-received",
            CallState::AnswerSent => "answer-sent",
            CallState::Connected => "connected",
            CallState::Ended => "ended",
        }
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fortschritt der Remote Description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDescriptionState {
    Unset,
    Applying(SdpType),
    Applied(SdpType),
}

/// Operation auf dem Negotiation Handle, läuft seriell
#[derive(Debug, Clone)]
pub(crate) enum Operation {
    MakeOffer,
    MakeAnswer,
    ApplyRemote {
        description: SessionDescription,
        rollback: bool,
    },
    AddCandidates(Vec<IceCandidate>),
}

// ============================================================================
// CALL SESSION
// ============================================================================

pub struct CallSession {
    pub(crate) id: SessionId,
    pub(crate) state: CallState,
    pub(crate) local_media: Option<LocalMedia>,
    pub(crate) negotiation: Option<Arc<dyn NegotiationHandle>>,
    /// Offer, das vor der Peer Connection eintraf
    pub(crate) pending_remote_description: Option<SessionDescription>,
    /// Candidates vor der Remote Description, in Ankunftsreihenfolge
    pub(crate) pending_candidates: Vec<IceCandidate>,
    pub(crate) remote_description: RemoteDescriptionState,
    pub(crate) preparing: bool,
    pub(crate) making_offer: bool,
    pub(crate) making_answer: bool,
    pub(crate) operations: VecDeque<Operation>,
    pub(crate) operation_in_flight: bool,
}

impl CallSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: CallState::Idle,
            local_media: None,
            negotiation: None,
            pending_remote_description: None,
            pending_candidates: Vec::new(),
            remote_description: RemoteDescriptionState::Unset,
            preparing: false,
            making_offer: false,
            making_answer: false,
            operations: VecDeque::new(),
            operation_in_flight: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn local_media(&self) -> Option<&LocalMedia> {
        self.local_media.as_ref()
    }

    pub fn has_negotiation(&self) -> bool {
        self.negotiation.is_some()
    }

    pub fn pending_candidates(&self) -> &[IceCandidate] {
        &self.pending_candidates
    }

    pub fn remote_description(&self) -> RemoteDescriptionState {
        self.remote_description
    }

    /// Reiht einen Candidate ein, je nach Stand der Remote Description
    pub(crate) fn push_remote_candidate(&mut self, candidate: IceCandidate) {
        if !matches!(self.remote_description, RemoteDescriptionState::Applied(_)) {
            self.pending_candidates.push(candidate);
            return;
        }

        // An eine noch wartende Candidate-Operation anhängen
        if let Some(Operation::AddCandidates(batch)) = self.operations.back_mut() {
            batch.push(candidate);
        } else {
            self.operations
                .push_back(Operation::AddCandidates(vec![candidate]));
        }
    }

    /// Gibt die gepufferten Candidates nach der Remote Description frei
    pub(crate) fn flush_pending_candidates(&mut self) {
        if self.pending_candidates.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending_candidates);
        tracing::debug!("Flushing {} buffered ICE candidate(s)", batch.len());
        self.operations.push_back(Operation::AddCandidates(batch));
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        ResourceGuard::teardown(self);
    }
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("local_media", &self.local_media)
            .field("has_negotiation", &self.has_negotiation())
            .field("pending_candidates", &self.pending_candidates.len())
            .field("remote_description", &self.remote_description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_buffer_until_remote_applied() {
        let mut session = CallSession::new(1);

        session.push_remote_candidate(IceCandidate::new("a"));
        session.push_remote_candidate(IceCandidate::new("b"));

        assert_eq!(session.pending_candidates().len(), 2);
        assert!(session.operations.is_empty());
    }

    #[test]
    fn test_flush_keeps_arrival_order() {
        let mut session = CallSession::new(1);
        session.push_remote_candidate(IceCandidate::new("a"));
        session.push_remote_candidate(IceCandidate::new("b"));

        session.remote_description = RemoteDescriptionState::Applied(SdpType::Answer);
        session.flush_pending_candidates();
        session.push_remote_candidate(IceCandidate::new("c"));

        assert!(session.pending_candidates().is_empty());
        match session.operations.pop_front() {
            Some(Operation::AddCandidates(batch)) => {
                let names: Vec<_> = batch.iter().map(|c| c.candidate.as_str()).collect();
                assert_eq!(names, ["a", "b", "c"]);
            }
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = CallSession::new(7);
        assert_eq!(session.id(), 7);
        assert_eq!(session.state(), CallState::Idle);
        assert!(!session.has_negotiation());
        assert!(session.local_media().is_none());
    }
}
