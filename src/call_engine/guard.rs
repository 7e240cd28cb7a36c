//! Resource Guard - zentraler Teardown
//!
//! Jeder Übergang nach `Ended` läuft hier durch, auch beim Droppen.

use super::session::{CallSession, CallState, RemoteDescriptionState};

pub struct ResourceGuard;

impl ResourceGuard {
    /// Schließt die Peer Connection, stoppt alle lokalen Tracks und leert die Puffer
    ///
    /// Gibt `false` zurück, wenn die Session bereits beendet war.
    pub fn teardown(session: &mut CallSession) -> bool {
        if session.state.is_terminal() {
            return false;
        }

        if let Some(handle) = session.negotiation.take() {
            handle.close();
        }

        if let Some(media) = session.local_media.take() {
            media.stop_all();
        }

        session.pending_remote_description = None;
        session.pending_candidates.clear();
        session.operations.clear();
        session.operation_in_flight = false;
        session.remote_description = RemoteDescriptionState::Unset;
        session.preparing = false;
        session.making_offer = false;
        session.making_answer = false;
        session.state = CallState::Ended;

        tracing::info!("Session {} torn down", session.id);
        true
    }
}
