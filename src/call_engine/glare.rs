//! Tie-Break bei gleichzeitigen Offers
//!
//! Die lexikographisch kleinere Peer-ID bleibt Offerer, die andere Seite
//! verwirft ihr eigenes Offer. Ohne konfigurierte IDs wird ein kollidierendes
//! Offer ignoriert.

/// Reaktion auf ein eingehendes Offer während eines eigenen Offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlareResolution {
    /// Eigenes Offer behalten, eingehendes ignorieren
    KeepLocalOffer,
    /// Eigenes Offer zurückrollen, eingehendes annehmen
    YieldToRemote,
}

pub fn resolve_glare(local_peer_id: Option<&str>, remote_peer_id: Option<&str>) -> GlareResolution {
    match (local_peer_id, remote_peer_id) {
        (Some(local), Some(remote)) if local > remote => GlareResolution::YieldToRemote,
        (Some(local), Some(remote)) if local == remote => {
            tracing::warn!("Local and remote peer id are both '{}', keeping local offer", local);
            GlareResolution::KeepLocalOffer
        }
        _ => GlareResolution::KeepLocalOffer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_id_keeps_offer() {
        assert_eq!(
            resolve_glare(Some("alice"), Some("bob")),
            GlareResolution::KeepLocalOffer
        );
        assert_eq!(
            resolve_glare(Some("bob"), Some("alice")),
            GlareResolution::YieldToRemote
        );
    }

    #[test]
    fn test_without_ids_incoming_offer_is_ignored() {
        assert_eq!(resolve_glare(None, None), GlareResolution::KeepLocalOffer);
        assert_eq!(resolve_glare(Some("bob"), None), GlareResolution::KeepLocalOffer);
    }
}
