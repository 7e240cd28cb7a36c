//! Lokale Medien - Tracks und ihre Quelle
//!
//! Die eigentliche Aufnahme (Mikrofon) steckt hinter [`MediaSource`],
//! damit der Controller ohne Audio-Hardware getestet werden kann.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MediaError {
    #[error("No audio input device found")]
    NoInputDevice,

    #[error("Unsupported audio configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Ein lokaler Media-Track
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;

    /// Beendet die Aufnahme endgültig
    fn stop(&self);

    fn is_stopped(&self) -> bool;

    /// Stummschalten ohne den Track zu beenden
    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;
}

/// Von einer [`MediaSource`] erworbener Stream
pub struct LocalMedia {
    stream_id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl LocalMedia {
    pub fn new(stream_id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            stream_id: stream_id.into(),
            tracks,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn set_enabled(&self, enabled: bool) {
        for track in &self.tracks {
            track.set_enabled(enabled);
        }
    }

    /// Stoppt alle Tracks
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl std::fmt::Debug for LocalMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.tracks.iter().map(|t| t.id()).collect();
        f.debug_struct("LocalMedia")
            .field("stream_id", &self.stream_id)
            .field("tracks", &ids)
            .finish()
    }
}

/// Liefert lokale Medien (z.B. Mikrofon)
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<LocalMedia, MediaError>;
}
