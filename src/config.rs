//! Konfiguration
//!
//! Reihenfolge: Defaults, dann optionale JSON-Datei aus `CALL_CONFIG`,
//! dann einzelne Umgebungsvariablen.

use crate::call_engine::default_ice_servers;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Default Relay URL (kann über `SIGNALING_URL` überschrieben werden)
pub const DEFAULT_SIGNALING_URL: &str = "ws://localhost:2000/ws";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid signaling URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// STUN/TURN Server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub credential: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// WebSocket URL des Relays
    pub signaling_url: String,
    pub ice_servers: Vec<IceServerConfig>,
    /// Stabile eigene ID, entscheidet bei gleichzeitigen Offers
    pub local_peer_id: Option<String>,
    pub remote_peer_id: Option<String>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            signaling_url: DEFAULT_SIGNALING_URL.to_string(),
            ice_servers: default_ice_servers(),
            local_peer_id: None,
            remote_peer_id: None,
        }
    }
}

impl CallConfig {
    /// Lädt die Konfiguration aus der Umgebung
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("CALL_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(url) = std::env::var("SIGNALING_URL") {
            config.signaling_url = url;
        }
        if let Ok(id) = std::env::var("CALL_PEER_ID") {
            config.local_peer_id = Some(id);
        }
        if let Ok(id) = std::env::var("CALL_REMOTE_PEER_ID") {
            config.remote_peer_id = Some(id);
        }
        if let Ok(url) = std::env::var("TURN_URL") {
            config.add_turn_server(
                url,
                std::env::var("TURN_USERNAME").unwrap_or_default(),
                std::env::var("TURN_CREDENTIAL").unwrap_or_default(),
            );
        }

        config.signaling_url = normalize_signaling_url(&config.signaling_url)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fügt optionale TURN-Server Credentials hinzu
    pub fn add_turn_server(&mut self, url: String, username: String, credential: String) {
        self.ice_servers.push(IceServerConfig {
            urls: vec![url],
            username,
            credential,
        });
    }
}

/// Prüft die Relay URL, `http(s)` wird zu `ws(s)`
pub fn normalize_signaling_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot change scheme".to_string()))?;

    Ok(url.to_string())
}
