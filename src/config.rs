use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::extract::ws::WebSocketUpgrade;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level config, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflexConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Listener and routing section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP/WebSocket listener.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Route the live page is mounted on.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            path: default_path(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_path() -> String {
    "/".to_string()
}

/// WebSocket sizing for live connections. Unset fields keep axum's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub read_buffer_size: Option<usize>,
    pub write_buffer_size: Option<usize>,
    pub max_message_size: Option<usize>,
}

impl TransportConfig {
    /// Apply the configured sizes to a pending upgrade.
    pub fn apply(&self, mut upgrade: WebSocketUpgrade) -> WebSocketUpgrade {
        if let Some(size) = self.read_buffer_size {
            upgrade = upgrade.read_buffer_size(size);
        }
        if let Some(size) = self.write_buffer_size {
            upgrade = upgrade.write_buffer_size(size);
        }
        if let Some(size) = self.max_message_size {
            upgrade = upgrade.max_message_size(size);
        }
        upgrade
    }
}

impl ReflexConfig {
    /// Load config from a TOML file path. Returns None if file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        Ok(Some(config))
    }
}

/// Errors that can occur when loading config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {1}", .0.display())]
    ReadFailed(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config {}: {1}", .0.display())]
    ParseFailed(PathBuf, #[source] toml::de::Error),
}
