//! Configuration.
//!
//! Runtime settings only cover where to listen/connect and what to call the
//! player. Track shape, physics constants and network rates are compile-time
//! constants in their own modules.

use serde::{Deserialize, Serialize};

/// Port used when `PORT` is unset or unparsable.
pub const DEFAULT_PORT: u16 = 5000;

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RacerConfig {
    /// Server listen address, e.g. `0.0.0.0:5000`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// WebSocket endpoint the client connects to.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Display name sent with updates (client only). `None` keeps the
    /// server-assigned name.
    #[serde(default)]
    pub nickname: Option<String>,
}

fn default_listen_addr() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}

fn default_server_url() -> String {
    format!("ws://127.0.0.1:{DEFAULT_PORT}/ws")
}

impl Default for RacerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            server_url: default_server_url(),
            nickname: None,
        }
    }
}

impl RacerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Listens on `0.0.0.0:$PORT` when `PORT` holds a valid port number.
    pub fn with_port_env(self) -> Self {
        self.with_port(std::env::var("PORT").ok().as_deref())
    }

    fn with_port(mut self, port: Option<&str>) -> Self {
        if let Some(port) = port.and_then(|p| p.trim().parse::<u16>().ok()) {
            self.listen_addr = format!("0.0.0.0:{port}");
        }
        self
    }
}
