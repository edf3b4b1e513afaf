use serde::{Deserialize, Serialize};

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host, optionally prefixed with `tcp://` or `mqtt://`
    pub server: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            server: "tcp://localhost".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            client_id: "hamqtt-client".to_string(),
            keep_alive_secs: 5,
        }
    }
}

impl MqttConfig {
    /// Host part of `server` with any URL scheme and trailing port stripped
    pub fn host(&self) -> &str {
        let host = self
            .server
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.server);
        let host = host.trim_end_matches('/');
        match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => host,
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty()
    }
}
