use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::discovery::topics::DEFAULT_PREFIX;
use crate::mqtt::config::MqttConfig;
use crate::session::{Backoff, SessionSettings};

const CONFIG_DIR: &str = ".config/hamqtt";
const CONFIG_FILE: &str = "config.toml";

/// Contents of the agent's TOML configuration file
///
/// Every section and key is optional; missing ones take their defaults.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub mqtt: MqttConfig,
    pub discovery: DiscoveryConfig,
    pub session: SessionConfig,
    pub system: SystemConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub prefix: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            manufacturer: "HaPerfMonitor".to_string(),
            model: "MQTT Monitor".to_string(),
            sw_version: "1.0".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub publish_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub backoff_floor_ms: u64,
    pub backoff_ceiling_ms: u64,
    pub linger_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 2000,
            connect_timeout_ms: 5000,
            backoff_floor_ms: 5000,
            backoff_ceiling_ms: 60000,
            linger_ms: 250,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SystemConfig {
    /// Mount point whose usage is reported as disk usage
    pub disk_mount: PathBuf,
    pub cpu_window_ms: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            disk_mount: PathBuf::from("/"),
            cpu_window_ms: 500,
        }
    }
}

impl From<&AgentConfig> for SessionSettings {
    fn from(config: &AgentConfig) -> Self {
        let session = &config.session;
        let settings = Self {
            publish_interval: Duration::from_millis(session.publish_interval_ms),
            connect_timeout: Duration::from_millis(session.connect_timeout_ms),
            backoff: Backoff {
                floor: Duration::from_millis(session.backoff_floor_ms),
                ceiling: Duration::from_millis(session.backoff_ceiling_ms),
            },
            linger: Duration::from_millis(session.linger_ms),
            cpu_window: Duration::from_millis(config.system.cpu_window_ms),
            ..SessionSettings::default()
        };
        let clamped = settings.clone().clamped();
        if clamped != settings {
            warn!("Session timing out of range, using {:?}", clamped);
        }
        clamped
    }
}

impl AgentConfig {
    /// `~/.config/hamqtt/config.toml`
    pub fn default_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Loads `path`, first writing a default file when there is none
    pub async fn ensure_default(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            info!("Creating default configuration at {}", path.display());
            let config = Self::default();
            config.save(path).await?;
            return Ok(config);
        }
        Self::load(path).await
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
