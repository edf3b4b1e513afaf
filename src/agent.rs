//! Agent lifecycle with statum typestate
//!
//! Wires the configured collaborators into one session and exposes the
//! `Configured → Running → Stopped` lifecycle the binary drives. Entities can
//! be registered in any phase before the agent stops.

use std::sync::Arc;

use statum::{machine, state};
use tracing::info;

use crate::config::AgentConfig;
use crate::discovery::{DeviceIdentity, EntityDescriptor, Topics};
use crate::dispatch::CommandHandler;
use crate::mqtt::RumqttTransport;
use crate::session::{SessionManager, SessionSettings, StateHandler};
use crate::system::{SystemMetrics, SystemSuspend};

pub type HostSession = SessionManager<RumqttTransport, SystemMetrics>;

#[state]
#[derive(Debug, Clone)]
pub enum AgentPhase {
    Configured, // Collaborators built, nothing connected
    Running,    // Session loops spawned
    Stopped,    // Offline announced, transport closed
}

#[machine]
pub struct Agent<S: AgentPhase> {
    config: AgentConfig,
    session: HostSession,
}

impl<S: AgentPhase> Agent<S> {
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn session(&self) -> &HostSession {
        &self.session
    }

    /// Adds a custom entity; see [`SessionManager::register`]
    pub async fn register_sensor(
        &self,
        descriptor: EntityDescriptor,
        command_handler: Option<CommandHandler>,
        state_handler: Option<StateHandler>,
    ) {
        self.session
            .register(descriptor, command_handler, state_handler)
            .await;
    }
}

impl Agent<Configured> {
    pub fn from_config(config: AgentConfig) -> Self {
        let discovery = &config.discovery;
        let identity = DeviceIdentity::from_host(config.mqtt.client_id.clone()).with_product(
            discovery.manufacturer.clone(),
            discovery.model.clone(),
            discovery.sw_version.clone(),
        );
        let topics = Topics::new(discovery.prefix.clone(), &identity);
        info!(
            "Configured agent {} for broker {}:{}",
            identity.node_id(),
            config.mqtt.host(),
            config.mqtt.port
        );

        let transport = RumqttTransport::new(&config.mqtt, topics.last_will());
        let metrics = SystemMetrics::new(config.system.disk_mount.clone());
        let settings = SessionSettings::from(&config);
        let session = SessionManager::new(
            identity,
            topics,
            transport,
            metrics,
            Arc::new(SystemSuspend),
            settings,
        );

        Self::new(config, session)
    }

    pub fn start(self) -> Agent<Running> {
        self.session.start();
        self.transition()
    }
}

impl Agent<Running> {
    pub async fn shutdown(self) -> Agent<Stopped> {
        info!("Shutting down agent");
        self.session.stop().await;
        self.transition()
    }
}
