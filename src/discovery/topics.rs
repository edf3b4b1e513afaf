use super::entity::{Component, EntityDescriptor, POWER_ENTITY};
use super::identity::DeviceIdentity;
use crate::mqtt::{LastWill, QoS};

pub const DEFAULT_PREFIX: &str = "homeassistant";
pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// Topic layout of one device under a discovery prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    root: String,
    node: String,
}

impl Topics {
    pub fn new(root: impl Into<String>, identity: &DeviceIdentity) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
            node: identity.node_id().to_string(),
        }
    }

    fn entity_base(&self, component: Component, entity: &str) -> String {
        format!("{}/{}/{}/{}", self.root, component.as_str(), self.node, entity)
    }

    pub fn discovery(&self, descriptor: &EntityDescriptor) -> String {
        format!(
            "{}/config",
            self.entity_base(descriptor.class.component(), &descriptor.name)
        )
    }

    /// Shared telemetry topic
    pub fn state(&self) -> String {
        format!("{}/sensor/{}/state", self.root, self.node)
    }

    pub fn availability(&self) -> String {
        format!("{}/sensor/{}/status", self.root, self.node)
    }

    pub fn entity_state(&self, descriptor: &EntityDescriptor) -> String {
        format!(
            "{}/state",
            self.entity_base(descriptor.class.component(), &descriptor.name)
        )
    }

    /// State topic a descriptor announces and is published on
    pub fn state_for(&self, descriptor: &EntityDescriptor) -> String {
        if descriptor.uses_dedicated_state_topic() {
            self.entity_state(descriptor)
        } else {
            self.state()
        }
    }

    /// Command topic, present only for actuatable classes
    pub fn command(&self, descriptor: &EntityDescriptor) -> Option<String> {
        descriptor.class.is_actuatable().then(|| {
            format!(
                "{}/set",
                self.entity_base(descriptor.class.component(), &descriptor.name)
            )
        })
    }

    pub fn power_command(&self) -> String {
        format!("{}/set", self.entity_base(Component::Switch, POWER_ENTITY))
    }

    /// Will announcing the device offline after an unclean disconnect
    pub fn last_will(&self) -> LastWill {
        LastWill {
            topic: self.availability(),
            payload: OFFLINE.to_string(),
            qos: QoS::AtLeastOnce,
            retain: true,
        }
    }
}
