use serde::{Deserialize, Serialize};

/// Who this agent claims to be on the broker
///
/// Built once at startup and shared read-only. The node id namespaces every
/// topic and unique id, so two hosts on one broker never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    name: String,
    id: String,
    node_id: String,
    manufacturer: String,
    model: String,
    sw_version: String,
}

/// Device block embedded in every discovery payload of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBlock {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        let name = name.into();
        let id = id.into();
        let node_id = sanitize(&format!("{}{}", name, id));
        Self {
            name,
            id,
            node_id,
            manufacturer: "HaPerfMonitor".to_string(),
            model: "MQTT Monitor".to_string(),
            sw_version: "1.0".to_string(),
        }
    }

    /// Uses the host name as display name, `unknown` when it cannot be read
    pub fn from_host(client_id: impl Into<String>) -> Self {
        let host = sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string());
        Self::new(host, client_id)
    }

    pub fn with_product(
        mut self,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        sw_version: impl Into<String>,
    ) -> Self {
        self.manufacturer = manufacturer.into();
        self.model = model.into();
        self.sw_version = sw_version.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `<deviceName><deviceID>` reduced to characters valid in one topic level
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn unique_id(&self, entity_name: &str) -> String {
        format!("{}_{}", self.id, entity_name)
    }

    pub fn device_block(&self) -> DeviceBlock {
        DeviceBlock {
            identifiers: vec![self.node_id.clone()],
            name: self.name.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            sw_version: self.sw_version.clone(),
        }
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_concatenates_name_and_id() {
        let identity = DeviceIdentity::new("ubuntu", "62c4");
        assert_eq!(identity.node_id(), "ubuntu62c4");
        assert_eq!(identity.unique_id("cpu"), "62c4_cpu");
    }

    #[test]
    fn node_id_is_a_single_topic_level() {
        let identity = DeviceIdentity::new("my host.local", "a/b+#");
        let node = identity.node_id();
        assert!(!node.contains('/'));
        assert!(!node.contains('+'));
        assert!(!node.contains('#'));
        assert_eq!(node, "my_host_locala_b__");
        assert_eq!(identity.name(), "my host.local");
    }

    #[test]
    fn device_block_is_shared_shape() {
        let block = DeviceIdentity::new("box", "01")
            .with_product("Acme", "Agent", "2.0")
            .device_block();
        assert_eq!(block.identifiers, vec!["box01".to_string()]);
        assert_eq!(block.name, "box");
        assert_eq!(block.manufacturer, "Acme");
        assert_eq!(block.model, "Agent");
        assert_eq!(block.sw_version, "2.0");
    }
}
