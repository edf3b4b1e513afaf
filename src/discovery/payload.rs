//! Home Assistant discovery payloads
//!
//! One rendering function per sensor class. Field names match the JSON
//! schema the discovery consumer expects; optional fields are left out of the
//! wire form entirely rather than sent as `null`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entity::{EntityDescriptor, LightOptions, SensorClass};
use super::identity::{DeviceBlock, DeviceIdentity};
use super::topics::Topics;

pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    pub state_topic: String,
    pub unique_id: String,
    pub value_template: String,
    pub device: DeviceBlock,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_command_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_state_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_value_template: Option<String>,
}

/// Discovery message ready to publish
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryMessage {
    pub topic: String,
    pub payload: DiscoveryPayload,
}

impl DiscoveryMessage {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.payload)
    }
}

pub fn render(
    descriptor: &EntityDescriptor,
    identity: &DeviceIdentity,
    topics: &Topics,
) -> DiscoveryMessage {
    let mut payload = DiscoveryPayload {
        name: descriptor.name.clone(),
        device_class: descriptor.class.device_class().map(str::to_string),
        state_topic: topics.state_for(descriptor),
        unique_id: identity.unique_id(&descriptor.name),
        value_template: format!("{{{{ {} }}}}", descriptor.value_template),
        device: identity.device_block(),
        command_topic: None,
        payload_on: None,
        payload_off: None,
        unit_of_measurement: None,
        schema: None,
        effect: None,
        effect_list: None,
        effect_command_topic: None,
        effect_state_topic: None,
        effect_value_template: None,
    };

    match &descriptor.class {
        SensorClass::Switch => render_switch(&mut payload, descriptor, topics),
        SensorClass::Light(options) => render_light(&mut payload, descriptor, options, topics),
        SensorClass::Temperature
        | SensorClass::Humidity
        | SensorClass::BinarySensor
        | SensorClass::Generic => render_measurement(&mut payload, descriptor),
    }

    DiscoveryMessage {
        topic: topics.discovery(descriptor),
        payload,
    }
}

fn render_switch(payload: &mut DiscoveryPayload, descriptor: &EntityDescriptor, topics: &Topics) {
    payload.command_topic = topics.command(descriptor);
    payload.payload_on = Some(PAYLOAD_ON.to_string());
    payload.payload_off = Some(PAYLOAD_OFF.to_string());
}

fn render_light(
    payload: &mut DiscoveryPayload,
    descriptor: &EntityDescriptor,
    options: &LightOptions,
    topics: &Topics,
) {
    payload.command_topic = topics.command(descriptor);
    payload.state_topic = topics.entity_state(descriptor);
    payload.schema = Some("json".to_string());

    // TODO: announce brightness and rgb once the json command schema handles them
    if options.supports_brightness {
        debug!("Brightness for light {} is not announced", descriptor.name);
    }
    if options.supports_rgb {
        debug!("RGB for light {} is not announced", descriptor.name);
    }

    if options.supports_effects {
        payload.effect = Some(true);
        if !options.effect_list.is_empty() {
            payload.effect_list = Some(options.effect_list.clone());
        }
        payload.effect_command_topic = options.effect_command_topic.clone();
        payload.effect_state_topic = options.effect_state_topic.clone();
        payload.effect_value_template = options.effect_value_template.clone();
    }
}

fn render_measurement(payload: &mut DiscoveryPayload, descriptor: &EntityDescriptor) {
    payload.unit_of_measurement = descriptor.unit_of_measurement.clone();
}
