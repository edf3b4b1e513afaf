//! Entity descriptors and their sensor classes

/// Discovery component an entity is announced under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Sensor,
    Switch,
    Light,
    BinarySensor,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Sensor => "sensor",
            Component::Switch => "switch",
            Component::Light => "light",
            Component::BinarySensor => "binary_sensor",
        }
    }
}

/// Light capabilities. Brightness and RGB are accepted but not announced yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightOptions {
    pub supports_brightness: bool,
    pub brightness_command_topic: Option<String>,
    pub brightness_scale: Option<u32>,
    pub brightness_state_topic: Option<String>,
    pub brightness_value_template: Option<String>,

    pub supports_rgb: bool,
    pub rgb_command_template: Option<String>,
    pub rgb_command_topic: Option<String>,
    pub rgb_state_topic: Option<String>,
    pub rgb_value_template: Option<String>,

    pub supports_effects: bool,
    pub effect_list: Vec<String>,
    pub effect_command_topic: Option<String>,
    pub effect_state_topic: Option<String>,
    pub effect_value_template: Option<String>,
}

impl LightOptions {
    /// Effect command topic, only when effects are supported
    pub fn effect_command_topic(&self) -> Option<&str> {
        if self.supports_effects {
            self.effect_command_topic.as_deref()
        } else {
            None
        }
    }

    /// Effect state topic, only when effects are supported
    pub fn effect_state_topic(&self) -> Option<&str> {
        if self.supports_effects {
            self.effect_state_topic.as_deref()
        } else {
            None
        }
    }
}

/// Rendering class of an entity
#[derive(Debug, Clone, PartialEq)]
pub enum SensorClass {
    Temperature,
    Humidity,
    Switch,
    Light(LightOptions),
    BinarySensor,
    Generic,
}

impl SensorClass {
    pub fn component(&self) -> Component {
        match self {
            SensorClass::Switch => Component::Switch,
            SensorClass::Light(_) => Component::Light,
            SensorClass::BinarySensor => Component::BinarySensor,
            SensorClass::Temperature | SensorClass::Humidity | SensorClass::Generic => {
                Component::Sensor
            }
        }
    }

    /// `device_class` value of the discovery payload
    pub fn device_class(&self) -> Option<&'static str> {
        match self {
            SensorClass::Temperature => Some("temperature"),
            SensorClass::Humidity => Some("humidity"),
            SensorClass::Switch => Some("switch"),
            SensorClass::Light(_) => Some("light"),
            SensorClass::BinarySensor => Some("binary_sensor"),
            SensorClass::Generic => None,
        }
    }

    /// Whether the entity accepts commands
    pub fn is_actuatable(&self) -> bool {
        matches!(self, SensorClass::Switch | SensorClass::Light(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub name: String,
    pub description: String,
    pub class: SensorClass,
    pub unit_of_measurement: Option<String>,
    /// Template expression without the surrounding `{{ }}`
    pub value_template: String,
    dedicated_state_topic: bool,
}

impl EntityDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        class: SensorClass,
        value_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            class,
            unit_of_measurement: None,
            value_template: value_template.into(),
            dedicated_state_topic: false,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        self.unit_of_measurement = if unit.is_empty() { None } else { Some(unit) };
        self
    }

    /// Publish state on `<root>/<component>/<node>/<name>/state` instead of the shared topic
    pub fn with_dedicated_state_topic(mut self) -> Self {
        self.dedicated_state_topic = true;
        self
    }

    pub fn uses_dedicated_state_topic(&self) -> bool {
        self.dedicated_state_topic || matches!(self.class, SensorClass::Light(_))
    }

    pub fn light_options(&self) -> Option<&LightOptions> {
        match &self.class {
            SensorClass::Light(options) => Some(options),
            _ => None,
        }
    }

    /// Entities announced for every device
    pub fn defaults() -> Vec<EntityDescriptor> {
        vec![
            EntityDescriptor::new(
                "memory",
                "Memory Usage",
                SensorClass::Humidity,
                "value_json.mem_usage",
            )
            .with_unit("%"),
            EntityDescriptor::new(
                "cpu",
                "CPU Usage",
                SensorClass::Humidity,
                "value_json.cpu_usage",
            )
            .with_unit("%"),
            EntityDescriptor::new(
                POWER_ENTITY,
                "Device Power",
                SensorClass::Switch,
                "value_json.power_status",
            ),
            EntityDescriptor::new(
                "temperature",
                "Device Temperature",
                SensorClass::Temperature,
                "value_json.temperature",
            )
            .with_unit("°C"),
        ]
    }
}

/// Name of the built-in power switch
pub const POWER_ENTITY: &str = "power";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_follows_class() {
        assert_eq!(SensorClass::Switch.component(), Component::Switch);
        assert_eq!(
            SensorClass::Light(LightOptions::default()).component(),
            Component::Light
        );
        assert_eq!(SensorClass::BinarySensor.component(), Component::BinarySensor);
        assert_eq!(SensorClass::Humidity.component(), Component::Sensor);
        assert_eq!(SensorClass::Generic.component(), Component::Sensor);
        assert_eq!(Component::BinarySensor.as_str(), "binary_sensor");
    }

    #[test]
    fn only_switch_and_light_are_actuatable() {
        assert!(SensorClass::Switch.is_actuatable());
        assert!(SensorClass::Light(LightOptions::default()).is_actuatable());
        assert!(!SensorClass::Temperature.is_actuatable());
        assert!(!SensorClass::BinarySensor.is_actuatable());
    }

    #[test]
    fn empty_unit_is_dropped() {
        let d = EntityDescriptor::new("x", "X", SensorClass::Generic, "value_json.x").with_unit("");
        assert_eq!(d.unit_of_measurement, None);
    }

    #[test]
    fn lights_always_use_dedicated_state_topic() {
        let light = EntityDescriptor::new(
            "lamp",
            "Lamp",
            SensorClass::Light(LightOptions::default()),
            "value_json.state",
        );
        assert!(light.uses_dedicated_state_topic());
        let sensor = EntityDescriptor::new("x", "X", SensorClass::Generic, "value_json.x");
        assert!(!sensor.uses_dedicated_state_topic());
        assert!(sensor.with_dedicated_state_topic().uses_dedicated_state_topic());
    }

    #[test]
    fn effect_topics_require_effect_support() {
        let mut options = LightOptions {
            effect_command_topic: Some("fx/set".to_string()),
            effect_state_topic: Some("fx/state".to_string()),
            ..LightOptions::default()
        };
        assert_eq!(options.effect_command_topic(), None);
        options.supports_effects = true;
        assert_eq!(options.effect_command_topic(), Some("fx/set"));
        assert_eq!(options.effect_state_topic(), Some("fx/state"));
    }

    #[test]
    fn default_set_order() {
        let names: Vec<_> = EntityDescriptor::defaults()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["memory", "cpu", "power", "temperature"]);
    }
}
