//! # Discovery
//!
//! Entity model, topic layout and the auto-discovery payloads that let a
//! Home Assistant instance build UI controls for this host without manual
//! configuration.
//!
//! ```text
//! EntityRegistry ──► payload::render ──► (topic, retained JSON) ──► Transport
//!        ▲
//!   register()
//! ```

pub mod entity;
pub mod identity;
pub mod payload;
pub mod registry;
pub mod topics;

pub use entity::{Component, EntityDescriptor, LightOptions, SensorClass, POWER_ENTITY};
pub use identity::{DeviceBlock, DeviceIdentity};
pub use payload::{render, DiscoveryMessage, DiscoveryPayload};
pub use registry::EntityRegistry;
pub use topics::Topics;
