//! # MQTT Transport Module
//!
//! Everything that touches the broker connection itself. The rest of the
//! crate only sees the [`transport::Transport`] trait, so the session logic
//! can be exercised without a broker.
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker address and credentials
//! ├── error.rs            - TransportError
//! ├── message_manager.rs  - Inbound message representation
//! ├── mqtt_handler.rs     - rumqttc implementation of Transport
//! └── transport.rs        - Transport trait and last-will declaration
//! ```
//!
//! Inbound publishes leave the transport through a single mpsc channel that
//! the command dispatcher drains. Reconnection is not handled here; the
//! transport reports a dropped session through `is_connected` and waits for
//! the session manager to call `connect` again.

pub mod config;
pub mod error;
pub mod message_manager;
pub mod mqtt_handler;
pub mod transport;

pub use error::TransportError;
pub use message_manager::InboundMessage;
pub use mqtt_handler::RumqttTransport;
pub use transport::{LastWill, QoS, Transport};
