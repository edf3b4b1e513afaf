//! Host telemetry agent for MQTT brokers with Home Assistant auto-discovery
//!
//! ```text
//! config ──► agent ──► session::SessionManager ──► mqtt::Transport ──► broker
//!                         │        ▲                     │
//!                 system::MetricSource   discovery       ▼
//!                                          dispatch ◄── inbound commands
//! ```

pub mod agent;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod mqtt;
pub mod session;
pub mod system;

#[cfg(test)]
pub(crate) mod testing;
