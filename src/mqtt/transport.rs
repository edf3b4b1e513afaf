//! Publish/subscribe transport abstraction
//!
//! The session manager talks to the broker only through [`Transport`]. The
//! production implementation is [`RumqttTransport`](super::mqtt_handler::RumqttTransport);
//! tests drive the session through an in-memory double.

use std::future::Future;
use std::time::Duration;

pub use rumqttc::QoS;
use tokio::sync::mpsc;

use super::error::TransportError;
use super::message_manager::InboundMessage;

/// Message the broker publishes on our behalf after an unclean disconnect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

/// Connection primitive shared by every producer task of a session
///
/// Implementations must accept concurrent `publish` calls from several tasks.
pub trait Transport: Send + Sync + 'static {
    /// Opens a fresh broker session. Callers bound the wait with their own timeout.
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the session, waiting at most `linger` for in-flight traffic
    fn disconnect(&self, linger: Duration)
        -> impl Future<Output = Result<(), TransportError>> + Send;

    fn is_connected(&self) -> bool;

    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn subscribe(
        &self,
        topic: &str,
        qos: QoS,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Hands out the inbound message stream. Returns `None` after the first call.
    fn incoming(&self) -> Option<mpsc::Receiver<InboundMessage>>;
}
