//! `rumqttc` backed transport
//!
//! Every successful [`connect`](Transport::connect) builds a fresh
//! `AsyncClient`/`EventLoop` pair, waits for the broker's CONNACK and then
//! hands the event loop to a driver task. The driver forwards inbound
//! publishes to the message channel and flips the connected flag off on the
//! first network error. It does not reconnect on its own: the session
//! manager notices the dropped flag and runs its backoff loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::MqttConfig;
use super::error::TransportError;
use super::message_manager::InboundMessage;
use super::transport::{LastWill, Transport};

const REQUEST_CAPACITY: usize = 100;
const INBOUND_CAPACITY: usize = 64;

pub struct RumqttTransport {
    options: MqttOptions,
    connected: Arc<AtomicBool>,
    client: Mutex<Option<AsyncClient>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: std::sync::Mutex<Option<mpsc::Receiver<InboundMessage>>>,
}

impl RumqttTransport {
    pub fn new(config: &MqttConfig, will: LastWill) -> Self {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host(), config.port);
        options
            .set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(1)))
            .set_clean_session(true)
            .set_last_will(rumqttc::LastWill::new(
                will.topic,
                will.payload,
                will.qos,
                will.retain,
            ));
        if config.has_credentials() {
            options.set_credentials(config.user.clone(), config.pass.clone());
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        RumqttTransport {
            options,
            connected: Arc::new(AtomicBool::new(false)),
            client: Mutex::new(None),
            driver: Mutex::new(None),
            inbound_tx,
            inbound_rx: std::sync::Mutex::new(Some(inbound_rx)),
        }
    }

    async fn stop_driver(&self) {
        if let Some(handle) = self.driver.lock().await.take() {
            handle.abort();
        }
    }
}

impl Transport for RumqttTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.stop_driver().await;
        self.connected.store(false, Ordering::SeqCst);

        let (host, port) = self.options.broker_address();
        debug!("Connecting to MQTT broker {}:{}", host, port);

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if matches!(ack.code, ConnectReturnCode::Success) {
                        break;
                    }
                    return Err(TransportError::Connect(format!(
                        "broker refused connection: {:?}",
                        ack.code
                    )));
                }
                Ok(_) => {}
                Err(e) => return Err(TransportError::Connect(e.to_string())),
            }
        }

        self.connected.store(true, Ordering::SeqCst);
        *self.client.lock().await = Some(client);
        let handle = tokio::spawn(drive(
            eventloop,
            self.connected.clone(),
            self.inbound_tx.clone(),
        ));
        *self.driver.lock().await = Some(handle);
        info!("Connected to MQTT broker {}:{}", host, port);
        Ok(())
    }

    async fn disconnect(&self, linger: Duration) -> Result<(), TransportError> {
        let client = self.client.lock().await.take();
        let mut result = Ok(());
        if let Some(client) = client {
            if let Err(e) = client.disconnect().await {
                result = Err(TransportError::Disconnect(e.to_string()));
            }
        }

        if let Some(mut handle) = self.driver.lock().await.take() {
            if tokio::time::timeout(linger, &mut handle).await.is_err() {
                debug!("Event loop still busy after {:?}, aborting", linger);
                handle.abort();
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        result
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let client = self
            .client
            .lock()
            .await
            .clone()
            .ok_or(TransportError::NotConnected)?;
        client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| TransportError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        let client = self
            .client
            .lock()
            .await
            .clone()
            .ok_or(TransportError::NotConnected)?;
        client
            .subscribe(topic, qos)
            .await
            .map_err(|e| TransportError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn incoming(&self) -> Option<mpsc::Receiver<InboundMessage>> {
        self.inbound_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Polls the event loop until the connection drops or a disconnect goes out
async fn drive(
    mut eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    inbound: mpsc::Sender<InboundMessage>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = InboundMessage::from_topic(publish.topic, publish.payload.to_vec());
                debug!("Received {}", msg);
                if inbound.send(msg).await.is_err() {
                    debug!("Inbound channel closed, dropping message");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Disconnect sent to broker");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection lost: {}", e);
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn will() -> LastWill {
        LastWill {
            topic: "homeassistant/sensor/hostclient/status".to_string(),
            payload: "offline".to_string(),
            qos: QoS::AtLeastOnce,
            retain: true,
        }
    }

    #[test]
    fn options_follow_config() {
        let cfg = MqttConfig {
            server: "tcp://broker.lan".to_string(),
            port: 1884,
            ..MqttConfig::default()
        };
        let transport = RumqttTransport::new(&cfg, will());
        let (host, port) = transport.options.broker_address();
        assert_eq!(host, "broker.lan");
        assert_eq!(port, 1884);
        assert_eq!(transport.options.client_id(), "hamqtt-client");
        assert!(transport.options.last_will().is_some());
        assert!(!transport.is_connected());
    }

    #[test]
    fn incoming_is_handed_out_once() {
        let transport = RumqttTransport::new(&MqttConfig::default(), will());
        assert!(transport.incoming().is_some());
        assert!(transport.incoming().is_none());
    }

    #[tokio::test]
    async fn publish_without_session_is_rejected() {
        let transport = RumqttTransport::new(&MqttConfig::default(), will());
        let result = transport
            .publish("a/b", QoS::AtLeastOnce, false, b"x".to_vec())
            .await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }
}
