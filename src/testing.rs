//! In-memory collaborators for exercising the session without a broker or host

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::mqtt::{InboundMessage, QoS, Transport, TransportError};
use crate::system::{MetricError, MetricSource, SuspendError, SuspendInvoker};

/// Polls `cond` on the tokio clock until it holds, panicking after `limit`
pub async fn wait_until(mut cond: impl FnMut() -> bool, limit: Duration) {
    let deadline = Instant::now() + limit;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met within {:?}", limit);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect,
    Publish {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
        qos: QoS,
    },
    FailedPublish {
        topic: String,
    },
    Subscribe {
        topic: String,
    },
    Disconnect,
}

/// Records every call. Connects succeed after `failures` refusals.
pub struct MockTransport {
    connected: AtomicBool,
    failures: AtomicUsize,
    fail_publishes: AtomicBool,
    calls: Mutex<Vec<Call>>,
    attempts: Mutex<Vec<Instant>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::failing(0)
    }

    pub fn failing(failures: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        Self {
            connected: AtomicBool::new(false),
            failures: AtomicUsize::new(failures),
            fail_publishes: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing(usize::MAX)
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Drops the session as a broker-side disconnect would
    pub fn sever(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Delivers an inbound publish to the session
    pub async fn inject(&self, topic: &str, payload: &str) {
        self.inbound_tx
            .send(InboundMessage::from_topic(topic, payload))
            .await
            .expect("inbound receiver alive");
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn connect_attempts(&self) -> Vec<Instant> {
        self.attempts.lock().expect("attempts lock").clone()
    }

    /// Payload and retain flag of every successful publish on `topic`
    pub fn publishes(&self, topic: &str) -> Vec<(Vec<u8>, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Publish {
                    topic: t,
                    payload,
                    retain,
                    ..
                } if t == topic => Some((payload, retain)),
                _ => None,
            })
            .collect()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.publishes(topic).into_iter().map(|(p, _)| p).collect()
    }

    pub fn first_publish_index(&self, topic: &str) -> Option<usize> {
        self.calls()
            .iter()
            .position(|call| matches!(call, Call::Publish { topic: t, .. } if t == topic))
    }

    pub fn failed_publishes(&self, topic: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::FailedPublish { topic: t } if t == topic))
            .count()
    }

    pub fn subscribe_count(&self, topic: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Subscribe { topic: t } if t == topic))
            .count()
    }

    pub fn disconnects(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Disconnect))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.attempts.lock().expect("attempts lock").push(Instant::now());
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        self.record(Call::Connect);
        Ok(())
    }

    async fn disconnect(&self, _linger: Duration) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.record(Call::Disconnect);
        Ok(())
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
        if !self.is_connected() {
            self.record(Call::FailedPublish {
                topic: topic.to_string(),
            });
            return Err(TransportError::NotConnected);
        }
        if self.fail_publishes.load(Ordering::SeqCst) {
            self.record(Call::FailedPublish {
                topic: topic.to_string(),
            });
            return Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.record(Call::Publish {
            topic: topic.to_string(),
            payload,
            retain,
            qos,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str, _qos: QoS) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.record(Call::Subscribe {
            topic: topic.to_string(),
        });
        Ok(())
    }

    fn incoming(&self) -> Option<mpsc::Receiver<InboundMessage>> {
        self.inbound_rx.lock().expect("inbound lock").take()
    }
}

/// Metric source with fixed readings
pub struct StaticMetrics {
    cpu: Mutex<VecDeque<f64>>,
    cpu_calls: AtomicUsize,
    available: bool,
}

impl Default for StaticMetrics {
    fn default() -> Self {
        Self {
            cpu: Mutex::new(VecDeque::new()),
            cpu_calls: AtomicUsize::new(0),
            available: true,
        }
    }
}

impl StaticMetrics {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    /// CPU readings handed out in order, then the default reading
    pub fn with_cpu_sequence(self, readings: Vec<f64>) -> Self {
        Self {
            cpu: Mutex::new(readings.into()),
            ..self
        }
    }

    pub fn cpu_calls(&self) -> usize {
        self.cpu_calls.load(Ordering::SeqCst)
    }

    fn reading(&self, what: &'static str, value: f64) -> Result<f64, MetricError> {
        if self.available {
            Ok(value)
        } else {
            Err(MetricError::Unavailable(what))
        }
    }
}

impl MetricSource for StaticMetrics {
    fn cpu_percent(&self, _window: Duration) -> Result<f64, MetricError> {
        self.cpu_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.cpu.lock().expect("cpu lock").pop_front();
        self.reading("cpu usage", next.unwrap_or(12.5))
    }

    fn memory_percent(&self) -> Result<f64, MetricError> {
        self.reading("memory usage", 40.0)
    }

    fn disk_percent(&self) -> Result<f64, MetricError> {
        self.reading("disk usage", 71.25)
    }

    fn temperature(&self) -> Result<f64, MetricError> {
        self.reading("temperature", 48.0)
    }
}

/// Suspend double counting invocations
#[derive(Default)]
pub struct CountingSuspend {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingSuspend {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, n: usize, limit: Duration) {
        wait_until(|| self.calls() >= n, limit).await;
    }
}

impl SuspendInvoker for CountingSuspend {
    fn suspend(&self) -> Result<(), SuspendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(SuspendError::Failed {
                command: "suspend".to_string(),
                status: "exit status: 1".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
