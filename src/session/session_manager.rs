//! Session Manager - broker session lifecycle and telemetry publishing
//!
//! Owns the transport and drives it through
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected
//!       ▲              │  ▲            │
//!       │              └──┘            │
//!       │     (fail: sleep backoff)    │
//!       └──────────────────────────────┘
//!            (transport dropped)
//! ```
//!
//! Every transition into `Connected` resubscribes all command topics,
//! republishes discovery for every registered entity and announces the device
//! online. One supervisory task runs the reconnect/telemetry loop, one task
//! drains inbound commands and every entity registered with a state handler
//! gets its own polling task. All of them are tracked and stop on one shared
//! cancellation token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::error::SessionError;
use super::state::{Backoff, SessionState};
use super::telemetry::TelemetrySnapshot;
use crate::discovery::topics::{OFFLINE, ONLINE};
use crate::discovery::{render, DeviceIdentity, EntityDescriptor, EntityRegistry, Topics};
use crate::dispatch::{power_handler, CommandDispatcher, CommandHandler};
use crate::mqtt::{QoS, Transport};
use crate::system::{MetricSource, SuspendInvoker};

/// Produces the current state of a custom entity, published as JSON
pub type StateHandler = Arc<dyn Fn() -> serde_json::Value + Send + Sync>;

/// Lower bound for every period and timeout the loops wait on
pub const MIN_PERIOD: Duration = Duration::from_millis(100);

/// Timing of the session loops
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Cadence of telemetry and per-entity state publishing
    pub publish_interval: Duration,
    pub connect_timeout: Duration,
    pub backoff: Backoff,
    /// How long a graceful disconnect waits for in-flight traffic
    pub linger: Duration,
    /// Length of each of the two CPU sampling windows
    pub cpu_window: Duration,
    /// Upper bound on waiting for tracked tasks during `stop`
    pub shutdown_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            backoff: Backoff::default(),
            linger: Duration::from_millis(250),
            cpu_window: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl SessionSettings {
    /// Raises zero or tiny periods to [`MIN_PERIOD`] and keeps the backoff ceiling above its floor
    pub fn clamped(self) -> Self {
        let floor = self.backoff.floor.max(MIN_PERIOD);
        Self {
            publish_interval: self.publish_interval.max(MIN_PERIOD),
            connect_timeout: self.connect_timeout.max(MIN_PERIOD),
            backoff: Backoff {
                floor,
                ceiling: self.backoff.ceiling.max(floor),
            },
            ..self
        }
    }
}

/// Handle on one broker session. Clones share the session.
pub struct SessionManager<T: Transport, M: MetricSource> {
    inner: Arc<Inner<T, M>>,
}

impl<T: Transport, M: MetricSource> Clone for SessionManager<T, M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T: Transport, M: MetricSource> {
    identity: DeviceIdentity,
    topics: Topics,
    transport: T,
    metrics: Arc<M>,
    registry: EntityRegistry,
    dispatcher: CommandDispatcher,
    settings: SessionSettings,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    entity_loops: Mutex<HashMap<String, CancellationToken>>,
    /// Whether discovery went out for the current connection. Held across
    /// the on-connect announcement and across registration.
    announced: Mutex<bool>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl<T: Transport, M: MetricSource> SessionManager<T, M> {
    /// Builds an idle session with the default entities and the power handler installed
    pub fn new(
        identity: DeviceIdentity,
        topics: Topics,
        transport: T,
        metrics: M,
        suspend: Arc<dyn SuspendInvoker>,
        settings: SessionSettings,
    ) -> Self {
        let settings = settings.clamped();
        let dispatcher =
            CommandDispatcher::with_handler(topics.power_command(), power_handler(suspend));
        let (state, _) = watch::channel(SessionState::new(&settings.backoff));

        Self {
            inner: Arc::new(Inner {
                identity,
                topics,
                transport,
                metrics: Arc::new(metrics),
                registry: EntityRegistry::with_entries(EntityDescriptor::defaults()),
                dispatcher,
                settings,
                state,
                cancel: CancellationToken::new(),
                tasks: TaskTracker::new(),
                entity_loops: Mutex::new(HashMap::new()),
                announced: Mutex::new(false),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Spawns the supervisory loop and the command dispatch loop
    ///
    /// Returns immediately; the first connect happens on the supervisor.
    /// Calling it again is a no-op.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("Session already started");
            return;
        }
        info!("Starting session for {}", self.inner.identity.node_id());

        match self.inner.transport.incoming() {
            Some(inbound) => {
                let inner = self.inner.clone();
                self.inner.tasks.spawn(async move {
                    inner.dispatcher.run(inbound, inner.cancel.clone()).await;
                });
            }
            None => warn!("Transport has no inbound stream, commands will not be dispatched"),
        }

        let inner = self.inner.clone();
        self.inner.tasks.spawn(async move {
            if let Err(e) = inner.supervise().await {
                error!("Session supervisor stopped: {}", e);
                inner.cancel.cancel();
            }
        });
    }

    /// One-shot graceful shutdown
    ///
    /// Cancels every loop, waits for the tracked tasks, announces the device
    /// offline while still connected and disconnects. Later calls do nothing.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            debug!("Session already stopped");
            return;
        }
        info!("Stopping session");

        self.inner.cancel.cancel();
        self.inner.tasks.close();
        let grace = self.inner.settings.shutdown_grace;
        if tokio::time::timeout(grace, self.inner.tasks.wait())
            .await
            .is_err()
        {
            warn!(
                "{} session tasks still running after {:?}",
                self.inner.tasks.len(),
                grace
            );
        }

        let transport = &self.inner.transport;
        if transport.is_connected() {
            let availability = self.inner.topics.availability();
            if let Err(e) = transport
                .publish(&availability, QoS::AtLeastOnce, true, OFFLINE.into())
                .await
            {
                warn!("Failed to announce offline: {}", e);
            }
        }
        if let Err(e) = transport.disconnect(self.inner.settings.linger).await {
            warn!("Disconnect failed: {}", e);
        }
        self.inner.state.send_modify(|s| s.disconnected());
        info!("Session stopped");
    }

    /// Adds or replaces an entity
    ///
    /// The command handler is bound to the entity's command topic (and the
    /// effect command topic of lights). A state handler gets its own polling
    /// task publishing to the entity's dedicated state topic. When connected
    /// the discovery payload goes out and the command topics are subscribed
    /// right away; otherwise both happen on the next connect.
    pub async fn register(
        &self,
        descriptor: EntityDescriptor,
        command_handler: Option<CommandHandler>,
        state_handler: Option<StateHandler>,
    ) {
        let inner = &self.inner;
        let descriptor = if state_handler.is_some() {
            descriptor.with_dedicated_state_topic()
        } else {
            descriptor
        };

        let announced = inner.announced.lock().await;
        if inner.registry.insert(descriptor.clone()).await.is_some() {
            info!("Replaced entity {}", descriptor.name);
        } else {
            info!("Registered entity {}", descriptor.name);
        }

        let mut command_topics = Vec::new();
        if let Some(handler) = command_handler {
            match inner.topics.command(&descriptor) {
                Some(topic) => command_topics.push(topic),
                None => warn!(
                    "Entity {} is not actuatable, ignoring its command handler",
                    descriptor.name
                ),
            }
            if let Some(topic) = descriptor
                .light_options()
                .and_then(|options| options.effect_command_topic())
            {
                command_topics.push(topic.to_string());
            }
            for topic in &command_topics {
                inner.dispatcher.insert(topic.clone(), handler.clone()).await;
            }
        }

        if *announced && inner.transport.is_connected() {
            inner.publish_discovery(&descriptor).await;
            for topic in &command_topics {
                inner.subscribe(topic).await;
            }
        } else {
            debug!(
                "Not announced yet, discovery for {} deferred to next connect",
                descriptor.name
            );
        }
        drop(announced);

        if let Some(handler) = state_handler {
            self.spawn_state_loop(&descriptor, handler).await;
        }
    }

    async fn spawn_state_loop(&self, descriptor: &EntityDescriptor, handler: StateHandler) {
        let inner = &self.inner;
        let token = inner.cancel.child_token();
        if let Some(previous) = inner
            .entity_loops
            .lock()
            .await
            .insert(descriptor.name.clone(), token.clone())
        {
            debug!("Cancelling previous state loop of {}", descriptor.name);
            previous.cancel();
        }

        let mut targets = vec![inner.topics.entity_state(descriptor)];
        if let Some(topic) = descriptor
            .light_options()
            .and_then(|options| options.effect_state_topic())
        {
            targets.push(topic.to_string());
        }

        let name = descriptor.name.clone();
        let task_inner = inner.clone();
        inner.tasks.spawn(async move {
            task_inner.entity_state_loop(name, targets, handler, token).await;
        });
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    pub fn topics(&self) -> &Topics {
        &self.inner.topics
    }

    pub fn registry(&self) -> EntityRegistry {
        self.inner.registry.clone()
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }
}

impl<T: Transport, M: MetricSource> Inner<T, M> {
    /// Reconnect-supervised telemetry loop
    async fn supervise(&self) -> Result<(), SessionError> {
        info!("Telemetry loop started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if !self.transport.is_connected() {
                let was_connected = self.state.borrow().is_connected();
                if was_connected {
                    warn!("MQTT session lost");
                    self.state.send_modify(|s| s.disconnected());
                }
                *self.announced.lock().await = false;
                if !self.reconnect().await {
                    break;
                }
                self.on_connected().await;
            }

            self.publish_telemetry().await?;

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.publish_interval) => {}
            }
        }
        info!("Telemetry loop exiting");
        Ok(())
    }

    /// Retries until connected. Returns false when cancelled first.
    async fn reconnect(&self) -> bool {
        let backoff = self.settings.backoff;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            self.state.send_modify(|s| s.connecting());
            info!("Connecting to MQTT broker");

            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                result = tokio::time::timeout(
                    self.settings.connect_timeout,
                    self.transport.connect(),
                ) => result,
            };

            match attempt {
                Ok(Ok(())) => {
                    self.state.send_modify(|s| s.record_success(&backoff));
                    info!("MQTT connected");
                    return true;
                }
                Ok(Err(e)) => warn!("Connect failed: {}", e),
                Err(_) => warn!(
                    "Connect timed out after {:?}",
                    self.settings.connect_timeout
                ),
            }

            let mut delay = backoff.floor;
            let mut retries = 0;
            self.state.send_modify(|s| {
                delay = s.record_failure(&backoff);
                retries = s.retry_count;
            });
            warn!(
                "Reconnect attempt {} failed, retrying in {}s",
                retries,
                delay.as_secs()
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Resubscribe, rediscover, announce online
    ///
    /// Registrations wait for this to finish, so each entity is announced
    /// once per connection.
    async fn on_connected(&self) {
        let mut announced = self.announced.lock().await;
        for topic in self.dispatcher.topics().await {
            self.subscribe(&topic).await;
        }
        for descriptor in self.registry.snapshot().await {
            self.publish_discovery(&descriptor).await;
        }
        *announced = true;
        drop(announced);

        let availability = self.topics.availability();
        match self
            .transport
            .publish(&availability, QoS::AtLeastOnce, true, ONLINE.into())
            .await
        {
            Ok(()) => info!("Announced {} online", self.identity.node_id()),
            Err(e) => warn!("Failed to announce online: {}", e),
        }
    }

    async fn subscribe(&self, topic: &str) {
        match self.transport.subscribe(topic, QoS::AtLeastOnce).await {
            Ok(()) => info!("Subscribed to {}", topic),
            Err(e) => warn!("Subscribe to {} failed: {}", topic, e),
        }
    }

    async fn publish_discovery(&self, descriptor: &EntityDescriptor) {
        let message = render(descriptor, &self.identity, &self.topics);
        let payload = match message.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Discovery payload for {} not serializable: {}", descriptor.name, e);
                return;
            }
        };
        match self
            .transport
            .publish(&message.topic, QoS::AtLeastOnce, true, payload)
            .await
        {
            Ok(()) => debug!("Published discovery for {} on {}", descriptor.name, message.topic),
            Err(e) => warn!("Discovery for {} failed: {}", descriptor.name, e),
        }
    }

    async fn publish_telemetry(&self) -> Result<(), SessionError> {
        let metrics = self.metrics.clone();
        let window = self.settings.cpu_window;
        let snapshot = match tokio::task::spawn_blocking(move || {
            TelemetrySnapshot::sample(metrics.as_ref(), window)
        })
        .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Metric sampling aborted: {}", e);
                return Ok(());
            }
        };

        let payload = snapshot.to_bytes()?;
        let topic = self.topics.state();
        if let Err(e) = self
            .transport
            .publish(&topic, QoS::AtLeastOnce, false, payload)
            .await
        {
            warn!("Telemetry publish failed: {}", e);
        }
        Ok(())
    }

    async fn entity_state_loop(
        &self,
        name: String,
        targets: Vec<String>,
        handler: StateHandler,
        cancel: CancellationToken,
    ) {
        debug!("State loop for {} started", name);
        let mut ticker = tokio::time::interval(self.settings.publish_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if !self.transport.is_connected() {
                continue;
            }

            let payload = match serde_json::to_vec(&handler()) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("State of {} not serializable: {}", name, e);
                    continue;
                }
            };
            for topic in &targets {
                if let Err(e) = self
                    .transport
                    .publish(topic, QoS::AtLeastOnce, true, payload.clone())
                    .await
                {
                    warn!("State publish for {} failed: {}", name, e);
                }
            }
        }
        debug!("State loop for {} exiting", name);
    }
}
