//! Inbound command routing
//!
//! Maps subscribed topics to handlers. The map is owned by one dispatcher
//! instance per session and is also the list of topics the session
//! resubscribes after every reconnect.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::discovery::payload::PAYLOAD_OFF;
use crate::mqtt::InboundMessage;
use crate::system::SuspendInvoker;

/// Reacts to one inbound message. Must not block; spawn for slow work.
pub type CommandHandler = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

#[derive(Default)]
pub struct CommandDispatcher {
    handlers: RwLock<HashMap<String, CommandHandler>>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher pre-populated with one handler
    pub fn with_handler(topic: impl Into<String>, handler: CommandHandler) -> Self {
        Self {
            handlers: RwLock::new(HashMap::from([(topic.into(), handler)])),
        }
    }

    /// Installs `handler` for `topic`, returning true when it replaced one
    pub async fn insert(&self, topic: impl Into<String>, handler: CommandHandler) -> bool {
        let topic = topic.into();
        debug!("Installing command handler for {}", topic);
        self.handlers.write().await.insert(topic, handler).is_some()
    }

    /// Every topic with a handler, sorted
    pub async fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Routes `msg` to its handler. Returns false when no handler matches.
    pub async fn dispatch(&self, msg: &InboundMessage) -> bool {
        let handler = self.handlers.read().await.get(&msg.topic).cloned();
        match handler {
            Some(handler) => {
                handler(msg);
                true
            }
            None => {
                debug!("No handler for {}, dropping message", msg.topic);
                false
            }
        }
    }

    /// Drains `inbound` until it closes or `cancel` fires
    pub async fn run(
        &self,
        mut inbound: mpsc::Receiver<InboundMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                msg = inbound.recv() => match msg {
                    Some(msg) => {
                        self.dispatch(&msg).await;
                    }
                    None => {
                        debug!("Inbound channel closed");
                        break;
                    }
                },
            }
        }
        debug!("Command dispatch loop exiting");
    }
}

/// Built-in handler for the power switch
///
/// Only an exact `OFF` payload suspends the host. The suspend runs detached
/// on the blocking pool; its outcome is logged and never retried.
pub fn power_handler(invoker: Arc<dyn SuspendInvoker>) -> CommandHandler {
    Arc::new(move |msg: &InboundMessage| {
        if msg.payload.as_slice() != PAYLOAD_OFF.as_bytes() {
            debug!("Ignoring power command {:?}", msg.payload_str());
            return;
        }
        info!("Received power off command, suspending host");
        let invoker = invoker.clone();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || invoker.suspend()).await {
                Ok(Ok(())) => info!("Host suspended"),
                Ok(Err(e)) => error!("Suspend failed: {}", e),
                Err(e) => error!("Suspend task panicked: {}", e),
            }
        });
    })
}
