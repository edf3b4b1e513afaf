//! Connection state and reconnect backoff

use std::time::Duration;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Linear backoff capped at a ceiling: `min(floor × retries, ceiling)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub floor: Duration,
    pub ceiling: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(5),
            ceiling: Duration::from_secs(60),
        }
    }
}

impl Backoff {
    pub fn delay(&self, retry_count: u32) -> Duration {
        self.floor
            .checked_mul(retry_count.max(1))
            .unwrap_or(self.ceiling)
            .min(self.ceiling)
    }
}

/// Session bookkeeping, written only by the session supervisor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub connection: ConnectionState,
    pub retry_count: u32,
    pub backoff: Duration,
}

impl SessionState {
    pub fn new(backoff: &Backoff) -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            retry_count: 0,
            backoff: backoff.floor,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn connecting(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    /// Records a failed attempt and returns how long to wait before the next one
    pub fn record_failure(&mut self, backoff: &Backoff) -> Duration {
        self.connection = ConnectionState::Connecting;
        self.retry_count = self.retry_count.saturating_add(1);
        self.backoff = backoff.delay(self.retry_count);
        self.backoff
    }

    pub fn record_success(&mut self, backoff: &Backoff) {
        self.connection = ConnectionState::Connected;
        self.retry_count = 0;
        self.backoff = backoff.floor;
    }

    pub fn disconnected(&mut self) {
        self.connection = ConnectionState::Disconnected;
    }
}
