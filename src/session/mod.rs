//! # Session
//!
//! Broker session supervision: connection state, reconnect backoff and the
//! periodic telemetry snapshot.
//!
//! ```text
//! session/
//! ├── error.rs            - SessionError
//! ├── session_manager.rs  - Lifecycle, reconnect loop, entity registration
//! ├── state.rs            - ConnectionState, SessionState, Backoff
//! └── telemetry.rs        - TelemetrySnapshot sampled each cycle
//! ```

pub mod error;
pub mod session_manager;
pub mod state;
pub mod telemetry;

pub use error::SessionError;
pub use session_manager::{SessionManager, SessionSettings, StateHandler, MIN_PERIOD};
pub use state::{Backoff, ConnectionState, SessionState};
pub use telemetry::{PowerStatus, TelemetrySnapshot, SENTINEL};
