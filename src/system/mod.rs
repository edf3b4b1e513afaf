//! Host collaborators: metric readings and the suspend action
//!
//! Both are plain blocking calls. The session manager and the command
//! dispatcher only depend on the [`MetricSource`] and [`SuspendInvoker`]
//! traits.

pub mod disk;
pub mod error;
pub mod metrics;
pub mod suspend;
pub mod temperature;

pub use error::{MetricError, SuspendError};
pub use metrics::{MetricSource, SystemMetrics};
pub use suspend::{SuspendInvoker, SystemSuspend};
