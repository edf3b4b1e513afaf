use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use sysinfo::System;

use super::disk;
use super::error::MetricError;
use super::temperature::{self, THERMAL_ROOT};

/// Instantaneous host readings
///
/// Calls may block (CPU sampling sleeps for its window), so callers run them
/// on the blocking pool.
pub trait MetricSource: Send + Sync + 'static {
    /// Global CPU usage in percent, measured over `window`
    fn cpu_percent(&self, window: Duration) -> Result<f64, MetricError>;

    fn memory_percent(&self) -> Result<f64, MetricError>;

    fn disk_percent(&self) -> Result<f64, MetricError>;

    /// Degrees Celsius
    fn temperature(&self) -> Result<f64, MetricError>;
}

/// `sysinfo` backed metric source
pub struct SystemMetrics {
    system: Mutex<System>,
    disk_mount: PathBuf,
    thermal_root: PathBuf,
}

impl SystemMetrics {
    pub fn new(disk_mount: impl Into<PathBuf>) -> Self {
        Self {
            system: Mutex::new(System::new()),
            disk_mount: disk_mount.into(),
            thermal_root: PathBuf::from(THERMAL_ROOT),
        }
    }
}

impl MetricSource for SystemMetrics {
    fn cpu_percent(&self, window: Duration) -> Result<f64, MetricError> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu_usage();
        std::thread::sleep(window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        system.refresh_cpu_usage();
        if system.cpus().is_empty() {
            return Err(MetricError::Unavailable("cpu usage"));
        }
        Ok(system.global_cpu_usage() as f64)
    }

    fn memory_percent(&self) -> Result<f64, MetricError> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(MetricError::Unavailable("memory usage"));
        }
        Ok(disk::percent(system.used_memory(), total))
    }

    fn disk_percent(&self) -> Result<f64, MetricError> {
        disk::usage_percent(&self.disk_mount)
    }

    fn temperature(&self) -> Result<f64, MetricError> {
        if cfg!(target_os = "linux") {
            temperature::read_temperature(&self.thermal_root)
        } else {
            Err(MetricError::Unavailable("temperature"))
        }
    }
}
