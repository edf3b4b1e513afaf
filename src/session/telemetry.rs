//! Telemetry snapshot assembled once per publish cycle

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::system::{MetricError, MetricSource};

/// Value published for a reading the host could not provide
pub const SENTINEL: f64 = -0.001;

const CPU_SAMPLES: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerStatus {
    #[default]
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

/// Flat JSON object published on the shared state topic
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub cpu_usage: f64,
    pub mem_usage: f64,
    pub disk_usage: f64,
    pub power_status: PowerStatus,
    pub temperature: f64,
    /// Additional top-level keys merged into the object
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TelemetrySnapshot {
    /// Samples `source`. Blocks for `CPU_SAMPLES × cpu_window`.
    pub fn sample<M: MetricSource + ?Sized>(source: &M, cpu_window: Duration) -> Self {
        let cpu: Vec<f64> = (0..CPU_SAMPLES)
            .filter_map(|_| reading("cpu", source.cpu_percent(cpu_window)))
            .collect();
        let cpu_usage = if cpu.is_empty() {
            SENTINEL
        } else {
            cpu.iter().sum::<f64>() / cpu.len() as f64
        };

        Self {
            cpu_usage,
            mem_usage: reading("memory", source.memory_percent()).unwrap_or(SENTINEL),
            disk_usage: reading("disk", source.disk_percent()).unwrap_or(SENTINEL),
            power_status: PowerStatus::On,
            temperature: reading("temperature", source.temperature()).unwrap_or(SENTINEL),
            extra: serde_json::Map::new(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

fn reading(what: &str, value: Result<f64, MetricError>) -> Option<f64> {
    match value {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Sampling {} failed: {}", what, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticMetrics;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn wire_shape_is_flat() {
        let mut snapshot = TelemetrySnapshot {
            cpu_usage: 12.5,
            mem_usage: 40.0,
            disk_usage: 71.25,
            power_status: PowerStatus::On,
            temperature: 48.0,
            extra: serde_json::Map::new(),
        };
        snapshot.extra.insert("custom_value".to_string(), json!(25.5));

        let value: serde_json::Value =
            serde_json::from_slice(&snapshot.to_bytes().expect("serializable")).expect("json");
        assert_eq!(
            value,
            json!({
                "cpu_usage": 12.5,
                "mem_usage": 40.0,
                "disk_usage": 71.25,
                "power_status": "ON",
                "temperature": 48.0,
                "custom_value": 25.5
            })
        );
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let mut snapshot = TelemetrySnapshot {
            cpu_usage: 3.75,
            mem_usage: 55.5,
            disk_usage: 10.0,
            power_status: PowerStatus::Off,
            temperature: SENTINEL,
            extra: serde_json::Map::new(),
        };
        snapshot.extra.insert("fan".to_string(), json!("auto"));

        let bytes = snapshot.to_bytes().expect("serializable");
        let parsed: TelemetrySnapshot = serde_json::from_slice(&bytes).expect("parse");
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn cpu_is_averaged_over_two_samples() {
        let source = StaticMetrics::default().with_cpu_sequence(vec![10.0, 30.0]);
        let snapshot = TelemetrySnapshot::sample(&source, Duration::ZERO);
        assert_eq!(snapshot.cpu_usage, 20.0);
        assert_eq!(source.cpu_calls(), 2);
    }

    #[test]
    fn unavailable_readings_become_sentinels() {
        let source = StaticMetrics::unavailable();
        let snapshot = TelemetrySnapshot::sample(&source, Duration::ZERO);
        assert_eq!(snapshot.cpu_usage, SENTINEL);
        assert_eq!(snapshot.mem_usage, SENTINEL);
        assert_eq!(snapshot.disk_usage, SENTINEL);
        assert_eq!(snapshot.temperature, SENTINEL);
        assert_eq!(snapshot.power_status, PowerStatus::On);
    }
}
