//! Thermal zone reader for Linux hosts

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::MetricError;

pub const THERMAL_ROOT: &str = "/sys/class/thermal";

/// Reads `<root>/thermal_zone*/temp` (millidegrees) and returns degrees Celsius
///
/// A zone whose `type` mentions `cpu` wins; otherwise the first readable zone
/// in name order is used.
pub fn read_temperature(root: &Path) -> Result<f64, MetricError> {
    let entries = fs::read_dir(root).map_err(|source| MetricError::Io {
        path: root.display().to_string(),
        source,
    })?;

    let mut zones: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("thermal_zone"))
        })
        .collect();
    zones.sort();

    let mut fallback = None;
    for zone in zones {
        let Some(celsius) = read_zone(&zone) else {
            continue;
        };
        let zone_type = fs::read_to_string(zone.join("type")).unwrap_or_default();
        if zone_type.to_lowercase().contains("cpu") {
            debug!("Using thermal zone {} ({})", zone.display(), zone_type.trim());
            return Ok(celsius);
        }
        fallback.get_or_insert(celsius);
    }

    fallback.ok_or(MetricError::Unavailable("temperature"))
}

fn read_zone(zone: &Path) -> Option<f64> {
    let raw = fs::read_to_string(zone.join("temp")).ok()?;
    let millis: i64 = raw.trim().parse().ok()?;
    Some(millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(root: &Path, name: &str, kind: &str, temp: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("create zone");
        fs::write(dir.join("type"), kind).expect("write type");
        fs::write(dir.join("temp"), temp).expect("write temp");
    }

    #[test]
    fn prefers_cpu_zone() {
        let root = tempfile::tempdir().expect("tempdir");
        zone(root.path(), "thermal_zone0", "acpitz\n", "27800\n");
        zone(root.path(), "thermal_zone1", "x86_pkg_temp\n", "40000\n");
        zone(root.path(), "thermal_zone2", "cpu-thermal\n", "51500\n");
        assert_eq!(read_temperature(root.path()).expect("reading"), 51.5);
    }

    #[test]
    fn falls_back_to_first_readable_zone() {
        let root = tempfile::tempdir().expect("tempdir");
        zone(root.path(), "thermal_zone0", "acpitz", "garbage");
        zone(root.path(), "thermal_zone1", "acpitz", "30000");
        assert_eq!(read_temperature(root.path()).expect("reading"), 30.0);
    }

    #[test]
    fn no_zones_is_unavailable() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(root.path().join("cooling_device0")).expect("mkdir");
        assert!(matches!(
            read_temperature(root.path()),
            Err(MetricError::Unavailable(_))
        ));
    }

    #[test]
    fn missing_root_is_io_error() {
        let root = tempfile::tempdir().expect("tempdir");
        let missing = root.path().join("nope");
        assert!(matches!(
            read_temperature(&missing),
            Err(MetricError::Io { .. })
        ));
    }
}
