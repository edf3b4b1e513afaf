use std::path::Path;

use serde::Serialize;
use sysinfo::Disks;

use super::error::MetricError;

/// Usage of one mounted filesystem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskInfo {
    pub mount_point: String,
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub used_percent: f64,
}

impl DiskInfo {
    fn new(mount_point: &Path, total: u64, free: u64) -> Self {
        let used = total.saturating_sub(free);
        Self {
            mount_point: mount_point.display().to_string(),
            total,
            free,
            used,
            used_percent: percent(used, total),
        }
    }
}

/// Every mounted filesystem the OS reports, skipping zero-sized ones
pub fn all_disks() -> Vec<DiskInfo> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| disk.total_space() > 0)
        .map(|disk| DiskInfo::new(disk.mount_point(), disk.total_space(), disk.available_space()))
        .collect()
}

/// Used percentage of the filesystem mounted at `mount`
///
/// Falls back to the largest filesystem when `mount` is not mounted.
pub fn usage_percent(mount: &Path) -> Result<f64, MetricError> {
    let disks = all_disks();
    let wanted = mount.display().to_string();
    disks
        .iter()
        .find(|disk| disk.mount_point == wanted)
        .or_else(|| disks.iter().max_by_key(|disk| disk.total))
        .map(|disk| disk.used_percent)
        .ok_or(MetricError::Unavailable("disk usage"))
}

pub(crate) fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}
