//! Parsed exporter sample types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CPU time counters summed over every core and mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuTotals {
    /// Seconds spent in any mode since boot
    pub total_seconds: f64,
    /// Seconds spent in `mode="idle"` since boot
    pub idle_seconds: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryTotals {
    pub total_bytes: f64,
    pub available_bytes: f64,
}

/// Byte counters summed over the allow-listed interfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkTotals {
    pub received_bytes: f64,
    pub transmitted_bytes: f64,
}

/// Size and free space of a single mountpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesystemUsage {
    pub size_bytes: f64,
    pub avail_bytes: f64,
}

impl FilesystemUsage {
    pub fn used_bytes(&self) -> f64 {
        self.size_bytes - self.avail_bytes
    }
}

/// One parsed sample of every tracked metric family.
///
/// Families missing from the scraped text keep their zero/empty defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub cpu: CpuTotals,
    pub memory: MemoryTotals,
    pub network: NetworkTotals,
    pub boot_time_epoch_seconds: f64,
    /// First thermal sensor reading found, if any
    pub temperature_celsius: Option<f64>,
    /// Allow-listed mountpoints only
    pub filesystems: BTreeMap<String, FilesystemUsage>,
}

impl MetricSnapshot {
    pub fn memory_used_bytes(&self) -> f64 {
        self.memory.total_bytes - self.memory.available_bytes
    }
}
