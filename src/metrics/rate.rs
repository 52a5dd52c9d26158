//! Rate and percentage derivation from successive snapshots.

use super::snapshot::MetricSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

/// Values derived from the current snapshot and, for rates, the previous one.
/// Serialized for output only; a non-finite memory percentage becomes `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    /// CPU busy percentage over the last interval; `None` without a previous sample
    pub cpu_usage_percent: Option<f64>,
    /// Memory used percentage. NaN or infinite when total memory is zero
    pub memory_usage_percent: f64,
    /// Receive throughput over the allow-listed interfaces
    pub download_bytes_per_sec: Option<f64>,
    /// Transmit throughput over the allow-listed interfaces
    pub upload_bytes_per_sec: Option<f64>,
    /// Used percentage per mountpoint; `None` for zero-sized filesystems
    pub disk_usage_percent: BTreeMap<String, Option<f64>>,
    /// Seconds since the exporter host booted
    pub uptime_seconds: f64,
}

/// Rate estimator with state for delta calculations.
///
/// One instance per monitored host. Counter resets on the exporter side
/// (e.g. a reboot between samples) are not detected and produce a
/// meaningless CPU percentage and negative throughput for one interval.
#[derive(Debug, Clone, Default)]
pub struct RateEstimator {
    previous: Option<MetricSnapshot>,
    previous_timestamp: Option<DateTime<Utc>>,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive metrics for `snapshot` taken at `now`, then remember it as the
    /// previous sample regardless of which values could be computed.
    pub fn update(&mut self, snapshot: MetricSnapshot, now: DateTime<Utc>) -> DerivedMetrics {
        let cpu_usage_percent = self.previous.as_ref().map(|prev| {
            let total_diff = snapshot.cpu.total_seconds - prev.cpu.total_seconds;
            let idle_diff = snapshot.cpu.idle_seconds - prev.cpu.idle_seconds;
            if total_diff > 0.0 {
                100.0 * (1.0 - idle_diff / total_diff)
            } else {
                0.0
            }
        });

        let elapsed_secs = self
            .previous_timestamp
            .map(|prev| (now - prev).num_milliseconds() as f64 / 1000.0)
            .filter(|secs| *secs > 0.0);

        let (download_bytes_per_sec, upload_bytes_per_sec) =
            match (self.previous.as_ref(), elapsed_secs) {
                (Some(prev), Some(secs)) => (
                    Some((snapshot.network.received_bytes - prev.network.received_bytes) / secs),
                    Some(
                        (snapshot.network.transmitted_bytes - prev.network.transmitted_bytes)
                            / secs,
                    ),
                ),
                _ => (None, None),
            };

        let memory_usage_percent = 100.0 * snapshot.memory_used_bytes() / snapshot.memory.total_bytes;

        let disk_usage_percent = snapshot
            .filesystems
            .iter()
            .map(|(mountpoint, fs)| {
                let percent = (fs.size_bytes != 0.0).then(|| 100.0 * fs.used_bytes() / fs.size_bytes);
                (mountpoint.clone(), percent)
            })
            .collect();

        let now_secs = now.timestamp_millis() as f64 / 1000.0;
        let uptime_seconds = now_secs - snapshot.boot_time_epoch_seconds;

        trace!(
            first_sample = self.previous.is_none(),
            elapsed_secs = elapsed_secs.unwrap_or(0.0),
            "updated rate estimator"
        );

        // Update state for next collection
        self.previous = Some(snapshot);
        self.previous_timestamp = Some(now);

        DerivedMetrics {
            cpu_usage_percent,
            memory_usage_percent,
            download_bytes_per_sec,
            upload_bytes_per_sec,
            disk_usage_percent,
            uptime_seconds,
        }
    }

    /// Forget the previous sample; the next update behaves like the first
    pub fn reset(&mut self) {
        self.previous = None;
        self.previous_timestamp = None;
    }

    pub fn previous(&self) -> Option<&MetricSnapshot> {
        self.previous.as_ref()
    }

    pub fn previous_timestamp(&self) -> Option<DateTime<Utc>> {
        self.previous_timestamp
    }
}
