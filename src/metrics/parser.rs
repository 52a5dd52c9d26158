//! Exposition text parsing for node_exporter `/metrics` output.
//!
//! The scan is line oriented and tolerant: anything that does not look like
//! `name{labels} value` is skipped, and families we do not track are ignored.

use super::snapshot::MetricSnapshot;
use tracing::{debug, trace};

/// Which label-filtered series contribute to a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Interface names summed into the network counters
    pub interfaces: Vec<String>,
    /// Mountpoints kept in the filesystem map
    pub mountpoints: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            interfaces: vec!["eth0".to_string(), "wlan0".to_string()],
            mountpoints: vec!["/".to_string()],
        }
    }
}

/// Line counts from a single parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Samples that changed the snapshot
    pub applied: usize,
    /// Well-formed samples for untracked families or filtered labels
    pub ignored: usize,
    /// Lines that were not `name{labels} value` with a finite value
    pub malformed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    CpuSeconds,
    MemTotal,
    MemAvailable,
    NetReceive,
    NetTransmit,
    BootTime,
    Temperature,
    FsSize,
    FsAvail,
}

impl Family {
    fn from_name(name: &str) -> Option<Self> {
        let family = match name {
            "node_cpu_seconds_total" => Family::CpuSeconds,
            "node_memory_MemTotal_bytes" => Family::MemTotal,
            "node_memory_MemAvailable_bytes" => Family::MemAvailable,
            "node_network_receive_bytes_total" => Family::NetReceive,
            "node_network_transmit_bytes_total" => Family::NetTransmit,
            "node_boot_time_seconds" => Family::BootTime,
            "node_thermal_zone_temp" | "node_hwmon_temp_input" | "node_hwmon_temp_celsius" => {
                Family::Temperature
            }
            "node_filesystem_size_bytes" => Family::FsSize,
            "node_filesystem_avail_bytes" => Family::FsAvail,
            _ => return None,
        };
        Some(family)
    }
}

/// Parser for node_exporter text, configured with the interface and
/// mountpoint allow-lists of one monitored host.
#[derive(Debug, Clone, Default)]
pub struct MetricsTextParser {
    config: ParserConfig,
}

impl MetricsTextParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse exposition text into a snapshot. Never fails; bad lines are skipped.
    pub fn parse(&self, text: &str) -> MetricSnapshot {
        self.parse_with_stats(text).0
    }

    /// Parse exposition text, also reporting how each line was handled
    pub fn parse_with_stats(&self, text: &str) -> (MetricSnapshot, ParseStats) {
        let mut snapshot = MetricSnapshot::default();
        let mut stats = ParseStats::default();

        for (line_num, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((expr, value)) = split_sample(line) else {
                trace!(line = line_num + 1, "skipping malformed sample");
                stats.malformed += 1;
                continue;
            };

            if self.apply(&mut snapshot, expr, value) {
                stats.applied += 1;
            } else {
                stats.ignored += 1;
            }
        }

        debug!(
            applied = stats.applied,
            ignored = stats.ignored,
            malformed = stats.malformed,
            "parsed exposition text"
        );
        (snapshot, stats)
    }

    /// Fold one sample into the snapshot; returns false when it was ignored
    fn apply(&self, snapshot: &mut MetricSnapshot, expr: &str, value: f64) -> bool {
        let Some(family) = Family::from_name(metric_name(expr)) else {
            return false;
        };

        match family {
            Family::CpuSeconds => {
                snapshot.cpu.total_seconds += value;
                if label_value(expr, "mode") == Some("idle") {
                    snapshot.cpu.idle_seconds += value;
                }
            }
            Family::MemTotal => snapshot.memory.total_bytes = value,
            Family::MemAvailable => snapshot.memory.available_bytes = value,
            Family::NetReceive | Family::NetTransmit => {
                let tracked = label_value(expr, "device")
                    .is_some_and(|device| self.config.interfaces.iter().any(|i| i == device));
                if !tracked {
                    return false;
                }
                if family == Family::NetReceive {
                    snapshot.network.received_bytes += value;
                } else {
                    snapshot.network.transmitted_bytes += value;
                }
            }
            Family::BootTime => snapshot.boot_time_epoch_seconds = value,
            Family::Temperature => {
                // First sensor wins
                if snapshot.temperature_celsius.is_some() {
                    return false;
                }
                snapshot.temperature_celsius = Some(value);
            }
            Family::FsSize | Family::FsAvail => {
                let Some(mountpoint) = label_value(expr, "mountpoint")
                    .filter(|mp| self.config.mountpoints.iter().any(|m| m == mp))
                else {
                    return false;
                };
                let usage = snapshot
                    .filesystems
                    .entry(mountpoint.to_string())
                    .or_default();
                if family == Family::FsSize {
                    usage.size_bytes = value;
                } else {
                    usage.avail_bytes = value;
                }
            }
        }

        true
    }
}

/// Metric name of an expression, i.e. everything before the label block
fn metric_name(expr: &str) -> &str {
    match expr.find('{') {
        Some(open) => expr[..open].trim_end(),
        None => expr,
    }
}

/// Split `name{labels} value [timestamp]` into the expression and its value.
///
/// The expression runs to the closing brace when a label block is present,
/// otherwise to the first whitespace. Non-finite values are rejected.
fn split_sample(line: &str) -> Option<(&str, f64)> {
    let name_end = line.find(|c: char| c == '{' || c.is_whitespace())?;
    let expr_end = if line[name_end..].starts_with('{') {
        name_end + closing_brace(&line[name_end..])? + 1
    } else {
        name_end
    };

    let (expr, rest) = line.split_at(expr_end);
    let value: f64 = rest.split_whitespace().next()?.parse().ok()?;
    value.is_finite().then_some((expr, value))
}

/// Look up the raw value of label `name` in an expression's `{...}` block.
///
/// Keys are compared exactly, so `mode` never matches `xmode`. Escaped
/// quotes do not end a value; the value is returned without unescaping.
pub fn label_value<'a>(expr: &'a str, name: &str) -> Option<&'a str> {
    let open = expr.find('{')?;
    let close = open + closing_brace(&expr[open..])?;
    let mut rest = &expr[open + 1..close];

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() {
            return None;
        }

        let (key, after_key) = rest.split_once('=')?;
        let quoted = after_key.trim_start().strip_prefix('"')?;
        let end = closing_quote(quoted)?;
        if key.trim() == name {
            return Some(&quoted[..end]);
        }
        rest = &quoted[end + 1..];
    }
}

/// Byte offset of the `}` closing a label block, skipping quoted values
fn closing_brace(block: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in block.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Byte offset of the unescaped `"` ending a label value
fn closing_quote(value: &str) -> Option<usize> {
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::snapshot::FilesystemUsage;

    fn parser(interfaces: &[&str], mountpoints: &[&str]) -> MetricsTextParser {
        MetricsTextParser::new(ParserConfig {
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            mountpoints: mountpoints.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_cpu_seconds_sum_all_modes_and_idle() {
        let text = "\
# HELP node_cpu_seconds_total Seconds the CPUs spent in each mode.
# TYPE node_cpu_seconds_total counter
node_cpu_seconds_total{cpu=\"0\",mode=\"idle\"} 100
node_cpu_seconds_total{cpu=\"0\",mode=\"user\"} 50
";
        let snapshot = MetricsTextParser::default().parse(text);
        assert_eq!(snapshot.cpu.total_seconds, 150.0);
        assert_eq!(snapshot.cpu.idle_seconds, 100.0);
    }

    #[test]
    fn test_network_only_counts_allowed_interfaces() {
        let text = "\
node_network_receive_bytes_total{device=\"eth0\"} 1000
node_network_receive_bytes_total{device=\"lo\"} 999999
node_network_transmit_bytes_total{device=\"wlan0\"} 300
node_network_transmit_bytes_total{device=\"docker0\"} 12345
";
        let snapshot = parser(&["eth0", "wlan0"], &[]).parse(text);
        assert_eq!(snapshot.network.received_bytes, 1000.0);
        assert_eq!(snapshot.network.transmitted_bytes, 300.0);
    }

    #[test]
    fn test_network_without_device_label_is_ignored() {
        let text = "node_network_receive_bytes_total 1000\n";
        let (snapshot, stats) = parser(&["eth0"], &[]).parse_with_stats(text);
        assert_eq!(snapshot.network.received_bytes, 0.0);
        assert_eq!(stats.ignored, 1);
    }

    #[test]
    fn test_filesystems_restricted_to_mountpoints() {
        let text = "\
node_filesystem_size_bytes{device=\"/dev/sda1\",fstype=\"ext4\",mountpoint=\"/data\"} 500
node_filesystem_avail_bytes{device=\"/dev/sda1\",fstype=\"ext4\",mountpoint=\"/data\"} 200
node_filesystem_size_bytes{device=\"tmpfs\",fstype=\"tmpfs\",mountpoint=\"/run\"} 64
";
        let snapshot = parser(&[], &["/data"]).parse(text);
        assert_eq!(
            snapshot.filesystems.get("/data"),
            Some(&FilesystemUsage {
                size_bytes: 500.0,
                avail_bytes: 200.0,
            })
        );
        assert!(!snapshot.filesystems.contains_key("/run"));
        assert_eq!(snapshot.filesystems.len(), 1);
    }

    #[test]
    fn test_scalar_gauges_last_write_wins() {
        let text = "\
node_memory_MemTotal_bytes 1000
node_memory_MemTotal_bytes 2000
node_memory_MemAvailable_bytes 500
node_boot_time_seconds 1.7e9
";
        let snapshot = MetricsTextParser::default().parse(text);
        assert_eq!(snapshot.memory.total_bytes, 2000.0);
        assert_eq!(snapshot.memory.available_bytes, 500.0);
        assert_eq!(snapshot.boot_time_epoch_seconds, 1.7e9);
    }

    #[test]
    fn test_first_temperature_wins() {
        let text = "\
node_hwmon_temp_input{chip=\"coretemp\",sensor=\"temp1\"} 45.5
node_thermal_zone_temp{type=\"acpitz\",zone=\"0\"} 60
node_hwmon_temp_input{chip=\"coretemp\",sensor=\"temp2\"} 70
";
        let (snapshot, stats) = MetricsTextParser::default().parse_with_stats(text);
        assert_eq!(snapshot.temperature_celsius, Some(45.5));
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.ignored, 2);
    }

    #[test]
    fn test_missing_temperature_is_none() {
        let snapshot = MetricsTextParser::default().parse("node_boot_time_seconds 1\n");
        assert_eq!(snapshot.temperature_celsius, None);
    }

    #[test]
    fn test_empty_input_gives_default_snapshot() {
        assert_eq!(MetricsTextParser::default().parse(""), MetricSnapshot::default());
    }

    #[test]
    fn test_unknown_metrics_do_not_change_snapshot() {
        let base = "node_memory_MemTotal_bytes 1000\n";
        let with_noise = "\
node_memory_MemTotal_bytes 1000
node_load1 3.5
node_memory_MemFree_bytes 12
go_goroutines 8
node_cpu_seconds_total_extra{mode=\"idle\"} 99
";
        let parser = MetricsTextParser::default();
        assert_eq!(parser.parse(base), parser.parse(with_noise));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "\
node_memory_MemTotal_bytes
node_memory_MemTotal_bytes abc
node_memory_MemAvailable_bytes NaN
node_memory_MemAvailable_bytes +Inf
node_cpu_seconds_total{mode=\"idle\" 10
node_memory_MemTotal_bytes 4096
";
        let (snapshot, stats) = MetricsTextParser::default().parse_with_stats(text);
        assert_eq!(snapshot.memory.total_bytes, 4096.0);
        assert_eq!(snapshot.memory.available_bytes, 0.0);
        assert_eq!(snapshot.cpu.total_seconds, 0.0);
        assert_eq!(stats.malformed, 5);
        assert_eq!(stats.applied, 1);
    }

    #[test]
    fn test_trailing_timestamp_is_ignored() {
        let text = "node_memory_MemTotal_bytes 8192 1700000000000\n";
        let snapshot = MetricsTextParser::default().parse(text);
        assert_eq!(snapshot.memory.total_bytes, 8192.0);
    }

    #[test]
    fn test_label_values_with_spaces_and_braces() {
        let text = "node_filesystem_size_bytes{mountpoint=\"/mnt/My Disk {1}\"} 10\n";
        let snapshot = parser(&[], &["/mnt/My Disk {1}"]).parse(text);
        assert_eq!(snapshot.filesystems["/mnt/My Disk {1}"].size_bytes, 10.0);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "\
node_cpu_seconds_total{cpu=\"0\",mode=\"idle\"} 1.5
node_cpu_seconds_total{cpu=\"1\",mode=\"idle\"} 2.25
node_filesystem_avail_bytes{mountpoint=\"/\"} 7
";
        let parser = MetricsTextParser::default();
        assert_eq!(parser.parse(text), parser.parse(text));
    }

    #[test]
    fn test_label_value_exact_key_match() {
        let expr = "node_cpu_seconds_total{xmode=\"idle\",mode=\"user\"}";
        assert_eq!(label_value(expr, "mode"), Some("user"));
        assert_eq!(label_value(expr, "xmode"), Some("idle"));
        assert_eq!(label_value(expr, "cpu"), None);
    }

    #[test]
    fn test_label_value_without_block() {
        assert_eq!(label_value("node_boot_time_seconds", "mode"), None);
        assert_eq!(label_value("node_cpu_seconds_total{}", "mode"), None);
    }

    #[test]
    fn test_label_value_escaped_quote() {
        let expr = r#"metric{path="a\"b",mode="idle"}"#;
        assert_eq!(label_value(expr, "path"), Some(r#"a\"b"#));
        assert_eq!(label_value(expr, "mode"), Some("idle"));
    }

    #[test]
    fn test_label_value_ignores_key_text_inside_values() {
        let expr = r#"metric{device="mode=\"idle\"",mode="user"}"#;
        assert_eq!(label_value(expr, "mode"), Some("user"));
    }
}
