//! Metric parsing and rate derivation for node_exporter output.

pub mod parser;
pub mod rate;
pub mod snapshot;

pub use parser::{label_value, MetricsTextParser, ParseStats, ParserConfig};
pub use rate::{DerivedMetrics, RateEstimator};
pub use snapshot::{CpuTotals, FilesystemUsage, MemoryTotals, MetricSnapshot, NetworkTotals};
