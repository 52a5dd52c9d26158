//! Parsing and rate derivation for node_exporter metrics.
//!
//! [`metrics::MetricsTextParser`] turns exposition text into a
//! [`metrics::MetricSnapshot`]; a [`metrics::RateEstimator`] per monitored
//! host turns successive snapshots into CPU, memory, network and disk usage.
//!
//! ```
//! use chrono::Utc;
//! use nasmon::metrics::{MetricsTextParser, ParserConfig, RateEstimator};
//!
//! let parser = MetricsTextParser::new(ParserConfig::default());
//! let mut estimator = RateEstimator::new();
//!
//! let snapshot = parser.parse("node_memory_MemTotal_bytes 4096\nnode_memory_MemAvailable_bytes 1024\n");
//! let derived = estimator.update(snapshot, Utc::now());
//! assert_eq!(derived.memory_usage_percent, 75.0);
//! assert!(derived.cpu_usage_percent.is_none());
//! ```

pub mod display;
pub mod error;
pub mod metrics;
pub mod source;

pub use error::SourceError;
