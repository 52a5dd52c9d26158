//! Where exposition text comes from: an exporter URL or a recorded file.

use crate::error::SourceError;
use reqwest::{Client, Url};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Source of node_exporter text for one monitored host
#[derive(Debug, Clone)]
pub enum MetricsSource {
    /// Scrape an exporter over HTTP(S)
    Http { client: Client, url: Url },
    /// Read a file containing exporter output
    File(PathBuf),
}

impl MetricsSource {
    /// Build a source from a CLI target. `http://` and `https://` targets are
    /// scraped with the given request timeout; anything else is a file path.
    pub fn from_target(target: &str, timeout: Duration) -> Result<Self, SourceError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(SourceError::InvalidTarget("empty target".to_string()));
        }

        if target.starts_with("http://") || target.starts_with("https://") {
            let url = Url::parse(target)
                .map_err(|e| SourceError::InvalidTarget(format!("{}: {}", target, e)))?;
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| SourceError::Client(e.to_string()))?;
            Ok(MetricsSource::Http { client, url })
        } else {
            Ok(MetricsSource::File(PathBuf::from(target)))
        }
    }

    /// Whether this source scrapes over HTTP rather than reading a file
    pub fn is_http(&self) -> bool {
        matches!(self, MetricsSource::Http { .. })
    }

    /// Fetch the current exposition text
    pub async fn fetch(&self) -> Result<String, SourceError> {
        match self {
            MetricsSource::Http { client, url } => {
                let response = client.get(url.clone()).send().await?;

                if !response.status().is_success() {
                    return Err(SourceError::Status {
                        status: response.status().as_u16(),
                    });
                }

                let text = response.text().await?;
                debug!(url = %url, bytes = text.len(), "scraped exporter");
                Ok(text)
            }
            MetricsSource::File(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| SourceError::Io {
                        path: path.clone(),
                        source,
                    })?;
                debug!(path = %path.display(), bytes = text.len(), "read metrics file");
                Ok(text)
            }
        }
    }
}

impl fmt::Display for MetricsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsSource::Http { url, .. } => write!(f, "{}", url),
            MetricsSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn test_http_targets_build_http_source() {
        let source = MetricsSource::from_target("http://nas.local:9100/metrics", TIMEOUT).unwrap();
        assert!(source.is_http());
        assert_eq!(source.to_string(), "http://nas.local:9100/metrics");
    }

    #[test]
    fn test_other_targets_are_files() {
        let source = MetricsSource::from_target("./recorded.prom", TIMEOUT).unwrap();
        assert!(!source.is_http());
        assert_eq!(source.to_string(), "./recorded.prom");
    }

    #[test]
    fn test_empty_target_is_rejected() {
        let err = MetricsSource::from_target("  ", TIMEOUT).unwrap_err();
        assert!(matches!(err, SourceError::InvalidTarget(_)));
    }

    #[test]
    fn test_malformed_url_is_rejected() {
        let err = MetricsSource::from_target("http://", TIMEOUT).unwrap_err();
        assert!(matches!(err, SourceError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn test_fetch_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "node_boot_time_seconds 42").unwrap();

        let source =
            MetricsSource::from_target(file.path().to_str().unwrap(), TIMEOUT).unwrap();
        let text = source.fetch().await.unwrap();
        assert_eq!(text, "node_boot_time_seconds 42\n");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.prom");

        let source = MetricsSource::from_target(path.to_str().unwrap(), TIMEOUT).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
