//! Error types for fetching exporter output.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while fetching metrics text from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Target is neither an http(s) URL nor a usable path.
    #[error("Invalid metrics target: {0}")]
    InvalidTarget(String),

    /// HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Exporter answered with a non-success status.
    #[error("Exporter returned status {status}")]
    Status { status: u16 },

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Reading a local metrics file failed.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if let Some(status) = err.status() {
            SourceError::Status {
                status: status.as_u16(),
            }
        } else {
            SourceError::Http(err.to_string())
        }
    }
}
