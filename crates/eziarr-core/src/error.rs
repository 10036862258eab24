//! Crate-wide error type.
//!
//! Upstream failures keep the service that caused them so the hunter and the
//! sync job can report per-service outcomes without string matching.

use thiserror::Error;

use crate::models::Service;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    /// Radarr, Sonarr or Lidarr was unreachable, timed out, or answered non-2xx.
    #[error("{service} unavailable: {message}")]
    Upstream { service: Service, message: String },

    #[error("malformed payload: {0}")]
    Serialization(String),

    /// Missing URL, API key or session credentials.
    #[error("not configured: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Network failure against anything other than a media service.
    #[error("request failed: {0}")]
    Request(String),

    #[error("{0}")]
    Internal(String),

    #[error("filesystem: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn upstream(service: Service, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    /// True for failures that say nothing about the local record store, only
    /// about a remote that may recover on the next tick.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Request(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Serialization(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}
