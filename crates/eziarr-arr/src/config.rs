//! Connection settings for upstream services.

use std::time::Duration;

use eziarr_core::defaults;
use eziarr_core::{Error, Result, Service};

/// Base URL, API key and timeout of one upstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Value of the `X-Api-Key` header. Empty means unconfigured.
    pub api_key: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_secs: defaults::ARR_TIMEOUT_SECS,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Read `{PREFIX}_URL` and `{PREFIX}_API_KEY` from the environment.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `{PREFIX}_URL` | `default_url` | Service base URL |
    /// | `{PREFIX}_API_KEY` | empty | API key |
    /// | `ARR_TIMEOUT_SECS` | `30` | Per-request timeout |
    pub fn from_env_prefix(prefix: &str, default_url: &str) -> Self {
        let base_url =
            std::env::var(format!("{prefix}_URL")).unwrap_or_else(|_| default_url.to_string());
        let api_key = std::env::var(format!("{prefix}_API_KEY")).unwrap_or_default();
        let timeout_secs = std::env::var("ARR_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults::ARR_TIMEOUT_SECS);

        Self::new(base_url, api_key).with_timeout_secs(timeout_secs)
    }

    /// Environment configuration of a media-management service.
    pub fn for_service(service: Service) -> Self {
        let spec = service.spec();
        Self::from_env_prefix(spec.env_prefix, spec.default_url)
    }

    /// Environment configuration of the indexer aggregator.
    pub fn indexer_from_env() -> Self {
        Self::from_env_prefix("PROWLARR", defaults::PROWLARR_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The API key, or a configuration error naming `label` when it is empty.
    pub fn require_api_key(&self, label: &str) -> Result<&str> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config(format!("{label} API key is not set")));
        }
        Ok(&self.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = ServiceConfig::new("http://radarr:7878/", "k");
        assert_eq!(config.base_url, "http://radarr:7878");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_require_api_key() {
        let config = ServiceConfig::new("http://radarr:7878", "");
        let err = config.require_api_key("radarr").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            ServiceConfig::new("http://x", "abc")
                .require_api_key("radarr")
                .unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_from_env_prefix_defaults() {
        let config = ServiceConfig::from_env_prefix("EZIARR_TEST_UNSET_SERVICE", "http://localhost:1");
        assert_eq!(config.base_url, "http://localhost:1");
        assert!(config.api_key.is_empty());
    }
}
