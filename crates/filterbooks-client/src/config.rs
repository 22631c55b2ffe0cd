//! Client configuration types.

use std::path::PathBuf;

/// Default service address, a filterctl daemon on the local host.
pub const DEFAULT_BASE_URL: &str = "https://127.0.0.1:2017";

/// Lookup client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service base URL.
    pub base_url: String,
    /// API key sent as `X-Api-Key`.
    pub api_key: String,
    /// PEM client certificate.
    pub cert: Option<PathBuf>,
    /// PEM private key for `cert`.
    pub key: Option<PathBuf>,
    /// PEM CA bundle trusted in addition to the built-in roots.
    pub ca: Option<PathBuf>,
}

impl ClientConfig {
    /// Creates a configuration for the default base URL.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            cert: None,
            key: None,
            ca: None,
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the client certificate and its key.
    #[must_use]
    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.cert = Some(cert.into());
        self.key = Some(key.into());
        self
    }

    /// Sets the CA bundle.
    #[must_use]
    pub fn with_ca(mut self, ca: impl Into<PathBuf>) -> Self {
        self.ca = Some(ca.into());
        self
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = ClientConfig::new("secret");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_key, "secret");
        assert!(config.cert.is_none());
        assert!(config.ca.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("secret")
            .with_base_url("https://filterctl.example.com:2017")
            .with_client_cert("/etc/ssl/client.pem", "/etc/ssl/client.key")
            .with_ca("/etc/ssl/ca.pem");

        assert_eq!(config.base_url, "https://filterctl.example.com:2017");
        assert_eq!(config.cert, Some(PathBuf::from("/etc/ssl/client.pem")));
        assert_eq!(config.key, Some(PathBuf::from("/etc/ssl/client.key")));
        assert_eq!(config.ca, Some(PathBuf::from("/etc/ssl/ca.pem")));
    }
}
