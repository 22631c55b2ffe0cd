//! Settings from the command line, the environment and a config file.
//!
//! Command-line flags win over environment variables (both handled by
//! `clap`), which win over the JSON config file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use filterbooks_client::{ClientConfig, DEFAULT_BASE_URL};
use filterbooks_scan::ScanConfig;
use serde::Deserialize;

/// Command-line arguments.
#[derive(Parser, Debug, Default)]
#[command(
    name = "filterbooks",
    version,
    about = "Dovecot sieve filter implementing filter-books header manipulation",
    long_about = "Scan an email message from stdin and write it to stdout, modifying headers.\n\n\
        The sender is looked up in the recipient's address books and the result added as\n\
        X-Whitelisted, X-FilterBook and X-FilterBooks headers; old copies are removed.\n\n\
        Messages are passed through unchanged when they carry X-Filterctl-Request-Id, or\n\
        when SENDER starts with MAILER-DAEMON@ or SIEVE-DAEMON@.\n\n\
        The lookup address is $USER at the domain part of the host name."
)]
pub struct Args {
    /// JSON config file
    #[arg(long, env = "FILTERBOOKS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fully qualified host name; its domain names the recipient mailbox
    #[arg(long, env = "FILTERBOOKS_HOST")]
    pub host: Option<String>,

    /// Local recipient user
    #[arg(long, env = "USER")]
    pub user: Option<String>,

    /// Envelope sender
    #[arg(long, env = "SENDER")]
    pub sender: Option<String>,

    /// Lookup service API key
    #[arg(long, env = "FILTERBOOKS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Lookup service base URL
    #[arg(long, env = "FILTERBOOKS_URL")]
    pub url: Option<String>,

    /// PEM client certificate
    #[arg(long, env = "FILTERBOOKS_CERT")]
    pub cert: Option<PathBuf>,

    /// PEM client key
    #[arg(long, env = "FILTERBOOKS_KEY")]
    pub key: Option<PathBuf>,

    /// PEM CA bundle
    #[arg(long, env = "FILTERBOOKS_CA")]
    pub ca: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, env = "FILTERBOOKS_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log each header decision
    #[arg(short, long, env = "FILTERBOOKS_VERBOSE")]
    pub verbose: bool,
}

/// Contents of the JSON config file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Host name.
    pub host: Option<String>,
    /// Recipient user.
    pub user: Option<String>,
    /// Envelope sender.
    pub sender: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Service base URL.
    #[serde(alias = "filterctld_url")]
    pub url: Option<String>,
    /// Client certificate.
    pub cert: Option<PathBuf>,
    /// Client key.
    pub key: Option<PathBuf>,
    /// CA bundle.
    pub ca: Option<PathBuf>,
    /// Log file.
    #[serde(alias = "logfile")]
    pub log_file: Option<PathBuf>,
    /// Verbose logging.
    pub verbose: Option<bool>,
}

impl FileSettings {
    /// Loads the config file.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// read if present and otherwise empty settings are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed parsing config file {}", path.display()))
    }
}

/// Default config file location.
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("filterbooks").join("config.json"))
}

/// Merged settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Host name.
    pub host: Option<String>,
    /// Recipient user.
    pub user: Option<String>,
    /// Envelope sender.
    pub sender: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Service base URL.
    pub url: String,
    /// Client certificate.
    pub cert: Option<PathBuf>,
    /// Client key.
    pub key: Option<PathBuf>,
    /// CA bundle.
    pub ca: Option<PathBuf>,
    /// Log file.
    pub log_file: Option<PathBuf>,
    /// Verbose logging.
    pub verbose: bool,
}

impl Settings {
    /// Merges arguments over file settings.
    #[must_use]
    pub fn merge(args: Args, file: FileSettings) -> Self {
        Self {
            host: args.host.or(file.host),
            user: args.user.or(file.user),
            sender: args.sender.or(file.sender),
            api_key: args.api_key.or(file.api_key),
            url: args
                .url
                .or(file.url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            cert: args.cert.or(file.cert),
            key: args.key.or(file.key),
            ca: args.ca.or(file.ca),
            log_file: args.log_file.or(file.log_file),
            verbose: args.verbose || file.verbose.unwrap_or(false),
        }
    }

    /// Builds the validated scan configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `host`, `user` or `sender` is missing or invalid.
    pub fn scan_config(&self) -> filterbooks_scan::Result<ScanConfig> {
        ScanConfig::new(
            self.host.as_deref(),
            self.user.as_deref(),
            self.sender.as_deref(),
        )
    }

    /// Builds the lookup client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing.
    pub fn client_config(&self) -> filterbooks_scan::Result<ClientConfig> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(filterbooks_scan::Error::ConfigMissing("api_key"))?;

        Ok(ClientConfig {
            base_url: self.url.clone(),
            api_key: api_key.to_string(),
            cert: self.cert.clone(),
            key: self.key.clone(),
            ca: self.ca.clone(),
        })
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
    use std::io::Write;

    #[test]
    fn test_args_override_file() {
        let args = Args {
            host: Some("mx.example.com".into()),
            sender: Some("bob@other.org".into()),
            ..Args::default()
        };
        let file = FileSettings {
            host: Some("ignored.example.net".into()),
            user: Some("alice".into()),
            api_key: Some("from-file".into()),
            verbose: Some(true),
            ..FileSettings::default()
        };

        let settings = Settings::merge(args, file);

        assert_eq!(settings.host.as_deref(), Some("mx.example.com"));
        assert_eq!(settings.user.as_deref(), Some("alice"));
        assert_eq!(settings.api_key.as_deref(), Some("from-file"));
        assert_eq!(settings.url, DEFAULT_BASE_URL);
        assert!(settings.verbose);
    }

    #[test]
    fn test_scan_config_from_settings() {
        let settings = Settings {
            host: Some("mx.example.com".into()),
            user: Some("alice".into()),
            sender: Some("bob@other.org".into()),
            ..Settings::default()
        };
        let config = settings.scan_config().unwrap();
        assert_eq!(config.recipient.as_str(), "alice@example.com");
    }

    #[test]
    fn test_missing_sender() {
        let settings = Settings {
            host: Some("mx.example.com".into()),
            user: Some("alice".into()),
            ..Settings::default()
        };
        assert!(matches!(
            settings.scan_config(),
            Err(filterbooks_scan::Error::ConfigMissing("sender"))
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let settings = Settings {
            api_key: Some("  ".into()),
            ..Settings::default()
        };
        assert!(matches!(
            settings.client_config(),
            Err(filterbooks_scan::Error::ConfigMissing("api_key"))
        ));
    }

    #[test]
    fn test_client_config_from_settings() {
        let settings = Settings {
            api_key: Some("secret".into()),
            url: "https://filterctl.example.com".into(),
            cert: Some("/etc/filterbooks/client.pem".into()),
            key: Some("/etc/filterbooks/client.key".into()),
            ..Settings::default()
        };
        let config = settings.client_config().unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.base_url, "https://filterctl.example.com");
        assert_eq!(config.key, Some(PathBuf::from("/etc/filterbooks/client.key")));
        assert!(config.ca.is_none());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"host": "mx.example.com", "api_key": "k", "filterctld_url": "https://10.0.0.1:2017", "logfile": "/var/log/filterbooks.log"}}"#
        )
        .unwrap();

        let settings = FileSettings::load(Some(file.path())).unwrap();

        assert_eq!(settings.host.as_deref(), Some("mx.example.com"));
        assert_eq!(settings.url.as_deref(), Some("https://10.0.0.1:2017"));
        assert_eq!(
            settings.log_file,
            Some(PathBuf::from("/var/log/filterbooks.log"))
        );
        assert!(settings.user.is_none());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSettings::load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(err.to_string().contains("failed reading config file"));
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "host = mx.example.com").unwrap();
        let err = FileSettings::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("failed parsing config file"));
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "filterbooks",
            "--host",
            "mx.example.com",
            "--user",
            "alice",
            "--sender",
            "bob@other.org",
            "--api-key",
            "secret",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.host.as_deref(), Some("mx.example.com"));
        assert_eq!(args.api_key.as_deref(), Some("secret"));
        assert!(args.verbose);
    }
}
