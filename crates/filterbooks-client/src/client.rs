//! Blocking HTTPS client for the scan endpoint.

use std::fs;
use std::net::IpAddr;

use filterbooks_scan::{Lookup, Mailbox, ScanResponse};
use reqwest::blocking::Client;
use reqwest::{Certificate, Identity};
use tracing::debug;
use url::{Host, Url};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for the filterctl daemon.
///
/// One call makes one request; nothing is retried or cached.
#[derive(Debug, Clone)]
pub struct FilterctlClient {
    base_url: Url,
    api_key: String,
    http_client: Client,
}

impl FilterctlClient {
    /// Creates a client, loading any certificate, key and CA files.
    ///
    /// Proxies are bypassed when the service is on a loopback address.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty, the base URL is invalid,
    /// only one of certificate and key is set, or a PEM file cannot be read
    /// or parsed.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("missing api_key".into()));
        }

        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "base URL cannot have a path: {base_url}"
            )));
        }

        let mut builder =
            Client::builder().user_agent(concat!("filterbooks/", env!("CARGO_PKG_VERSION")));

        if let Some(ca) = &config.ca {
            let pem = fs::read(ca)?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
            debug!(ca = %ca.display(), "loaded CA certificate");
        }

        match (&config.cert, &config.key) {
            (Some(cert), Some(key)) => {
                let mut pem = fs::read(cert)?;
                pem.push(b'\n');
                pem.extend(fs::read(key)?);
                builder = builder.identity(Identity::from_pem(&pem)?);
                debug!(cert = %cert.display(), "loaded client certificate");
            }
            (None, None) => {}
            _ => {
                return Err(Error::InvalidConfig(
                    "client certificate and key must be set together".into(),
                ));
            }
        }

        if is_loopback(&base_url) {
            builder = builder.no_proxy();
        }

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            http_client: builder.build()?,
        })
    }

    /// Returns the scan URL for a recipient and sender.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot take path segments.
    pub fn scan_url(&self, recipient: &str, sender: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::InvalidConfig(format!("base URL cannot have a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["filterctl", "scan", recipient, sender, ""]);
        Ok(url)
    }

    /// Asks the service which books of `recipient` contain `sender`.
    ///
    /// A `success: false` reply is returned as-is; it is decoded, not a
    /// transport failure.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status, or a body
    /// that is not a scan response.
    pub fn get_scan(&self, recipient: &str, sender: &str) -> Result<ScanResponse> {
        let url = self.scan_url(recipient, sender)?;
        debug!(%url, "GET");

        let response = self
            .http_client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(Into::into)
    }
}

impl Lookup for FilterctlClient {
    fn scan(
        &self,
        recipient: &Mailbox,
        sender: &Mailbox,
    ) -> filterbooks_scan::Result<ScanResponse> {
        self.get_scan(recipient.as_str(), sender.as_str())?
            .into_result()
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
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
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serves one canned HTTP response and returns the raw request.
    fn serve_once(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    fn client(base_url: &str) -> FilterctlClient {
        FilterctlClient::new(&ClientConfig::new("secret").with_base_url(base_url)).unwrap()
    }

    fn mailbox(addr: &str) -> Mailbox {
        Mailbox::new(addr).unwrap()
    }

    #[test]
    fn test_scan_url() {
        let client = client("https://127.0.0.1:2017");
        assert_eq!(
            client
                .scan_url("user@example.com", "first+tag@other.com")
                .unwrap()
                .as_str(),
            "https://127.0.0.1:2017/filterctl/scan/user@example.com/first+tag@other.com/"
        );
    }

    #[test]
    fn test_scan_url_with_base_path() {
        let client = client("https://filterctl.example.com/api/");
        assert_eq!(
            client.scan_url("a@b.cc", "c@d.ee").unwrap().as_str(),
            "https://filterctl.example.com/api/filterctl/scan/a@b.cc/c@d.ee/"
        );
    }

    #[test]
    fn test_scan_url_encodes_percent() {
        let client = client("https://127.0.0.1:2017");
        assert_eq!(
            client.scan_url("a@b.cc", "x%y@d.ee").unwrap().path(),
            "/filterctl/scan/a@b.cc/x%25y@d.ee/"
        );
    }

    #[test]
    fn test_missing_api_key() {
        let err = FilterctlClient::new(&ClientConfig::new("")).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig::new("secret").with_base_url("not a url");
        assert!(matches!(FilterctlClient::new(&config), Err(Error::Url(_))));

        let config = ClientConfig::new("secret").with_base_url("mailto:admin@example.com");
        assert!(matches!(
            FilterctlClient::new(&config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cert_without_key() {
        let mut config = ClientConfig::new("secret");
        config.cert = Some("/nonexistent/client.pem".into());
        assert!(matches!(
            FilterctlClient::new(&config),
            Err(Error::Io(_) | Error::InvalidConfig(_))
        ));

        let mut config = ClientConfig::new("secret");
        config.key = Some("/nonexistent/client.key".into());
        assert!(matches!(
            FilterctlClient::new(&config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_ca_file() {
        let config = ClientConfig::new("secret").with_ca("/nonexistent/ca.pem");
        assert!(matches!(FilterctlClient::new(&config), Err(Error::Io(_))));
    }

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback(&Url::parse("https://127.0.0.1:2017").unwrap()));
        assert!(is_loopback(&Url::parse("https://[::1]:2017").unwrap()));
        assert!(is_loopback(&Url::parse("https://LocalHost:2017").unwrap()));
        assert!(!is_loopback(&Url::parse("https://filterctl.example.com").unwrap()));
    }

    #[test]
    fn test_scan_request() {
        let body = r#"{"success":true,"message":"","whitelisted":true,"book":"family","books":["family","work"]}"#;
        let (base_url, server) = serve_once("HTTP/1.1 200 OK", body.to_string());

        let response = client(&base_url)
            .scan(&mailbox("user@example.com"), &mailbox("sender@other.com"))
            .unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /filterctl/scan/user@example.com/sender@other.com/ HTTP/1.1\r\n"));
        assert!(request.to_lowercase().contains("x-api-key: secret\r\n"));
        assert!(response.whitelisted);
        assert_eq!(response.book, "family");
        assert_eq!(response.books, vec!["family", "work"]);
    }

    #[test]
    fn test_scan_rejected() {
        let body = r#"{"success":false,"message":"unknown user"}"#;
        let (base_url, server) = serve_once("HTTP/1.1 200 OK", body.to_string());

        let err = client(&base_url)
            .scan(&mailbox("user@example.com"), &mailbox("sender@other.com"))
            .unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, filterbooks_scan::Error::LookupRejected(ref m) if m == "unknown user"));
    }

    #[test]
    fn test_scan_http_status_is_unavailable() {
        let (base_url, server) =
            serve_once("HTTP/1.1 500 Internal Server Error", "{}".to_string());

        let err = client(&base_url)
            .get_scan("user@example.com", "sender@other.com")
            .unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, Error::Status { status: 500, .. }));
        assert!(matches!(
            filterbooks_scan::Error::from(err),
            filterbooks_scan::Error::LookupUnavailable(_)
        ));
    }

    #[test]
    fn test_scan_bad_json_is_unavailable() {
        let (base_url, server) = serve_once("HTTP/1.1 200 OK", "not json".to_string());

        let err = client(&base_url)
            .scan(&mailbox("user@example.com"), &mailbox("sender@other.com"))
            .unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, filterbooks_scan::Error::LookupUnavailable(ref m) if m.contains("decoding")));
    }

    #[test]
    fn test_connection_refused_is_unavailable() {
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

        let err = client(&format!("http://{addr}"))
            .scan(&mailbox("user@example.com"), &mailbox("sender@other.com"))
            .unwrap_err();

        assert!(err.is_lookup());
        assert!(matches!(err, filterbooks_scan::Error::LookupUnavailable(_)));
    }
}
