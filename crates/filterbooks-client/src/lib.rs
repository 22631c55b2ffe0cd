//! # filterbooks-client
//!
//! Blocking HTTPS client for the filterctl address-book scan service.
//!
//! The service answers `GET /filterctl/scan/{recipient}/{sender}/` with
//! `{"success", "message", "whitelisted", "book", "books"}`. Requests carry an
//! `X-Api-Key` header and may present a client certificate.
//!
//! ```ignore
//! use filterbooks_client::{ClientConfig, FilterctlClient};
//!
//! let config = ClientConfig::new("api-key")
//!     .with_client_cert("/etc/filterbooks/client.pem", "/etc/filterbooks/client.key")
//!     .with_ca("/etc/filterbooks/ca.pem");
//! let client = FilterctlClient::new(&config)?;
//! let response = client.get_scan("alice@example.com", "bob@other.org")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod config;
mod error;

pub use client::FilterctlClient;
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::{Error, Result};
