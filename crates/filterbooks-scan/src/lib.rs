//! # filterbooks-scan
//!
//! Streaming header rewriter for mail delivery filters.
//!
//! A scan reads one message, classifies its header lines, asks a
//! classification service which of the recipient's address books hold the
//! sender, and writes the message back out with the answer injected as
//! headers:
//!
//! ```text
//! X-Whitelisted: yes
//! X-FilterBook: family
//! X-FilterBooks: family,work
//! ```
//!
//! Everything else is copied byte for byte. Stale copies of these headers
//! are removed first, so scanning an annotated message again does not
//! accumulate duplicates. A message carrying `X-Filterctl-Request-Id` is
//! passed through without a lookup, and bounces from `MAILER-DAEMON@` or
//! `SIEVE-DAEMON@` are copied unchanged.
//!
//! ## Quick Start
//!
//! ```ignore
//! use filterbooks_scan::{ScanConfig, Scanner};
//!
//! let config = ScanConfig::new(Some("mx.example.com"), Some("alice"), Some("bob@other.org"))?;
//! let scanner = Scanner::new(config, lookup);
//! let report = scanner.scan(std::io::stdin().lock(), std::io::stdout().lock())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod assemble;
mod block;
mod config;
mod error;
pub mod header;
pub mod line;
mod lookup;
mod scanner;

pub use address::{Mailbox, bracketed_text, header_value};
pub use assemble::{assemble, copy_body, injected_headers};
pub use block::{HeaderBlock, ScanState};
pub use config::{SKIP_SENDERS, ScanConfig};
pub use error::{Error, Result};
pub use line::{LineEnding, LineReader, MAX_LINE_LENGTH};
pub use lookup::{Lookup, ScanResponse};
pub use scanner::{Outcome, ScanReport, Scanner};
