//! `filterbooks` - Dovecot sieve filter that tags messages with address books
//!
//! Reads one message on stdin and writes it to stdout with `X-Whitelisted`,
//! `X-FilterBook` and `X-FilterBooks` replaced by a fresh lookup result.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod logging;
mod settings;

use std::io::{self, BufWriter, Read};

use anyhow::{Context, Result};
use clap::Parser;
use filterbooks_client::FilterctlClient;
use filterbooks_scan::Scanner;
use tracing::{debug, error, info};

use settings::{Args, FileSettings, Settings};

fn main() -> Result<()> {
    let args = Args::parse();
    let file = FileSettings::load(args.config.as_deref())?;
    let settings = Settings::merge(args, file);

    logging::init(settings.verbose, settings.log_file.as_deref())?;
    debug!(version = env!("CARGO_PKG_VERSION"), "Starting filterbooks");

    if let Err(err) = run(&settings) {
        error!("{err:#}");
        return Err(err);
    }
    Ok(())
}

fn run(settings: &Settings) -> Result<()> {
    let scan_config = settings.scan_config()?;
    let client_config = settings.client_config()?;
    let client =
        FilterctlClient::new(&client_config).context("failed creating filterctl client")?;
    let scanner = Scanner::new(scan_config, client);

    let mut input = io::stdin().lock();
    let output = BufWriter::new(io::stdout().lock());

    match scanner.scan(&mut input, output) {
        Ok(report) => {
            info!(
                outcome = ?report.outcome,
                message_id = report.message_id.as_deref().unwrap_or(""),
                removed = report.removed,
                body_bytes = report.body_bytes,
                "scan complete"
            );
            Ok(())
        }
        Err(err) => {
            let discarded = drain(&mut input);
            debug!(discarded, "drained unread input");
            Err(err).context("scan failed")
        }
    }
}

/// Reads and discards unread input so the delivery agent's write end never
/// sees EPIPE. Returns the number of bytes discarded.
fn drain<R: Read>(input: &mut R) -> u64 {
    match io::copy(input, &mut io::sink()) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(error = %err, "failed draining input");
            0
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_drain_discards_rest() {
        let mut input: &[u8] = b"rest of body";
        assert_eq!(drain(&mut input), 12);
        assert!(input.is_empty());
    }

    #[test]
    fn test_drain_read_failure() {
        assert_eq!(drain(&mut Broken), 0);
    }
}
