//! WHOIS protocol implementation for domain availability checking.
//!
//! RFC 3912 has no length prefix and no end-of-response marker: the client
//! sends one query line, half-closes its side and reads until the server
//! closes. This module frames that exchange over a tokio `TcpStream` and turns
//! the raw text into an [`Availability`] verdict.

use crate::error::TaliaError;
use crate::types::{Availability, CheckResult};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Substring a registry returns when it has no record for the queried name.
pub const NO_MATCH_MARKER: &str = "No match for";

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Boxed future returned by [`WhoisLookup::lookup`].
pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = Result<String, TaliaError>> + Send + 'a>>;

/// A single WHOIS request/response exchange.
///
/// The batch checker only ever talks to this trait, so tests can swap the
/// network client for [`CannedLookup`](crate::CannedLookup).
pub trait WhoisLookup: Send + Sync {
    /// Query `domain` and return the full raw response.
    fn lookup<'a>(&'a self, domain: &'a str) -> LookupFuture<'a>;

    /// Human-readable endpoint description used in logs.
    fn endpoint(&self) -> &str;
}

/// WHOIS client that talks to one configured server over TCP.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    /// Server address as `host:port`
    server: String,
    /// Connect timeout
    dial_timeout: Duration,
}

impl WhoisClient {
    /// Create a new client for `server` (`host:port`) with the default
    /// 10 second connect timeout.
    pub fn new<S: Into<String>>(server: S) -> Self {
        Self {
            server: server.into(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    /// Set a custom connect timeout.
    pub fn with_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    /// Perform one exchange with the server.
    ///
    /// # Errors
    ///
    /// Returns `TaliaError` if:
    /// - The connection cannot be opened within the dial timeout
    /// - The query line cannot be written
    /// - The read fails, or the server sends zero bytes
    #[instrument(skip(self), fields(server = %self.server))]
    pub async fn query(&self, domain: &str) -> Result<String, TaliaError> {
        let mut stream = timeout(self.dial_timeout, TcpStream::connect(&self.server))
            .await
            .map_err(|_| TaliaError::connect_timeout(&self.server, self.dial_timeout))?
            .map_err(|e| TaliaError::connect(&self.server, e.to_string()))?;

        let line = format!("{}\r\n", domain);
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TaliaError::write(&self.server, e.to_string()))?;

        // Half-close so the server sees EOF on its read side.
        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "half-close failed, reading anyway");
        }

        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .await
            .map_err(|e| remap_read_error(&self.server, e))?;

        if data.is_empty() {
            return Err(TaliaError::empty_response(&self.server));
        }

        debug!(bytes = data.len(), "WHOIS response received");
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

impl WhoisLookup for WhoisClient {
    fn lookup<'a>(&'a self, domain: &'a str) -> LookupFuture<'a> {
        Box::pin(self.query(domain))
    }

    fn endpoint(&self) -> &str {
        &self.server
    }
}

/// Map a read failure onto the lookup taxonomy.
///
/// Resets, broken pipes and premature closes all become `EmptyResponse`,
/// the same as a server that closed without answering.
pub(crate) fn remap_read_error(server: &str, err: io::Error) -> TaliaError {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => TaliaError::empty_response(server),
        _ => TaliaError::read(server, err.to_string()),
    }
}

/// Classify a non-empty WHOIS response.
pub fn classify(response: &str) -> Availability {
    if response.contains(NO_MATCH_MARKER) {
        Availability::NoMatch
    } else {
        Availability::Taken
    }
}

/// Look up one domain and turn the outcome into a [`CheckResult`].
///
/// Failures never propagate: they become an `ERROR` result whose log holds
/// the error detail. Classification only runs on a non-empty response.
pub async fn check_domain(client: &dyn WhoisLookup, domain: &str) -> CheckResult {
    let outcome = match client.lookup(domain).await {
        Ok(response) if response.is_empty() => Err(TaliaError::empty_response(client.endpoint())),
        other => other,
    };

    match outcome {
        Ok(response) => {
            let availability = classify(&response);
            debug!(domain = %domain, reason = %availability, "domain classified");
            CheckResult {
                domain: domain.to_string(),
                availability,
                raw_log: response,
            }
        }
        Err(err) => {
            warn!(domain = %domain, error = %err, "WHOIS lookup failed");
            CheckResult {
                domain: domain.to_string(),
                availability: Availability::Error,
                raw_log: format!("Error: {}", err),
            }
        }
    }
}
