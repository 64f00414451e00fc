//! Canned WHOIS double.
//!
//! Returns preset responses or errors per domain without opening sockets.
//! It also records how many lookups were in flight at once, which is how the
//! batch tests observe the worker pool size.

use super::whois::{LookupFuture, WhoisLookup};
use crate::error::TaliaError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum CannedReply {
    Response(String),
    Failure(TaliaError),
}

/// [`WhoisLookup`] implementation backed by a lookup table.
#[derive(Debug)]
pub struct CannedLookup {
    replies: HashMap<String, CannedReply>,
    fallback: CannedReply,
    latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CannedLookup {
    /// A double that answers every unknown domain with an empty-response error.
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            fallback: CannedReply::Failure(TaliaError::empty_response("canned")),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_response<D: Into<String>, R: Into<String>>(mut self, domain: D, response: R) -> Self {
        self.replies
            .insert(domain.into(), CannedReply::Response(response.into()));
        self
    }

    pub fn with_error<D: Into<String>>(mut self, domain: D, error: TaliaError) -> Self {
        self.replies.insert(domain.into(), CannedReply::Failure(error));
        self
    }

    /// Response for any domain without its own entry.
    pub fn with_default_response<R: Into<String>>(mut self, response: R) -> Self {
        self.fallback = CannedReply::Response(response.into());
        self
    }

    /// Delay every lookup, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Highest number of lookups observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Total lookups performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reply_for(&self, domain: &str) -> Result<String, TaliaError> {
        match self.replies.get(domain).unwrap_or(&self.fallback) {
            CannedReply::Response(text) => Ok(text.clone()),
            CannedReply::Failure(err) => Err(err.clone()),
        }
    }
}

impl Default for CannedLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl WhoisLookup for CannedLookup {
    fn lookup<'a>(&'a self, domain: &'a str) -> LookupFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.reply_for(domain)
        })
    }

    fn endpoint(&self) -> &str {
        "canned"
    }
}
