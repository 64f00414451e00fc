//! Core data types for WHOIS availability checking.
//!
//! This module defines the per-domain check result, the two durable record
//! shapes (grouped buckets and the legacy flat array) and the configuration
//! that drives a batch run.

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TaliaError;

/// Short reason code attached to every checked domain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Availability {
    /// The registry answered with "No match for", so the name is free
    #[serde(rename = "NO_MATCH")]
    NoMatch,

    /// The registry answered with anything else
    #[serde(rename = "TAKEN")]
    Taken,

    /// The lookup itself failed
    #[serde(rename = "ERROR")]
    Error,
}

impl Availability {
    /// Whether this verdict puts the domain in the *available* bucket.
    pub fn is_available(self) -> bool {
        matches!(self, Availability::NoMatch)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::NoMatch => write!(f, "NO_MATCH"),
            Availability::Taken => write!(f, "TAKEN"),
            Availability::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of checking one domain in one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// The domain that was queried
    pub domain: String,

    /// Verdict for the domain
    pub availability: Availability,

    /// Raw WHOIS response, or `Error: <detail>` when the lookup failed
    pub raw_log: String,
}

impl CheckResult {
    pub fn is_available(&self) -> bool {
        self.availability.is_available()
    }
}

/// One entry of the grouped store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupedRecord {
    pub domain: String,
    pub reason: Availability,
    #[serde(default, skip_serializing_if = "log_is_empty")]
    pub log: Option<String>,
}

impl GroupedRecord {
    pub fn new<D: Into<String>>(domain: D, reason: Availability) -> Self {
        Self {
            domain: domain.into(),
            reason,
            log: None,
        }
    }

    pub fn with_log<L: Into<String>>(mut self, log: L) -> Self {
        self.log = Some(log.into());
        self
    }
}

/// One entry of the legacy flat array shape.
///
/// Entries that have never been checked usually carry only `domain`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainRecord {
    pub domain: String,
    #[serde(default)]
    pub available: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_reason_as_none"
    )]
    pub reason: Option<Availability>,
    #[serde(default, skip_serializing_if = "log_is_empty")]
    pub log: Option<String>,
}

impl DomainRecord {
    pub fn unchecked<D: Into<String>>(domain: D) -> Self {
        Self {
            domain: domain.into(),
            available: false,
            reason: None,
            log: None,
        }
    }
}

/// Top-level grouped store: two disjoint buckets keyed by domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupedData {
    #[serde(default, deserialize_with = "available_bucket")]
    pub available: Vec<GroupedRecord>,
    #[serde(default, deserialize_with = "unavailable_bucket")]
    pub unavailable: Vec<GroupedRecord>,
}

impl GroupedData {
    pub fn is_empty(&self) -> bool {
        self.available.is_empty() && self.unavailable.is_empty()
    }

    /// Domains of the *available* bucket, in bucket order.
    pub fn available_domains(&self) -> Vec<&str> {
        self.available.iter().map(|r| r.domain.as_str()).collect()
    }

    /// Put a record in the bucket matching its reason.
    pub fn push(&mut self, record: GroupedRecord) {
        if record.reason.is_available() {
            self.available.push(record);
        } else {
            self.unavailable.push(record);
        }
    }
}

/// Grouped input document that may still carry domains awaiting a check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtendedGroupedData {
    #[serde(default, deserialize_with = "available_bucket")]
    pub available: Vec<GroupedRecord>,
    #[serde(default, deserialize_with = "unavailable_bucket")]
    pub unavailable: Vec<GroupedRecord>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub unverified: Vec<DomainRecord>,
}

impl ExtendedGroupedData {
    /// Split into the grouped buckets and the pending domain list.
    pub fn into_parts(self) -> (GroupedData, Vec<DomainRecord>) {
        (
            GroupedData {
                available: self.available,
                unavailable: self.unavailable,
            },
            self.unverified,
        )
    }
}

/// How a batch spreads its lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Concurrency {
    /// One domain at a time with the configured delay in between
    #[default]
    Sequential,

    /// A fixed pool of at most this many workers
    Bounded(usize),

    /// One worker per domain
    Unbounded,
}

impl Concurrency {
    /// Map a numeric flag: 0 is sequential, positive is a pool size and any
    /// negative value is the unbounded sentinel.
    pub fn from_flag(value: i64) -> Self {
        match value {
            0 => Concurrency::Sequential,
            n if n > 0 => Concurrency::Bounded(n as usize),
            _ => Concurrency::Unbounded,
        }
    }

    /// Number of workers to start for `jobs` domains.
    pub fn worker_count(&self, jobs: usize) -> usize {
        match self {
            Concurrency::Sequential => jobs.min(1),
            Concurrency::Bounded(n) => (*n).max(1).min(jobs),
            Concurrency::Unbounded => jobs,
        }
    }
}

impl FromStr for Concurrency {
    type Err = TaliaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("all") {
            return Ok(Concurrency::Unbounded);
        }
        s.parse::<i64>().map(Concurrency::from_flag).map_err(|_| {
            TaliaError::invalid_input(format!(
                "invalid concurrency '{}': use 0, a positive number or 'unbounded'",
                s
            ))
        })
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concurrency::Sequential => write!(f, "sequential"),
            Concurrency::Bounded(n) => write!(f, "{}", n),
            Concurrency::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Configuration for a batch of WHOIS checks.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// WHOIS endpoint as `host:port`
    pub server: String,

    /// Worker layout for the batch
    /// Default: sequential
    pub concurrency: Concurrency,

    /// Pause after each lookup in sequential mode
    /// Default: 2 seconds
    pub delay: Duration,

    /// Connect timeout for each lookup
    /// Default: 10 seconds
    pub dial_timeout: Duration,

    /// Keep the raw response for successful checks too
    /// Default: false (only errors keep their log)
    pub verbose: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            concurrency: Concurrency::Sequential,
            delay: Duration::from_secs(2),
            dial_timeout: Duration::from_secs(10),
            verbose: false,
        }
    }
}

impl CheckConfig {
    pub fn new<S: Into<String>>(server: S) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

fn log_is_empty(log: &Option<String>) -> bool {
    log.as_deref().map_or(true, str::is_empty)
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

const REASON_CODES: &[&str] = &["NO_MATCH", "TAKEN", "ERROR"];

/// Older stores write `"reason": ""` for entries that were never checked.
fn blank_reason_as_none<'de, D>(deserializer: D) -> Result<Option<Availability>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("NO_MATCH") => Ok(Some(Availability::NoMatch)),
        Some("TAKEN") => Ok(Some(Availability::Taken)),
        Some("ERROR") => Ok(Some(Availability::Error)),
        Some(other) => Err(de::Error::unknown_variant(other, REASON_CODES)),
    }
}

/// A grouped entry as found on disk, before its bucket fills in a missing reason.
#[derive(Deserialize)]
struct StoredRecord {
    domain: String,
    #[serde(default, deserialize_with = "blank_reason_as_none")]
    reason: Option<Availability>,
    #[serde(default)]
    log: Option<String>,
}

fn bucket<'de, D>(deserializer: D, implied: Availability) -> Result<Vec<GroupedRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(null_as_empty::<D, StoredRecord>(deserializer)?
        .into_iter()
        .map(|r| GroupedRecord {
            domain: r.domain,
            reason: r.reason.unwrap_or(implied),
            log: r.log,
        })
        .collect())
}

fn available_bucket<'de, D>(deserializer: D) -> Result<Vec<GroupedRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    bucket(deserializer, Availability::NoMatch)
}

fn unavailable_bucket<'de, D>(deserializer: D) -> Result<Vec<GroupedRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    bucket(deserializer, Availability::Taken)
}
