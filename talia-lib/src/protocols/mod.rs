//! Protocol implementations for domain checking.
//!
//! This module contains the WHOIS lookup seam used by the batch checker:
//! a network client speaking RFC 3912 and a canned double for tests.

/// WHOIS protocol implementation
pub mod whois;

/// Canned lookup double
pub mod canned;

// Re-export commonly used functions and types
pub use canned::CannedLookup;
pub use whois::{check_domain, classify, LookupFuture, WhoisClient, WhoisLookup, NO_MATCH_MARKER};
