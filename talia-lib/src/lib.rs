//! # Talia Library
//!
//! Bulk domain availability checking over the WHOIS protocol (RFC 3912).
//!
//! The library queries a single WHOIS server for each domain in a batch,
//! classifies the answer as available, taken or failed, and persists the
//! outcome as a grouped JSON store that is merged with earlier runs and
//! replaced atomically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use talia_lib::{grouped_from_results, merge_and_write, BatchChecker, CheckConfig, Concurrency};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CheckConfig::new("whois.verisign-grs.com:43")
//!         .with_concurrency(Concurrency::Bounded(4));
//!     let report = BatchChecker::new(config)
//!         .run(&["example.com".to_string(), "example-free.com".to_string()])
//!         .await;
//!
//!     merge_and_write("grouped.json", grouped_from_results(&report.results, false))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Ordered batches**: results always come back in input order
//! - **Sequential or pooled**: rate-limited single lookups or a worker pool
//! - **Grouped store**: sorted, de-duplicated available/unavailable buckets
//! - **Atomic writes**: readers never see a half-written file

// Re-export main public API types and functions
pub use checker::{check_batch, BatchChecker, BatchReport};
pub use config::{
    load_env_config, load_env_file, parse_duration_string, validate_server_address,
    ConfigManager, DefaultsConfig, EnvConfig, FileConfig, OutputConfig,
};
pub use error::TaliaError;
pub use progress::{BatchProgress, CheckStats, ProgressCallback, ProgressEvent, StatsSnapshot};
pub use protocols::{
    check_domain, classify, CannedLookup, LookupFuture, WhoisClient, WhoisLookup, NO_MATCH_MARKER,
};
pub use store::{
    convert_array_to_grouped, export_available, grouped_from_results, load_grouped_file,
    merge_and_write, merge_grouped, parse_input_document, write_grouped_data, write_records,
    InputDocument,
};
pub use types::{
    Availability, CheckConfig, CheckResult, Concurrency, DomainRecord, ExtendedGroupedData,
    GroupedData, GroupedRecord,
};

// Internal modules - these are not part of the public API
mod checker;
mod concurrent;
mod config;
mod error;
mod progress;
mod protocols;
mod store;
mod types;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TaliaError>;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
