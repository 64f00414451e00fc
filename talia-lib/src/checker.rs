//! Batch checker implementation.
//!
//! This module drives a [`WhoisLookup`] over an ordered domain list, either
//! one domain at a time with a mandatory pause between requests, or through a
//! bounded (or unbounded) worker pool.

use crate::concurrent::WorkerPool;
use crate::progress::{BatchProgress, ProgressCallback, StatsSnapshot};
use crate::protocols::{check_domain, WhoisClient, WhoisLookup};
use crate::types::{CheckConfig, CheckResult, Concurrency};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Check every domain exactly once and return results in input order.
///
/// Lookup failures never abort the batch; they come back as `ERROR` results.
/// The function returns only after every worker has finished.
///
/// # Arguments
///
/// * `domains` - Domains to check, in the order results should come back
/// * `client` - Lookup implementation shared by all workers
/// * `config` - Concurrency mode and sequential delay
/// * `progress` - Shared counters, updated once per completed domain
pub async fn check_batch(
    domains: &[String],
    client: Arc<dyn WhoisLookup>,
    config: &CheckConfig,
    progress: Arc<BatchProgress>,
) -> Vec<CheckResult> {
    if domains.is_empty() {
        return Vec::new();
    }

    info!(
        domains = domains.len(),
        concurrency = %config.concurrency,
        endpoint = client.endpoint(),
        "starting batch"
    );

    let results = match config.concurrency {
        Concurrency::Sequential => {
            run_sequential(domains, client.as_ref(), config.delay, &progress).await
        }
        parallel => {
            let workers = parallel.worker_count(domains.len());
            WorkerPool::new(workers, client, Arc::clone(&progress))
                .run(domains)
                .await
        }
    };

    info!(
        processed = progress.processed(),
        elapsed_ms = progress.stats().elapsed().as_millis() as u64,
        "batch finished"
    );
    results
}

async fn run_sequential(
    domains: &[String],
    client: &dyn WhoisLookup,
    delay: Duration,
    progress: &BatchProgress,
) -> Vec<CheckResult> {
    let mut results = Vec::with_capacity(domains.len());

    for (i, domain) in domains.iter().enumerate() {
        let result = check_domain(client, domain).await;
        progress.record(&result);
        results.push(result);

        // Rate limit towards the registry; nothing left to pace after the last one.
        if i + 1 < domains.len() && !delay.is_zero() {
            sleep(delay).await;
        }
    }

    results
}

/// Everything a caller needs after a batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Results in input order
    pub results: Vec<CheckResult>,
    /// Per-class counts
    pub stats: StatsSnapshot,
    /// Wall time of the run
    pub elapsed: Duration,
}

/// Reusable batch runner: one lookup client plus a [`CheckConfig`].
///
/// # Example
///
/// ```rust,no_run
/// use talia_lib::{BatchChecker, CheckConfig, Concurrency};
///
/// #[tokio::main]
/// async fn main() {
///     let config = CheckConfig::new("whois.verisign-grs.com:43")
///         .with_concurrency(Concurrency::Bounded(4));
///     let checker = BatchChecker::new(config);
///     let report = checker
///         .run(&["example.com".to_string(), "example.net".to_string()])
///         .await;
///     println!("{} available", report.stats.available);
/// }
/// ```
pub struct BatchChecker {
    config: CheckConfig,
    client: Arc<dyn WhoisLookup>,
    callback: Option<ProgressCallback>,
}

impl BatchChecker {
    /// Create a checker that talks to `config.server` over TCP.
    pub fn new(config: CheckConfig) -> Self {
        let client = WhoisClient::new(config.server.clone()).with_timeout(config.dial_timeout);
        Self::with_client(config, Arc::new(client))
    }

    /// Create a checker around any lookup implementation.
    pub fn with_client(config: CheckConfig, client: Arc<dyn WhoisLookup>) -> Self {
        Self {
            config,
            client,
            callback: None,
        }
    }

    /// Report each completed domain to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Run one batch.
    pub async fn run(&self, domains: &[String]) -> BatchReport {
        let progress = Arc::new(match &self.callback {
            Some(cb) => BatchProgress::with_callback(domains.len(), Arc::clone(cb)),
            None => BatchProgress::new(domains.len()),
        });

        let results = check_batch(
            domains,
            Arc::clone(&self.client),
            &self.config,
            Arc::clone(&progress),
        )
        .await;

        BatchReport {
            results,
            stats: progress.stats().snapshot(),
            elapsed: progress.stats().elapsed(),
        }
    }
}

impl std::fmt::Debug for BatchChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchChecker")
            .field("config", &self.config)
            .field("endpoint", &self.client.endpoint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaliaError;
    use crate::progress::ProgressEvent;
    use crate::protocols::CannedLookup;
    use crate::types::Availability;
    use std::sync::Mutex;
    use std::time::Instant;

    fn domains(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn mixed_client() -> CannedLookup {
        CannedLookup::new()
            .with_default_response("Domain Name: TAKEN")
            .with_response("free1.com", "No match for \"FREE1.COM\".")
            .with_response("free2.com", "No match for \"FREE2.COM\".")
            .with_error("broken.com", TaliaError::connect("canned", "refused"))
    }

    #[test]
    fn test_sequential_keeps_order_and_pauses() {
        let names = domains(&["free1.com", "broken.com", "taken.com"]);
        let config = CheckConfig::new("canned").with_delay(Duration::from_millis(30));
        let progress = Arc::new(BatchProgress::new(names.len()));

        let started = Instant::now();
        let results = tokio_test::block_on(check_batch(
            &names,
            Arc::new(mixed_client()),
            &config,
            Arc::clone(&progress),
        ));

        // Two pauses between three lookups, including after the failed one.
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].availability, Availability::NoMatch);
        assert_eq!(results[1].availability, Availability::Error);
        assert_eq!(results[1].domain, "broken.com");
        assert_eq!(results[2].availability, Availability::Taken);
        assert_eq!(progress.processed(), 3);
    }

    #[tokio::test]
    async fn test_five_domains_two_workers() {
        let names = domains(&["a.com", "b.com", "c.com", "d.com", "e.com"]);
        let client = Arc::new(
            CannedLookup::new()
                .with_default_response("Domain Name: X")
                .with_latency(Duration::from_millis(25)),
        );
        let config = CheckConfig::new("canned").with_concurrency(Concurrency::Bounded(2));
        let progress = Arc::new(BatchProgress::new(names.len()));

        let results = check_batch(&names, client.clone(), &config, Arc::clone(&progress)).await;

        assert_eq!(client.peak_in_flight(), 2);
        assert_eq!(client.calls(), 5);
        assert_eq!(progress.processed(), 5);
        let got: Vec<&str> = results.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(got, vec!["a.com", "b.com", "c.com", "d.com", "e.com"]);
    }

    #[tokio::test]
    async fn test_order_matches_input_for_every_mode() {
        let names: Vec<String> = (0..12).map(|i| format!("name{i}.com")).collect();
        let modes = [
            Concurrency::Sequential,
            Concurrency::Bounded(1),
            Concurrency::Bounded(3),
            Concurrency::Bounded(50),
            Concurrency::Unbounded,
        ];

        for mode in modes {
            let client = Arc::new(
                CannedLookup::new()
                    .with_default_response("Domain Name: X")
                    .with_response("name3.com", "No match for NAME3.COM")
                    .with_error("name7.com", TaliaError::empty_response("canned"))
                    .with_latency(Duration::from_millis(2)),
            );
            let config = CheckConfig::new("canned")
                .with_concurrency(mode)
                .with_delay(Duration::ZERO);
            let progress = Arc::new(BatchProgress::new(names.len()));

            let results = check_batch(&names, client, &config, Arc::clone(&progress)).await;

            assert_eq!(results.len(), names.len(), "mode {mode}");
            for (result, name) in results.iter().zip(&names) {
                assert_eq!(&result.domain, name, "mode {mode}");
            }
            assert_eq!(results[3].availability, Availability::NoMatch);
            assert_eq!(results[7].availability, Availability::Error);
            assert_eq!(progress.stats().snapshot().errors, 1);
        }
    }

    #[tokio::test]
    async fn test_unbounded_runs_one_worker_per_domain() {
        let names = domains(&["a.com", "b.com", "c.com", "d.com"]);
        let client = Arc::new(
            CannedLookup::new()
                .with_default_response("Domain Name: X")
                .with_latency(Duration::from_millis(40)),
        );
        let config = CheckConfig::new("canned").with_concurrency(Concurrency::Unbounded);

        check_batch(&names, client.clone(), &config, Arc::new(BatchProgress::new(4))).await;

        assert_eq!(client.peak_in_flight(), 4);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let config = CheckConfig::new("canned").with_concurrency(Concurrency::Bounded(4));
        let results = check_batch(
            &[],
            Arc::new(CannedLookup::new()),
            &config,
            Arc::new(BatchProgress::new(0)),
        )
        .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_checker_reports_stats_and_progress_lines() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let config = CheckConfig::new("canned")
            .with_concurrency(Concurrency::Bounded(2))
            .with_delay(Duration::ZERO);
        let checker = BatchChecker::with_client(config, Arc::new(mixed_client())).with_progress(
            Arc::new(move |event: &ProgressEvent<'_>| {
                sink.lock().unwrap().push((event.current, event.total));
            }),
        );

        let report = checker
            .run(&domains(&["free1.com", "free2.com", "taken.com", "broken.com"]))
            .await;

        assert_eq!(report.results.len(), 4);
        assert_eq!(report.stats.available, 2);
        assert_eq!(report.stats.taken, 1);
        assert_eq!(report.stats.errors, 1);

        let mut seen: Vec<usize> = lines.lock().unwrap().iter().map(|(c, _)| *c).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert!(lines.lock().unwrap().iter().all(|(_, total)| *total == 4));
    }
}
