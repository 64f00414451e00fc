//! Concurrent processing utilities for domain checking.
//!
//! A fixed set of tokio tasks pulls `(index, domain)` jobs from a shared
//! queue. Each task hands back the results it produced tagged with their input
//! index, and the caller slots them into a pre-sized vector after every task
//! has joined. Completion order therefore never affects result order.

use crate::progress::BatchProgress;
use crate::protocols::{check_domain, WhoisLookup};
use crate::types::{Availability, CheckResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, warn};

type Job = (usize, String);

/// Pool of lookup workers for one batch.
pub(crate) struct WorkerPool {
    workers: usize,
    client: Arc<dyn WhoisLookup>,
    progress: Arc<BatchProgress>,
}

impl WorkerPool {
    pub(crate) fn new(
        workers: usize,
        client: Arc<dyn WhoisLookup>,
        progress: Arc<BatchProgress>,
    ) -> Self {
        Self {
            workers,
            client,
            progress,
        }
    }

    /// Check every domain once and return results in input order.
    pub(crate) async fn run(self, domains: &[String]) -> Vec<CheckResult> {
        let queue: Arc<Mutex<VecDeque<Job>>> = Arc::new(Mutex::new(
            domains.iter().cloned().enumerate().collect(),
        ));

        let mut tasks = JoinSet::new();
        for worker_id in 0..self.workers {
            let queue = Arc::clone(&queue);
            let client = Arc::clone(&self.client);
            let progress = Arc::clone(&self.progress);

            tasks.spawn(async move {
                let mut finished = Vec::new();
                while let Some((index, domain)) = next_job(&queue) {
                    let result = check_domain(client.as_ref(), &domain).await;
                    progress.record(&result);
                    finished.push((index, result));
                }
                debug!(worker_id, jobs = finished.len(), "worker drained queue");
                finished
            });
        }

        let mut slots: Vec<Option<CheckResult>> = vec![None; domains.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(finished) => {
                    for (index, result) in finished {
                        slots[index] = Some(result);
                    }
                }
                Err(e) => warn!(error = %e, "worker task ended abnormally"),
            }
        }

        slots
            .into_iter()
            .zip(domains)
            .map(|(slot, domain)| slot.unwrap_or_else(|| lost_result(domain)))
            .collect()
    }
}

fn next_job(queue: &Mutex<VecDeque<Job>>) -> Option<Job> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

/// Placeholder for a domain whose worker died before reporting it.
fn lost_result(domain: &str) -> CheckResult {
    CheckResult {
        domain: domain.to_string(),
        availability: Availability::Error,
        raw_log: "Error: worker stopped before reporting this domain".to_string(),
    }
}
