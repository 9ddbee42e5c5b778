//! Job Runner: fans targets out over a bounded pool of workers
//!
//! Each worker task owns one [`PageFetcher`] (and through it one browser
//! session) for its lifetime and pops targets from a shared queue. Every
//! submitted target ends with exactly one [`ScrapeResult`]:
//!
//! - fetch and extract succeed: `Success`, possibly with missing fields
//! - the fetcher or extractor fails: `Failure` with the classified kind
//! - the target overruns its timeout: `NavigationTimeout`
//! - the pipeline panics: `SessionCrash`
//! - cancellation before start, or after the grace period: `Cancelled`
//!
//! After a crash, timeout or forced cancellation the worker recycles its
//! session; other workers are unaffected.

mod progress;
mod report;

pub use progress::{ProgressEvent, ProgressSnapshot};
pub use report::RunReport;

use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Config;
use crate::error::{ErrorKind, ValidationError};
use crate::extractor::extract;
use crate::fetcher::{FetcherFactory, PageFetcher};
use crate::model::{Outcome, ScrapeResult, ScrapeTarget};
use crate::utils::CAPTURE_MARGIN;
use progress::ProgressTracker;

pub struct JobRunner {
    config: Arc<Config>,
    factory: Arc<dyn FetcherFactory>,
    progress: Arc<ProgressTracker>,
}

/// State shared by the workers of one run
struct RunState {
    run_id: Uuid,
    config: Arc<Config>,
    /// Pending `(slot, target)` pairs; slot is the target's position in the run
    queue: Mutex<VecDeque<(usize, ScrapeTarget)>>,
    results: DashMap<usize, ScrapeResult>,
    cancel: CancellationToken,
    progress: Arc<ProgressTracker>,
}

impl JobRunner {
    /// Rejects invalid configuration before any fetcher exists
    pub fn new(config: Config, factory: Arc<dyn FetcherFactory>) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            factory,
            progress: Arc::new(ProgressTracker::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stream of per-target completion events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Latest counts, for pollers
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Scrape every target and return one result per target
    ///
    /// Cancelling `cancel` stops workers from taking new targets; in-flight
    /// targets get `grace_period_secs` to finish before they are abandoned.
    /// Completed results are always kept.
    pub async fn run(&self, targets: Vec<ScrapeTarget>, cancel: CancellationToken) -> RunReport {
        let started_at = Utc::now();
        let total = targets.len();
        let run_id = Uuid::new_v4();
        // Child token so the run budget never cancels the caller's token
        let cancel = cancel.child_token();

        self.progress.start(total);

        let state = Arc::new(RunState {
            run_id,
            config: self.config.clone(),
            queue: Mutex::new(targets.iter().cloned().enumerate().collect()),
            results: DashMap::with_capacity(total),
            cancel: cancel.clone(),
            progress: self.progress.clone(),
        });

        let worker_count = self.config.workers.min(total);
        info!(%run_id, targets = total, workers = worker_count, "Starting scrape run");

        let budget = self.config.run_budget_secs.map(|secs| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                        warn!(budget_secs = secs, "Run budget exhausted, cancelling");
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        });

        let workers: Vec<_> = (0..worker_count)
            .map(|worker| {
                let fetcher = self.factory.create(worker);
                tokio::spawn(worker_loop(worker, fetcher, state.clone()))
            })
            .collect();

        for (worker, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                warn!(worker, "Worker task ended abnormally: {}", e);
            }
        }

        let cancelled = cancel.is_cancelled();
        if let Some(budget) = budget {
            budget.abort();
        }

        // Targets no worker reached are cancelled, never dropped
        let results = targets
            .into_iter()
            .enumerate()
            .map(|(slot, target)| match state.results.remove(&slot) {
                Some((_, result)) => result,
                None => {
                    let result = ScrapeResult::failure(
                        target,
                        ErrorKind::Cancelled,
                        "run cancelled before target started",
                    );
                    self.progress.record(&result);
                    result
                }
            })
            .collect();

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            results,
        };
        info!(
            %run_id,
            succeeded = report.successes().count(),
            partial = report.partial().count(),
            failed = report.failures().count(),
            "Scrape run finished"
        );
        report
    }
}

async fn worker_loop(worker: usize, mut fetcher: Box<dyn PageFetcher>, state: Arc<RunState>) {
    debug!(worker, run_id = %state.run_id, "Worker started");

    loop {
        if state.cancel.is_cancelled() {
            debug!(worker, "Cancellation requested, worker stops taking targets");
            break;
        }
        let Some((slot, target)) = state.queue.lock().await.pop_front() else {
            break;
        };

        let result = scrape_one(worker, fetcher.as_mut(), &target, &state).await;

        if let Some(kind) = result.error_kind()
            && kind.requires_recycle()
        {
            fetcher.recycle().await;
        }

        match &result.outcome {
            Outcome::Success { record, missing } => info!(
                worker,
                url = %target.url,
                name = %record.name,
                items = record.item_count(),
                missing = missing.len(),
                elapsed_ms = result.elapsed_ms,
                "Target scraped"
            ),
            Outcome::Failure { kind, message } => warn!(
                worker,
                url = %target.url,
                %kind,
                elapsed_ms = result.elapsed_ms,
                "Target failed: {}",
                message
            ),
        }

        state.progress.record(&result);
        state.results.insert(slot, result);
    }

    fetcher.shutdown().await;
    debug!(worker, "Worker stopped");
}

/// Fetch then extract one target, classifying every way it can end
async fn scrape_one(
    worker: usize,
    fetcher: &mut dyn PageFetcher,
    target: &ScrapeTarget,
    state: &RunState,
) -> ScrapeResult {
    let started = Instant::now();
    let config = state.config.as_ref();
    let timeout = target.timeout(config);
    let grace = Duration::from_secs(config.grace_period_secs);

    let pipeline = async {
        let page = fetcher
            .fetch(target, config)
            .await
            .map_err(|e| (e.kind(), e.to_string()))?;
        extract(&page).map_err(|e| (e.kind(), e.to_string()))
    };
    // The fetcher enforces the deadline itself; this bound only catches a
    // fetcher that ignores it, and never exceeds timeout + grace
    let bounded = tokio::time::timeout(
        timeout + CAPTURE_MARGIN.min(grace),
        AssertUnwindSafe(pipeline).catch_unwind(),
    );

    let outcome = tokio::select! {
        biased;
        finished = bounded => match finished {
            Ok(Ok(Ok(extraction))) => Outcome::Success {
                record: extraction.record,
                missing: extraction.missing,
            },
            Ok(Ok(Err((kind, message)))) => Outcome::Failure { kind, message },
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                warn!(worker, url = %target.url, "Target pipeline panicked: {}", message);
                Outcome::Failure {
                    kind: ErrorKind::SessionCrash,
                    message: format!("worker panicked: {message}"),
                }
            }
            Err(_) => Outcome::Failure {
                kind: ErrorKind::NavigationTimeout,
                message: format!("{} did not finish within {}s", target.url, timeout.as_secs()),
            },
        },
        _ = grace_expired(&state.cancel, grace) => Outcome::Failure {
            kind: ErrorKind::Cancelled,
            message: format!("run cancelled; target unfinished after {}s grace period", grace.as_secs()),
        },
    };

    ScrapeResult {
        target: target.clone(),
        outcome,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

async fn grace_expired(cancel: &CancellationToken, grace: Duration) {
    cancel.cancelled().await;
    tokio::time::sleep(grace).await;
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
