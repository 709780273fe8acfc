// ========================================================================================
//
//                              THE BATCH COORDINATOR
//
// ========================================================================================
//
// Fans one batch of work items out over the shared worker pool and blocks the
// calling thread until every item has reported back.
//
// ### Per-batch lifecycle ###
//
// 1.  A fresh completion counter (sized to the batch) and a fresh report sink are
//     created for this call only. Nothing batch-specific lives on the coordinator.
//
// 2.  One task per item is submitted. Each task owns a countdown guard, performs
//     the item's work, records the outcome, and only then releases the guard.
//     The guard also fires if the work panics or the task is dropped unrun, so a
//     failing item can never leave the counter short.
//
// 3.  The caller waits on the counter. The wait ends in exactly one of three
//     ways: released (report returned), interrupted, or timed out. The latter
//     two return an error and abandon the sink to the still-running tasks.

use crate::config::BrigadeConfig;
use crate::error::BatchError;
use crate::interrupt::Interrupter;
use crate::latch::{CompletionCounter, WaitOutcome};
use crate::report::{BatchReport, ItemOutcome, ReportSink};
use crate::work::{FixedDelayWork, WorkFn, WorkItem};
use crate::worker_pool::{WorkerPool, panic_message};
use log::{debug, trace, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

/// How long, and under which interrupt, `process_with` may wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitPolicy<'a> {
    pub timeout: Option<Duration>,
    pub interrupter: Option<&'a Interrupter>,
}

impl<'a> WaitPolicy<'a> {
    pub fn forever() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interruptible_by(mut self, interrupter: &'a Interrupter) -> Self {
        self.interrupter = Some(interrupter);
        self
    }
}

/// Turns batches of work items into completed reports using a shared pool.
///
/// Cheap to clone and safe to call from any number of threads at once; each
/// call operates on its own counter and report and shares only the pool.
pub struct BatchCoordinator<W: WorkFn = FixedDelayWork> {
    pool: Arc<WorkerPool>,
    work: Arc<W>,
    default_timeout: Option<Duration>,
}

impl<W: WorkFn> Clone for BatchCoordinator<W> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            work: Arc::clone(&self.work),
            default_timeout: self.default_timeout,
        }
    }
}

impl BatchCoordinator<FixedDelayWork> {
    /// The placeholder-work coordinator described by `config`.
    pub fn from_config(pool: Arc<WorkerPool>, config: &BrigadeConfig) -> Self {
        Self::new(pool, FixedDelayWork::new(config.work.delay()))
            .with_default_timeout(config.coordinator.wait_timeout())
    }
}

impl<W: WorkFn> BatchCoordinator<W> {
    pub fn new(pool: Arc<WorkerPool>, work: W) -> Self {
        Self {
            pool,
            work: Arc::new(work),
            default_timeout: None,
        }
    }

    /// Timeout applied by [`BatchCoordinator::process`]. `None` waits forever.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Processes `items` and blocks until all of them are done, subject only to
    /// the coordinator's default timeout.
    pub fn process<I>(&self, items: I) -> Result<BatchReport, BatchError>
    where
        I: IntoIterator,
        I::Item: Into<WorkItem>,
    {
        let policy = WaitPolicy {
            timeout: self.default_timeout,
            interrupter: None,
        };
        self.process_with(items, policy)
    }

    pub fn process_with_timeout<I>(
        &self,
        items: I,
        timeout: Duration,
    ) -> Result<BatchReport, BatchError>
    where
        I: IntoIterator,
        I::Item: Into<WorkItem>,
    {
        self.process_with(items, WaitPolicy::forever().timeout(timeout))
    }

    /// Processes `items`, failing with [`BatchError::Interrupted`] if
    /// `interrupter` fires before the batch completes. The default timeout
    /// still applies.
    pub fn process_interruptible<I>(
        &self,
        items: I,
        interrupter: &Interrupter,
    ) -> Result<BatchReport, BatchError>
    where
        I: IntoIterator,
        I::Item: Into<WorkItem>,
    {
        let policy = WaitPolicy {
            timeout: self.default_timeout,
            interrupter: Some(interrupter),
        };
        self.process_with(items, policy)
    }

    pub fn process_with<I>(&self, items: I, policy: WaitPolicy<'_>) -> Result<BatchReport, BatchError>
    where
        I: IntoIterator,
        I::Item: Into<WorkItem>,
    {
        let items: Vec<WorkItem> = items.into_iter().map(Into::into).collect();
        let batch = NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed);
        if items.is_empty() {
            trace!("Batch {batch} is empty, nothing to submit.");
            return Ok(BatchReport::empty(batch));
        }

        let total = items.len();
        let counter = Arc::new(CompletionCounter::new(total));
        let sink = Arc::new(ReportSink::with_capacity(total));

        for item in items {
            let guard = counter.guard();
            let sink = Arc::clone(&sink);
            let work = Arc::clone(&self.work);
            self.pool.submit(move || {
                let outcome = perform_item(work.as_ref(), &item);
                sink.record(item, outcome);
                // Release the sink before the countdown so the caller can usually
                // take the report without copying it.
                drop(sink);
                drop(guard);
            });
        }
        debug!(
            "Batch {batch} with {total} items submitted ({} queued in pool), waiting until everything is processed.",
            self.pool.queued()
        );

        match counter.wait(policy.timeout, policy.interrupter) {
            WaitOutcome::Released => {
                let report = ReportSink::finish(sink, batch);
                debug!(
                    "Batch {batch} complete: {} finished, {} failed.",
                    report.finished_count(),
                    report.len() - report.finished_count()
                );
                Ok(report)
            }
            WaitOutcome::Interrupted => {
                let remaining = counter.remaining();
                warn!("Batch {batch} interrupted with {remaining} of {total} items outstanding.");
                Err(BatchError::Interrupted {
                    batch,
                    remaining,
                    total: counter.total(),
                })
            }
            WaitOutcome::TimedOut => {
                let remaining = counter.remaining();
                let timeout = policy.timeout.unwrap_or_default();
                warn!("Batch {batch} timed out after {timeout:?} with {remaining} of {total} items outstanding.");
                Err(BatchError::Timeout {
                    batch,
                    timeout,
                    remaining,
                    total: counter.total(),
                })
            }
        }
    }
}

/// Runs the work function for one item, folding errors and panics into the
/// item's outcome.
fn perform_item<W: WorkFn>(work: &W, item: &WorkItem) -> ItemOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| work.perform(item))) {
        Ok(Ok(result)) => {
            trace!("{item} finished");
            ItemOutcome::Finished(result)
        }
        Ok(Err(e)) => {
            warn!("Work item {item} failed: {e}");
            ItemOutcome::failed(item, e)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("Work item {item} panicked: {message}");
            ItemOutcome::failed(item, format!("panicked: {message}"))
        }
    }
}
