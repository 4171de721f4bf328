//! Batch execution with per-item failure accounting.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::config::Parallelism;
use crate::{Error, Result};

/// One failed item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub name: String,
    pub error: String,
}

/// Outcome of a bulk pass.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items left alone because the output existed; included in `succeeded`.
    pub skipped: usize,
    /// Failures in completion order.
    pub failures: Vec<Failure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Receives progress of a bulk pass. Called from worker threads.
pub trait Progress: Sync {
    fn start(&self, _total: usize) {}

    /// An item finished; `done` counts successes and failures so far.
    fn advance(&self, done: usize, failed: usize);

    fn finish(&self, _report: &BatchReport) {}
}

/// Ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn advance(&self, _done: usize, _failed: usize) {}
}

/// Result of one item's work.
pub(crate) enum Outcome {
    Done,
    Skipped,
}

/// Run `work` over `items`, never stopping on failures.
///
/// Progress is also logged at info level every 10% of the batch.
pub(crate) fn run<T, N, W>(
    label: &str,
    items: &[T],
    parallelism: Parallelism,
    progress: &dyn Progress,
    name: N,
    work: W,
) -> Result<BatchReport>
where
    T: Sync,
    N: Fn(&T) -> String + Sync,
    W: Fn(&T) -> Result<Outcome> + Sync,
{
    let total = items.len();
    let done = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let failures = Mutex::new(Vec::new());
    let step = (total / 10).max(1);

    progress.start(total);

    let process = |item: &T| {
        match work(item) {
            Ok(Outcome::Done) => {}
            Ok(Outcome::Skipped) => {
                skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let item_name = name(item);
                log::warn!("{label}: {item_name}: {e}");
                failed.fetch_add(1, Ordering::Relaxed);
                failures.lock().push(Failure {
                    name: item_name,
                    error: e.to_string(),
                });
            }
        }

        let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
        let failed_so_far = failed.load(Ordering::Relaxed);
        progress.advance(finished, failed_so_far);
        if finished % step == 0 || finished == total {
            log::info!(
                "{label}: {finished}/{total} ({}%), {failed_so_far} failed",
                finished * 100 / total.max(1)
            );
        }
    };

    match parallelism {
        Parallelism::Sequential => items.iter().for_each(process),
        Parallelism::Unbounded => items.par_iter().for_each(process),
        Parallelism::Threads(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::Config(format!("thread pool: {e}")))?;
            pool.install(|| items.par_iter().for_each(process));
        }
    }

    let failed = failed.into_inner();
    let report = BatchReport {
        total,
        succeeded: total - failed,
        failed,
        skipped: skipped.into_inner(),
        failures: failures.into_inner(),
    };
    progress.finish(&report);
    Ok(report)
}
