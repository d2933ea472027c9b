use crate::error::Error;
use crate::run::{Invocation, RunIdentity};
use crate::sim::{self, Simulator};
use console::Style;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A simulation that did not succeed.
#[derive(Debug)]
pub struct Failure {
    pub id: RunIdentity,
    pub error: sim::Error,
}

/// Snapshot of the work seen by a pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PoolStats {
    #[must_use]
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.submitted - self.completed()
    }
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

/// Bounded-concurrency executor of simulator invocations.
///
/// [`Pool::submit`] never blocks, at most `concurrency` simulations run at the same time.
/// Nothing is awaited until [`Pool::await_all`] is called.
pub struct Pool {
    simulator: Arc<dyn Simulator>,
    concurrency: usize,
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<(), Failure>>,
    counters: Arc<Counters>,
    bar: Option<ProgressBar>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("concurrency", &self.concurrency)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Pool {
    pub fn new(simulator: Arc<dyn Simulator>, concurrency: usize) -> Result<Self, Error> {
        if concurrency < 1 {
            return Err(Error::config(format!(
                "concurrency must be at least 1 (got {concurrency})"
            )));
        }
        Ok(Self {
            simulator,
            concurrency,
            permits: Arc::new(Semaphore::new(concurrency)),
            tasks: JoinSet::new(),
            counters: Arc::new(Counters::default()),
            bar: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.bar = Some(bar);
        self
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Queue a simulation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, invocation: Invocation) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        if let Some(bar) = &self.bar {
            bar.inc_length(1);
        }

        let simulator = self.simulator.clone();
        let permits = self.permits.clone();
        let counters = self.counters.clone();
        let bar = self.bar.clone();

        self.tasks.spawn(async move {
            // the semaphore is never closed
            let _permit = permits.acquire_owned().await;
            if let Some(bar) = &bar {
                bar.set_message(invocation.id.stem());
            }
            let start = std::time::Instant::now();
            let result = simulator.simulate(&invocation).await;
            let elapsed = start.elapsed();

            match result {
                Ok(()) => {
                    counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    log::debug!("{invocation} succeeded in {elapsed:?}");
                    if let Some(bar) = &bar {
                        bar.inc(1);
                    }
                    Ok(())
                }
                Err(error) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!("{invocation} failed after {elapsed:?}: {error}");
                    if let Some(bar) = &bar {
                        bar.inc(1);
                        bar.println(format!(
                            "{:>15} {:>20} {}",
                            "simulating",
                            Style::new().red().apply_to(invocation.id.stem()),
                            Style::new().red().apply_to(format!("failed: {error}")),
                        ));
                    }
                    Err(Failure {
                        id: invocation.id,
                        error,
                    })
                }
            }
        });
    }

    /// Wait until every submitted simulation has completed.
    ///
    /// Returns the failures of the drained batch. Failed simulations are never retried.
    pub async fn await_all(&mut self) -> Result<Vec<Failure>, Error> {
        let mut failures = vec![];
        while let Some(result) = self.tasks.join_next().await {
            if let Err(failure) = result? {
                failures.push(failure);
            }
        }
        Ok(failures)
    }
}
