use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::time::{Clock, SystemClock};

/// Job queue configuration.
#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Wall-clock time jobs may use per `drain()`.
    ///
    /// Kept below a 60 Hz frame interval so rendering keeps its headroom.
    /// The budget is checked between jobs: the job that crosses it still
    /// runs to completion.
    pub frame_budget: Duration,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self { frame_budget: Duration::from_millis(15) }
    }
}

/// Outcome of one `drain()` call.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Jobs whose callback returned `Ok`.
    pub executed: usize,
    /// Jobs discarded because their expiry had passed.
    pub expired: usize,
    /// Jobs discarded because their receiver no longer exists.
    pub orphaned: usize,
    /// Errors returned by failing callbacks, in execution order.
    pub failures: Vec<anyhow::Error>,
    /// Jobs still queued after this call.
    pub remaining: usize,
    pub elapsed: Duration,
}

impl DrainReport {
    /// Jobs whose callback actually ran (successfully or not).
    #[inline]
    pub fn ran(&self) -> usize {
        self.executed + self.failures.len()
    }
}

enum JobRun {
    Ran(Result<()>),
    ReceiverGone,
}

struct Job {
    run: Box<dyn FnOnce() -> JobRun>,
    expires_at: Option<Instant>,
}

/// FIFO queue of deferred callbacks drained under a per-frame time budget.
///
/// Jobs are never retried; a producer that needs a result after a failure
/// or expiry enqueues again. There are no priorities.
pub struct JobQueue<C: Clock = SystemClock> {
    jobs: VecDeque<Job>,
    clock: C,
    config: JobQueueConfig,
}

impl JobQueue<SystemClock> {
    pub fn new(config: JobQueueConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for JobQueue<SystemClock> {
    fn default() -> Self {
        Self::new(JobQueueConfig::default())
    }
}

impl<C: Clock> JobQueue<C> {
    pub fn with_clock(config: JobQueueConfig, clock: C) -> Self {
        Self { jobs: VecDeque::new(), clock, config }
    }

    #[inline]
    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drops every queued job without running it.
    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    /// Queues `callback` to run against `receiver`.
    ///
    /// The receiver is held weakly: if it has been dropped by the time the
    /// job is dequeued, the job is discarded. A receiver that is already
    /// mutably borrowed at that point makes the job fail.
    ///
    /// With `timeout`, the job is discarded if it is still queued after
    /// `now + timeout`.
    pub fn enqueue<R, F>(&mut self, receiver: &Rc<RefCell<R>>, callback: F, timeout: Option<Duration>)
    where
        R: 'static,
        F: FnOnce(&mut R) -> Result<()> + 'static,
    {
        let receiver = Rc::downgrade(receiver);
        let run = move || {
            let Some(receiver) = receiver.upgrade() else {
                return JobRun::ReceiverGone;
            };
            let result = match receiver.try_borrow_mut() {
                Ok(mut r) => callback(&mut r),
                Err(_) => Err(anyhow!("job receiver is already borrowed")),
            };
            JobRun::Ran(result)
        };
        self.push(Box::new(run), timeout);
    }

    /// Queues a callback that captures everything it needs.
    pub fn enqueue_fn<F>(&mut self, callback: F, timeout: Option<Duration>)
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.push(Box::new(move || JobRun::Ran(callback())), timeout);
    }

    fn push(&mut self, run: Box<dyn FnOnce() -> JobRun>, timeout: Option<Duration>) {
        let expires_at = timeout.map(|t| self.clock.now() + t);
        self.jobs.push_back(Job { run, expires_at });
    }

    /// Runs queued jobs in submission order until the queue is empty or the
    /// time spent exceeds the frame budget.
    ///
    /// Expired and orphaned jobs are discarded without a budget check. A
    /// failing job is logged and reported; draining continues.
    pub fn drain(&mut self) -> DrainReport {
        let start = self.clock.now();
        let mut report = DrainReport::default();

        while let Some(job) = self.jobs.pop_front() {
            if job.expires_at.is_some_and(|t| t < self.clock.now()) {
                report.expired += 1;
                continue;
            }

            match (job.run)() {
                JobRun::ReceiverGone => {
                    report.orphaned += 1;
                    continue;
                }
                JobRun::Ran(Ok(())) => report.executed += 1,
                JobRun::Ran(Err(err)) => {
                    log::warn!("job failed: {err:#}");
                    report.failures.push(err);
                }
            }

            if self.clock.now().saturating_duration_since(start) > self.config.frame_budget {
                break;
            }
        }

        report.elapsed = self.clock.now().saturating_duration_since(start);
        report.remaining = self.jobs.len();

        if report.remaining > 0 {
            log::trace!(
                "job budget spent after {} jobs ({:?}); {} deferred",
                report.ran(),
                report.elapsed,
                report.remaining
            );
        }

        report
    }
}
