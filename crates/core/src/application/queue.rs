// Work Queue - unbounded FIFO with acknowledgment and drain tracking
//
// Invariant: acknowledged <= dispatched <= enqueued, and
// pending = enqueued - acknowledged never goes negative.

use crate::domain::Job;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// Queue errors (all of them indicate a bug in the caller)
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("acknowledge without a dispatched job (dispatched {dispatched}, acknowledged {acknowledged})")]
    AcknowledgeWithoutDispatch { dispatched: u64, acknowledged: u64 },
}

/// Point-in-time counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dispatched: u64,
    pub acknowledged: u64,
}

impl QueueStats {
    /// Jobs enqueued but not yet acknowledged
    pub fn pending(&self) -> u64 {
        self.enqueued - self.acknowledged
    }

    pub fn is_drained(&self) -> bool {
        self.enqueued == self.acknowledged
    }
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<Job>,
    stats: QueueStats,
}

/// Shared FIFO between the supervisor (producer) and the workers (consumers).
///
/// The inner mutex is never held across an await point.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    available: Notify,
    drained: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        // A panic while holding the lock cannot leave the counters half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a job at the tail. Never blocks.
    pub fn enqueue(&self, job: Job) {
        {
            let mut state = self.lock();
            state.items.push_back(job);
            state.stats.enqueued += 1;
        }
        self.available.notify_one();
    }

    /// Take the next job, waiting until one is available.
    ///
    /// Cancel-safe: a job is only removed in the same poll that returns it,
    /// so dropping a pending `dequeue` future never loses work.
    pub async fn dequeue(&self) -> Job {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so an enqueue in between is not missed
            notified.as_mut().enable();

            if let Some(job) = self.try_dequeue() {
                return job;
            }

            notified.await;
        }
    }

    /// Take the next job if one is queued
    pub fn try_dequeue(&self) -> Option<Job> {
        let (job, more) = {
            let mut state = self.lock();
            let job = state.items.pop_front()?;
            state.stats.dispatched += 1;
            (job, !state.items.is_empty())
        };
        if more {
            // Hand the wakeup on in case several jobs arrived under one permit
            self.available.notify_one();
        }
        Some(job)
    }

    /// Record completion of a dispatched job
    pub fn acknowledge(&self) -> Result<(), QueueError> {
        let drained = {
            let mut state = self.lock();
            let stats = &mut state.stats;
            if stats.acknowledged >= stats.dispatched {
                return Err(QueueError::AcknowledgeWithoutDispatch {
                    dispatched: stats.dispatched,
                    acknowledged: stats.acknowledged,
                });
            }
            stats.acknowledged += 1;
            stats.is_drained()
        };
        if drained {
            self.drained.notify_waiters();
        }
        Ok(())
    }

    /// Wait until every enqueued job has been acknowledged.
    ///
    /// Returns immediately for an empty queue. Jobs must all be enqueued
    /// before this is called.
    pub async fn wait_until_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.stats().is_drained() {
                return;
            }

            notified.await;
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats
    }

    /// Jobs enqueued but not yet acknowledged
    pub fn pending(&self) -> u64 {
        self.stats().pending()
    }

    /// Jobs still waiting for a worker
    pub fn queued(&self) -> usize {
        self.lock().items.len()
    }
}
