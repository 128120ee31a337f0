//! Bounded worker pool for outbound mail.
//!
//! Concurrency is capped by a semaphore of `max_concurrency` permits. What
//! happens to a job when every permit is taken is decided by the configured
//! [`AdmissionPolicy`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::DispatchError;

/// What to do with a job when all workers are busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Hold the submitter until a worker frees up.
    Block,
    /// Park the job in a bounded FIFO queue; refuse once the queue is full.
    #[default]
    Queue,
    /// Refuse the job immediately.
    Reject,
}

impl AdmissionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionPolicy::Block => "block",
            AdmissionPolicy::Queue => "queue",
            AdmissionPolicy::Reject => "reject",
        }
    }
}

/// Configuration for the mail worker pool
#[derive(Debug, Clone, Deserialize)]
pub struct MailPoolConfig {
    /// Maximum deliveries running at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Maximum jobs waiting for a worker (queue policy only)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub admission: AdmissionPolicy,
}

fn default_max_concurrency() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for MailPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            queue_capacity: default_queue_capacity(),
            admission: AdmissionPolicy::default(),
        }
    }
}

impl MailPoolConfig {
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_concurrency == 0 {
            return Err(DispatchError::InvalidConfig(
                "mail.pool.max_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(DispatchError::InvalidConfig(format!(
                "mail.pool.max_concurrency {} is too large",
                self.max_concurrency
            )));
        }
        Ok(())
    }
}

/// Why the pool refused a job
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("all {max_concurrency} workers are busy")]
    Saturated { max_concurrency: usize },

    #[error("wait queue is full ({capacity} jobs)")]
    QueueFull { capacity: usize },

    #[error("worker pool is shut down")]
    Closed,
}

impl SubmitError {
    /// Short label used in log fields and metric labels
    pub fn reason(&self) -> &'static str {
        match self {
            SubmitError::Saturated { .. } => "saturated",
            SubmitError::QueueFull { .. } => "queue_full",
            SubmitError::Closed => "closed",
        }
    }
}

/// Semaphore-gated pool of tokio tasks dedicated to outbound mail.
pub struct MailWorkerPool {
    permits: Arc<Semaphore>,
    /// Jobs admitted under the queue policy still waiting for a permit
    waiting: Arc<AtomicUsize>,
    /// Jobs admitted and not yet finished, running or queued
    outstanding: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    closed: AtomicBool,
    config: MailPoolConfig,
}

impl MailWorkerPool {
    pub fn new(config: MailPoolConfig) -> Result<Self, DispatchError> {
        config.validate()?;

        Ok(Self {
            permits: Arc::new(Semaphore::new(config.max_concurrency)),
            waiting: Arc::new(AtomicUsize::new(0)),
            outstanding: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
            config,
        })
    }

    pub fn config(&self) -> &MailPoolConfig {
        &self.config
    }

    /// Jobs currently holding a worker
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrency - self.permits.available_permits()
    }

    /// Jobs admitted but not yet running
    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Admit `job` according to the admission policy.
    ///
    /// Only the block policy ever suspends here; the others decide
    /// immediately. The job runs on a spawned task once it holds a permit.
    pub async fn submit<F>(&self, job: F) -> Result<(), SubmitError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.register()?;

        match self.config.admission {
            AdmissionPolicy::Block => {
                let permit = self
                    .permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| SubmitError::Closed)?;
                spawn_with_permit(permit, guard, job);
            }
            AdmissionPolicy::Reject => {
                let permit = self.try_permit()?;
                spawn_with_permit(permit, guard, job);
            }
            AdmissionPolicy::Queue => match self.try_permit() {
                Ok(permit) => spawn_with_permit(permit, guard, job),
                Err(SubmitError::Saturated { .. }) => self.enqueue(guard, job)?,
                Err(e) => return Err(e),
            },
        }

        Ok(())
    }

    /// Stop admitting jobs and wait for running and queued ones to finish.
    pub async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(
                in_flight = self.in_flight(),
                queued = self.queued(),
                "Draining mail worker pool"
            );
        }

        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.outstanding.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }
        self.permits.close();

        tracing::info!("Mail worker pool drained");
    }

    /// Count a job as outstanding unless the pool is already closed.
    ///
    /// The counter is bumped before the closed check so that `shutdown`
    /// either sees the job or the submitter sees the flag.
    fn register(&self) -> Result<JobGuard, SubmitError> {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let guard = JobGuard {
            outstanding: self.outstanding.clone(),
            idle: self.idle.clone(),
        };

        if self.is_closed() {
            return Err(SubmitError::Closed);
        }
        Ok(guard)
    }

    fn try_permit(&self) -> Result<OwnedSemaphorePermit, SubmitError> {
        self.permits
            .clone()
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::Closed => SubmitError::Closed,
                TryAcquireError::NoPermits => SubmitError::Saturated {
                    max_concurrency: self.config.max_concurrency,
                },
            })
    }

    fn enqueue<F>(&self, guard: JobGuard, job: F) -> Result<(), SubmitError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let capacity = self.config.queue_capacity;
        self.waiting
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| SubmitError::QueueFull { capacity })?;

        let permits = self.permits.clone();
        let waiting = self.waiting.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let permit = permits.acquire_owned().await;
            waiting.fetch_sub(1, Ordering::AcqRel);
            match permit {
                Ok(_permit) => job.await,
                Err(_) => tracing::warn!("Mail worker pool closed while job was queued"),
            }
        });

        Ok(())
    }
}

/// Marks one admitted job; dropping it (including on panic) releases it.
struct JobGuard {
    outstanding: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

fn spawn_with_permit<F>(permit: OwnedSemaphorePermit, guard: JobGuard, job: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let _guard = guard;
        let _permit = permit;
        job.await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pool(max_concurrency: usize, queue_capacity: usize, admission: AdmissionPolicy) -> MailWorkerPool {
        MailWorkerPool::new(MailPoolConfig {
            max_concurrency,
            queue_capacity,
            admission,
        })
        .unwrap()
    }

    /// Job that holds its worker until the gate gets a permit
    fn gated(gate: Arc<Semaphore>, done: Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        async move {
            let _ = gate.acquire().await;
            done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let config = MailPoolConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(MailWorkerPool::new(config).is_err());
    }

    #[tokio::test]
    async fn test_reject_policy_fails_fast_when_saturated() {
        let pool = pool(1, 10, AdmissionPolicy::Reject);
        let gate = Arc::new(Semaphore::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        pool.submit(gated(gate.clone(), done.clone())).await.unwrap();
        assert_eq!(pool.in_flight(), 1);

        let err = pool.submit(gated(gate.clone(), done.clone())).await.unwrap_err();
        assert_eq!(err, SubmitError::Saturated { max_concurrency: 1 });

        gate.add_permits(1);
        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queue_policy_bounds_waiting_jobs() {
        let pool = pool(1, 1, AdmissionPolicy::Queue);
        let gate = Arc::new(Semaphore::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        pool.submit(gated(gate.clone(), done.clone())).await.unwrap();
        pool.submit(gated(gate.clone(), done.clone())).await.unwrap();
        assert_eq!(pool.queued(), 1);

        let err = pool.submit(gated(gate.clone(), done.clone())).await.unwrap_err();
        assert_eq!(err, SubmitError::QueueFull { capacity: 1 });

        gate.add_permits(2);
        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
        assert_eq!(pool.queued(), 0);
    }

    #[tokio::test]
    async fn test_block_policy_waits_for_free_worker() {
        let pool = Arc::new(pool(1, 0, AdmissionPolicy::Block));
        let gate = Arc::new(Semaphore::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        pool.submit(gated(gate.clone(), done.clone())).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            pool.submit(gated(gate.clone(), done.clone())),
        )
        .await;
        assert!(blocked.is_err(), "submission should wait for the busy worker");

        gate.add_permits(1);
        tokio::time::timeout(
            Duration::from_secs(5),
            pool.submit(gated(gate.clone(), done.clone())),
        )
        .await
        .expect("worker should free up")
        .unwrap();

        gate.add_permits(1);
        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_jobs() {
        let pool = pool(2, 2, AdmissionPolicy::Queue);
        pool.shutdown().await;

        assert!(pool.is_closed());
        let err = pool.submit(async {}).await.unwrap_err();
        assert_eq!(err, SubmitError::Closed);
        assert_eq!(err.reason(), "closed");
    }
}
