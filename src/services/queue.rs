use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Instant};
use uuid::Uuid;

use crate::models::job::RenderParams;

/// Job payload handed from ingress to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub params: RenderParams,
}

/// Bounded in-process FIFO of pending conversion jobs.
///
/// `try_enqueue` never blocks; producers that want backpressure use
/// [`JobQueue::enqueue_within`], which retries on a fixed interval until a
/// deadline expires. Consumers park in [`JobQueue::dequeue_timeout`] and are
/// woken by the next push instead of busy-polling.
pub struct JobQueue {
    items: Mutex<VecDeque<QueuedJob>>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

/// Interval between enqueue retries while the queue is full.
const ENQUEUE_RETRY_INTERVAL: Duration = Duration::from_secs(1);

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs currently resident in the queue.
    pub async fn depth(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Push a job, failing immediately if the queue is at capacity.
    pub async fn try_enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        self.try_push(job).await.map_err(|_| QueueError::Full)
    }

    /// Push a job, waiting for queue room up to `max_wait`.
    ///
    /// Retries on a fixed interval (or earlier, when a consumer frees a
    /// slot). Jobs waiting here hold no queue position: arrival order among
    /// resident jobs is decided by the push that finally lands.
    pub async fn enqueue_within(
        &self,
        job: QueuedJob,
        max_wait: Duration,
    ) -> Result<(), QueueError> {
        let started = Instant::now();
        let deadline = started + max_wait;
        let mut job = job;
        loop {
            match self.try_push(job).await {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    job = returned;
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(QueueError::Saturated {
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    let wait = ENQUEUE_RETRY_INTERVAL.min(deadline - now);
                    let _ = timeout(wait, self.not_full.notified()).await;
                }
            }
        }
    }

    /// Pop the oldest job, waiting up to `wait` for one to arrive.
    ///
    /// Pops are exclusive: a job is delivered to exactly one caller.
    pub async fn dequeue_timeout(&self, wait: Duration) -> Option<QueuedJob> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(job) = items.pop_front() {
                    drop(items);
                    self.not_full.notify_one();
                    return Some(job);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let _ = timeout(deadline - now, self.not_empty.notified()).await;
        }
    }

    /// Push that hands the job back when the queue is full.
    async fn try_push(&self, job: QueuedJob) -> Result<(), QueuedJob> {
        let mut items = self.items.lock().await;
        if items.len() >= self.capacity {
            return Err(job);
        }
        items.push_back(job);
        drop(items);
        self.not_empty.notify_one();
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is at capacity")]
    Full,

    #[error("job queue stayed full for {waited_ms} ms")]
    Saturated { waited_ms: u64 },
}
