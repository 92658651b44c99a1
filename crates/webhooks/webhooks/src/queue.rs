//! Delivery job queue abstraction.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::job::{DeliveryJob, JobStatus};

/// Error type for queue operations.
#[derive(Debug, Clone)]
pub struct QueueError(pub String);

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Queue error: {}", self.0)
    }
}

impl std::error::Error for QueueError {}

/// Trait for delivery job queues.
///
/// `push` is the producer side used while an event is being handled and must
/// be a bounded, local write. The remaining methods are the consumer side
/// used by workers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Adds a job to the queue.
    async fn push(&self, job: DeliveryJob) -> Result<(), QueueError>;

    /// Reserves the next job ready for delivery and counts the attempt.
    async fn reserve(&self) -> Result<Option<DeliveryJob>, QueueError>;

    /// Returns a reserved job to the queue to be retried after `delay`.
    async fn release(&self, job: DeliveryJob, delay: Duration) -> Result<(), QueueError>;

    /// Marks a reserved job as completed.
    async fn complete(&self, job: DeliveryJob) -> Result<(), QueueError>;

    /// Moves a reserved job to the terminal failed set.
    async fn fail(&self, job: DeliveryJob) -> Result<(), QueueError>;

    /// Re-queues a failed job with a fresh attempt count.
    async fn retry_failed(&self, job_id: &str) -> Result<bool, QueueError>;

    /// Gets a job by ID from any state.
    async fn get_job(&self, job_id: &str) -> Result<Option<DeliveryJob>, QueueError>;

    /// Gets all pending jobs in queue order.
    async fn pending(&self) -> Result<Vec<DeliveryJob>, QueueError>;

    /// Gets all terminally failed jobs.
    async fn failed(&self) -> Result<Vec<DeliveryJob>, QueueError>;

    /// Gets the number of pending jobs.
    async fn len(&self) -> Result<usize, QueueError>;

    /// Checks if no jobs are pending.
    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}

/// Number of completed jobs kept for inspection by default.
pub const DEFAULT_COMPLETED_LIMIT: usize = 100;

/// In-memory job queue.
///
/// Failed jobs are kept until retried. Completed jobs are kept without their
/// payload, and only the most recent `completed_limit` of them.
pub struct InMemoryQueue {
    jobs: RwLock<VecDeque<DeliveryJob>>,
    reserved: RwLock<HashMap<String, DeliveryJob>>,
    completed: RwLock<VecDeque<DeliveryJob>>,
    failed: RwLock<Vec<DeliveryJob>>,
    capacity: Option<usize>,
    completed_limit: usize,
}

impl InMemoryQueue {
    /// Creates an unbounded queue.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(VecDeque::new()),
            reserved: RwLock::new(HashMap::new()),
            completed: RwLock::new(VecDeque::new()),
            failed: RwLock::new(Vec::new()),
            capacity: None,
            completed_limit: DEFAULT_COMPLETED_LIMIT,
        }
    }

    /// Creates a queue that rejects pushes beyond `capacity` pending jobs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Sets how many completed jobs are kept.
    pub fn with_completed_limit(mut self, limit: usize) -> Self {
        self.completed_limit = limit;
        self
    }

    /// Gets the most recent completed jobs, oldest first.
    pub async fn completed(&self) -> Vec<DeliveryJob> {
        self.completed.read().await.iter().cloned().collect()
    }

    async fn take_reserved(&self, job_id: &str) -> Result<(), QueueError> {
        let mut reserved = self.reserved.write().await;
        reserved
            .remove(job_id)
            .map(|_| ())
            .ok_or_else(|| QueueError(format!("job {} is not reserved", job_id)))
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn push(&self, job: DeliveryJob) -> Result<(), QueueError> {
        let mut jobs = self.jobs.write().await;
        if let Some(capacity) = self.capacity {
            if jobs.len() >= capacity {
                return Err(QueueError(format!("queue is full ({} jobs)", capacity)));
            }
        }
        jobs.push_back(job);
        Ok(())
    }

    async fn reserve(&self) -> Result<Option<DeliveryJob>, QueueError> {
        let mut jobs = self.jobs.write().await;
        let now = chrono::Utc::now();

        let Some(idx) = jobs.iter().position(|j| j.is_ready(now)) else {
            return Ok(None);
        };
        let Some(mut job) = jobs.remove(idx) else {
            return Ok(None);
        };
        drop(jobs);

        job.mark_reserved();
        self.reserved
            .write()
            .await
            .insert(job.id.clone(), job.clone());
        Ok(Some(job))
    }

    async fn release(&self, mut job: DeliveryJob, delay: Duration) -> Result<(), QueueError> {
        self.take_reserved(&job.id).await?;
        job.schedule_retry(delay);
        self.jobs.write().await.push_back(job);
        Ok(())
    }

    async fn complete(&self, mut job: DeliveryJob) -> Result<(), QueueError> {
        self.take_reserved(&job.id).await?;
        job.mark_completed();
        job.data = None;

        let mut completed = self.completed.write().await;
        completed.push_back(job);
        while completed.len() > self.completed_limit {
            completed.pop_front();
        }
        Ok(())
    }

    async fn fail(&self, mut job: DeliveryJob) -> Result<(), QueueError> {
        self.take_reserved(&job.id).await?;
        if job.status != JobStatus::Failed {
            let error = job.last_error.clone().unwrap_or_else(|| "Unknown error".to_string());
            job.mark_failed(error);
        }
        self.failed.write().await.push(job);
        Ok(())
    }

    async fn retry_failed(&self, job_id: &str) -> Result<bool, QueueError> {
        let mut failed = self.failed.write().await;
        let Some(idx) = failed.iter().position(|j| j.id == job_id) else {
            return Ok(false);
        };
        let mut job = failed.remove(idx);
        drop(failed);

        job.attempts = 0;
        job.schedule_retry(Duration::ZERO);
        self.jobs.write().await.push_back(job);
        Ok(true)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<DeliveryJob>, QueueError> {
        if let Some(job) = self.jobs.read().await.iter().find(|j| j.id == job_id) {
            return Ok(Some(job.clone()));
        }
        if let Some(job) = self.reserved.read().await.get(job_id) {
            return Ok(Some(job.clone()));
        }
        if let Some(job) = self.completed.read().await.iter().find(|j| j.id == job_id) {
            return Ok(Some(job.clone()));
        }
        Ok(self
            .failed
            .read()
            .await
            .iter()
            .find(|j| j.id == job_id)
            .cloned())
    }

    async fn pending(&self) -> Result<Vec<DeliveryJob>, QueueError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().cloned().collect())
    }

    async fn failed(&self) -> Result<Vec<DeliveryJob>, QueueError> {
        Ok(self.failed.read().await.clone())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::WebhookType;

    fn job() -> DeliveryJob {
        DeliveryJob::new("Sending webhook “Test”", WebhookType::Get, "https://example.com", None)
    }

    #[tokio::test]
    async fn test_in_memory_queue() {
        let queue = InMemoryQueue::new();
        let job = job();

        queue.push(job.clone()).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);

        let reserved = queue.reserve().await.unwrap().unwrap();
        assert_eq!(reserved.id, job.id);
        assert_eq!(reserved.attempts, 1);
        assert_eq!(reserved.status, JobStatus::Reserved);
        assert!(queue.is_empty().await.unwrap());

        queue.complete(reserved).await.unwrap();
        assert_eq!(queue.completed().await.len(), 1);
        let stored = queue.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_queue_respects_next_attempt() {
        let queue = InMemoryQueue::new();
        let mut job = job();
        job.next_attempt = chrono::Utc::now() + chrono::Duration::hours(1);

        queue.push(job).await.unwrap();
        assert!(queue.reserve().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_release_reschedules() {
        let queue = InMemoryQueue::new();
        queue.push(job()).await.unwrap();

        let reserved = queue.reserve().await.unwrap().unwrap();
        queue.release(reserved, Duration::from_secs(3600)).await.unwrap();

        assert_eq!(queue.len().await.unwrap(), 1);
        assert!(queue.reserve().await.unwrap().is_none());

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_failed_jobs_are_kept_and_retryable() {
        let queue = InMemoryQueue::new();
        queue.push(job()).await.unwrap();

        let mut reserved = queue.reserve().await.unwrap().unwrap();
        reserved.last_error = Some("HTTP 500".to_string());
        let id = reserved.id.clone();
        queue.fail(reserved).await.unwrap();

        let failed = queue.failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, JobStatus::Failed);
        assert_eq!(failed[0].last_error.as_deref(), Some("HTTP 500"));

        assert!(queue.retry_failed(&id).await.unwrap());
        assert!(!queue.retry_failed(&id).await.unwrap());
        let again = queue.reserve().await.unwrap().unwrap();
        assert_eq!(again.attempts, 1);
    }

    #[tokio::test]
    async fn test_completing_unreserved_job_fails() {
        let queue = InMemoryQueue::new();
        assert!(queue.complete(job()).await.is_err());
    }

    #[tokio::test]
    async fn test_completed_history_is_bounded_and_drops_payloads() {
        let queue = InMemoryQueue::new().with_completed_limit(2);
        let mut ids = Vec::new();

        for _ in 0..5 {
            let job = DeliveryJob::new(
                "Sending webhook “Orders”",
                WebhookType::Post,
                "https://example.com",
                Some(serde_json::json!({"blob": "x".repeat(1024)})),
            );
            ids.push(job.id.clone());
            queue.push(job).await.unwrap();
            let reserved = queue.reserve().await.unwrap().unwrap();
            queue.complete(reserved).await.unwrap();
        }

        let completed = queue.completed().await;
        assert_eq!(completed.len(), 2);
        assert!(completed.iter().all(|j| j.data.is_none()));
        assert_eq!(completed[1].id, ids[4]);
        assert!(queue.get_job(&ids[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_rejects_push() {
        let queue = InMemoryQueue::with_capacity(1);
        queue.push(job()).await.unwrap();
        assert!(queue.push(job()).await.is_err());
        assert_eq!(queue.len().await.unwrap(), 1);
    }
}
