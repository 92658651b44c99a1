//! Delivery job carried through the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::webhook::WebhookType;

/// Delivery job status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be processed.
    Pending,
    /// Reserved by a worker.
    Reserved,
    /// Successfully delivered.
    Completed,
    /// Failed after all attempts.
    Failed,
}

/// A queued webhook delivery.
///
/// Carries everything needed to perform the request by value, so a worker
/// never depends on the state of the request that fired the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryJob {
    /// Job ID.
    pub id: String,
    /// Diagnostic description shown in queue tooling.
    pub description: String,
    /// Delivery mode.
    #[serde(rename = "type")]
    pub webhook_type: WebhookType,
    /// Target URL.
    pub url: String,
    /// JSON body for `post` deliveries.
    pub data: Option<Value>,
    /// Number of attempts started.
    pub attempts: u32,
    /// Status.
    pub status: JobStatus,
    /// Earliest time the job may be reserved.
    pub next_attempt: DateTime<Utc>,
    /// Created at.
    pub created_at: DateTime<Utc>,
    /// Last error message.
    pub last_error: Option<String>,
}

impl DeliveryJob {
    /// Creates a pending job.
    pub fn new(
        description: impl Into<String>,
        webhook_type: WebhookType,
        url: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            webhook_type,
            url: url.into(),
            data,
            attempts: 0,
            status: JobStatus::Pending,
            next_attempt: now,
            created_at: now,
            last_error: None,
        }
    }

    /// Marks the job as reserved and counts the attempt.
    pub fn mark_reserved(&mut self) {
        self.attempts += 1;
        self.status = JobStatus::Reserved;
    }

    /// Returns the job to the pending state after `delay`.
    pub fn schedule_retry(&mut self, delay: std::time::Duration) {
        self.status = JobStatus::Pending;
        self.next_attempt = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
    }

    /// Marks the job as completed.
    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.last_error = None;
    }

    /// Marks the job as terminally failed.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.last_error = Some(error.into());
    }

    /// Checks if the job may be reserved now.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.next_attempt <= now
    }
}
