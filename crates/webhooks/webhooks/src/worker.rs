//! Background workers draining the delivery queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::{DeliveryClient, DeliveryReceipt};
use crate::config::WorkerConfig;
use crate::error::{WebhookError, WebhookResult};
use crate::queue::JobQueue;
use crate::retry::RetryPolicy;

/// What happened to a reserved job.
#[derive(Debug)]
pub enum JobOutcome {
    /// Delivered.
    Completed(DeliveryReceipt),
    /// Failed and released for another attempt.
    Retrying {
        /// Wait before the next attempt.
        delay: Duration,
        /// The failure.
        error: WebhookError,
    },
    /// Failed with no attempts left.
    Failed {
        /// The failure.
        error: WebhookError,
    },
}

/// Reserves jobs from the queue and performs them.
pub struct DeliveryWorker<R: RetryPolicy> {
    queue: Arc<dyn JobQueue>,
    client: DeliveryClient,
    retry: R,
    config: WorkerConfig,
}

impl<R: RetryPolicy + 'static> DeliveryWorker<R> {
    /// Creates a worker.
    pub fn new(queue: Arc<dyn JobQueue>, client: DeliveryClient, retry: R, config: WorkerConfig) -> Self {
        Self {
            queue,
            client,
            retry,
            config,
        }
    }

    /// Gets the queue.
    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Processes the next ready job, if any.
    pub async fn process_next(&self) -> WebhookResult<Option<JobOutcome>> {
        let Some(mut job) = self.queue.reserve().await? else {
            return Ok(None);
        };

        tracing::debug!(job_id = %job.id, attempt = job.attempts, "{}", job.description);

        match job.execute(&self.client).await {
            Ok(receipt) => {
                tracing::info!(
                    job_id = %job.id,
                    url = %job.url,
                    status = receipt.status,
                    duration_ms = receipt.duration_ms,
                    "Webhook delivered"
                );
                self.queue.complete(job).await?;
                Ok(Some(JobOutcome::Completed(receipt)))
            }
            Err(error) => {
                job.last_error = Some(error.to_string());

                match self.retry.next_delay(&job.id, job.attempts) {
                    Some(delay) => {
                        tracing::warn!(
                            job_id = %job.id,
                            url = %job.url,
                            attempt = job.attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Webhook delivery failed, retrying"
                        );
                        self.queue.release(job, delay).await?;
                        Ok(Some(JobOutcome::Retrying { delay, error }))
                    }
                    None => {
                        tracing::error!(
                            job_id = %job.id,
                            url = %job.url,
                            attempts = job.attempts,
                            error = %error,
                            "Webhook delivery failed permanently"
                        );
                        self.queue.fail(job).await?;
                        Ok(Some(JobOutcome::Failed { error }))
                    }
                }
            }
        }
    }

    /// Spawns `count` workers that run until `shutdown` turns true.
    ///
    /// Shutdown is observed between jobs; a delivery in flight is finished.
    pub fn spawn(self: Arc<Self>, count: usize, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|index| {
                let worker = Arc::clone(&self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { worker.run(index, shutdown).await })
            })
            .collect()
    }

    async fn run(&self, index: usize, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!(worker = index, "Delivery worker started");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => tracing::error!(worker = index, error = %e, "Queue error"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(worker = index, "Delivery worker stopped");
    }
}
