//! Delivery-side settings.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::redaction::{DEFAULT_KEYWORDS, DEFAULT_MASK, KeywordRedactionPolicy, RedactionPolicy};
use crate::retry::ExponentialBackoff;

/// Webhook system configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Worker pool settings.
    pub worker: WorkerConfig,
    /// HTTP delivery settings.
    pub delivery: DeliveryConfig,
    /// Retry settings.
    pub retry: RetryConfig,
    /// Redaction settings.
    pub redaction: RedactionConfig,
}

impl WebhookConfig {
    /// Creates a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker count.
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker.count = count;
        self
    }

    /// Sets the poll interval.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.worker.poll_interval_ms = ms;
        self
    }

    /// Sets the maximum delivery attempts.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.retry.max_attempts = max;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.delivery.timeout_ms = ms;
        self
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of workers.
    pub count: usize,
    /// Idle wait between polls of an empty queue.
    pub poll_interval_ms: u64,
}

impl WorkerConfig {
    /// Idle wait as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 4,
            poll_interval_ms: 1000,
        }
    }
}

/// HTTP delivery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Per-attempt timeout.
    pub timeout_ms: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl DeliveryConfig {
    /// Sets the per-attempt timeout.
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Per-attempt timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: concat!("hookbridge/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay_ms: u64,
    /// Cap on any single delay.
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0).
    pub jitter: f64,
}

impl RetryConfig {
    /// Builds the backoff policy.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new()
            .base(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_attempts(self.max_attempts)
            .jitter(self.jitter)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 3_600_000,
            jitter: 0.1,
        }
    }
}

/// Redaction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Sensitive key words.
    pub keywords: Vec<String>,
    /// Mask character.
    pub mask: char,
}

impl RedactionConfig {
    /// Builds the keyword policy.
    pub fn policy(&self) -> Arc<dyn RedactionPolicy> {
        Arc::new(KeywordRedactionPolicy::with_keywords(&self.keywords).mask(self.mask))
    }
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            mask: DEFAULT_MASK,
        }
    }
}
