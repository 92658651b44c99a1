//! # Hookbridge Webhooks
//!
//! Turns events into outbound HTTP deliveries:
//! - Webhook and group definitions with field-level validation
//! - Registry contract with an in-memory implementation
//! - Event bridge binding enabled webhooks to the event bus
//! - Payload building with attribute selection and redaction
//! - Pluggable job queues and retry policies
//! - Worker pool performing deliveries with a per-attempt timeout
//!
//! ## Example
//!
//! ```rust,ignore
//! use hookbridge_webhooks::{EventBridge, InMemoryQueue, InMemoryWebhookRegistry, PayloadBuilder, Webhook};
//!
//! let registry = InMemoryWebhookRegistry::new();
//! let mut webhook = Webhook::new("Orders", "OrderPlaced", "afterSave", "https://example.com/hook")
//!     .sender_attributes(["id", "email"]);
//! registry.save(&mut webhook).await?;
//!
//! let queue = Arc::new(InMemoryQueue::new());
//! let bridge = EventBridge::initialize(&registry, &bus, queue, PayloadBuilder::default()).await;
//!
//! // Firing `OrderPlaced.afterSave` on the bus now queues a delivery.
//! ```

mod bridge;
#[cfg(feature = "http-client")]
mod client;
mod config;
mod error;
mod job;
mod payload;
mod queue;
mod redaction;
mod registry;
mod retry;
mod webhook;
#[cfg(feature = "http-client")]
mod worker;

pub use bridge::{Binding, EventBridge};
#[cfg(feature = "http-client")]
pub use client::{DeliveryClient, DeliveryReceipt};
pub use config::{DeliveryConfig, RedactionConfig, RetryConfig, WebhookConfig, WorkerConfig};
pub use error::{WebhookError, WebhookResult};
pub use job::{DeliveryJob, JobStatus};
pub use payload::{PayloadBuilder, WebhookPayload};
pub use queue::{DEFAULT_COMPLETED_LIMIT, InMemoryQueue, JobQueue, QueueError};
pub use redaction::{
    DEFAULT_KEYWORDS, DEFAULT_MASK, KeywordRedactionPolicy, NoRedaction, RedactionPolicy,
    redact_document,
};
pub use registry::{InMemoryWebhookRegistry, WebhookRegistry};
pub use retry::{ExponentialBackoff, FixedDelay, NoRetry, RetryPolicy};
pub use webhook::{ValidationErrors, Webhook, WebhookGroup, WebhookType};
#[cfg(feature = "http-client")]
pub use worker::{DeliveryWorker, JobOutcome};
