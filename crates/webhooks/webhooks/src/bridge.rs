//! Binds enabled webhooks to the event bus.
//!
//! Bindings are a snapshot taken when the bridge is initialized. Webhooks
//! created, edited or toggled afterwards take effect on the next
//! [`EventBridge::reinitialize`].

use async_trait::async_trait;
use std::sync::Arc;

use hookbridge_events::{Event, EventBus, EventError, EventHandler, SubscriptionId};

use crate::job::DeliveryJob;
use crate::payload::PayloadBuilder;
use crate::queue::JobQueue;
use crate::registry::WebhookRegistry;
use crate::webhook::Webhook;

/// One live subscription created for a webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Webhook id.
    pub webhook_id: Option<u64>,
    /// Webhook name.
    pub webhook_name: String,
    /// Source type subscribed to.
    pub class: String,
    /// Event name subscribed to.
    pub event: String,
    /// Subscription handle on the bus.
    pub subscription: SubscriptionId,
}

/// Turns event firings into queued deliveries.
pub struct EventBridge {
    queue: Arc<dyn JobQueue>,
    builder: PayloadBuilder,
    bindings: Vec<Binding>,
}

impl EventBridge {
    /// Reads the enabled webhooks and subscribes one handler per webhook.
    ///
    /// A registry failure is logged and leaves the bridge with no bindings.
    /// When the bus carries a source registry, webhooks naming an unknown
    /// source or event are logged and skipped.
    pub async fn initialize(
        registry: &dyn WebhookRegistry,
        bus: &EventBus,
        queue: Arc<dyn JobQueue>,
        builder: PayloadBuilder,
    ) -> Self {
        let webhooks = match registry.list_enabled().await {
            Ok(webhooks) => webhooks,
            Err(e) => {
                tracing::error!(error = %e, "Could not load enabled webhooks; none will fire");
                Vec::new()
            }
        };

        if bus.sources().is_none() && !webhooks.is_empty() {
            tracing::warn!(
                "No source registry attached to the event bus; webhook class and event names are not checked"
            );
        }

        let mut bindings = Vec::with_capacity(webhooks.len());
        let mut skipped = 0;

        for webhook in webhooks {
            if let Some(sources) = bus.sources() {
                if let Err(e) = sources.resolve(&webhook.class, &webhook.event) {
                    tracing::error!(
                        webhook = %webhook.name,
                        class = %webhook.class,
                        event = %webhook.event,
                        error = %e,
                        "Invalid webhook configuration; not bound"
                    );
                    skipped += 1;
                    continue;
                }
            }

            let handler = WebhookHandler::new(webhook.clone(), Arc::clone(&queue), builder.clone());
            let subscription = bus.on(&webhook.class, &webhook.event, handler).await;

            bindings.push(Binding {
                webhook_id: webhook.id,
                webhook_name: webhook.name,
                class: webhook.class,
                event: webhook.event,
                subscription,
            });
        }

        tracing::info!(bound = bindings.len(), skipped, "Webhook bridge initialized");

        Self {
            queue,
            builder,
            bindings,
        }
    }

    /// Unsubscribes every binding. Returns how many were removed.
    pub async fn teardown(self, bus: &EventBus) -> usize {
        let mut removed = 0;
        for binding in &self.bindings {
            if bus.off(binding.subscription).await {
                removed += 1;
            }
        }
        tracing::debug!(removed, "Webhook bridge torn down");
        removed
    }

    /// Tears down and initializes again from the current registry state.
    pub async fn reinitialize(self, registry: &dyn WebhookRegistry, bus: &EventBus) -> Self {
        let queue = Arc::clone(&self.queue);
        let builder = self.builder.clone();
        self.teardown(bus).await;
        Self::initialize(registry, bus, queue, builder).await
    }

    /// Gets the active bindings.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Gets the number of active bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Checks if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Handler holding its own copy of the webhook.
struct WebhookHandler {
    id: String,
    webhook: Webhook,
    queue: Arc<dyn JobQueue>,
    builder: PayloadBuilder,
}

impl WebhookHandler {
    fn new(webhook: Webhook, queue: Arc<dyn JobQueue>, builder: PayloadBuilder) -> Self {
        let id = match webhook.id {
            Some(id) => format!("webhook-{}", id),
            None => format!("webhook-{}", webhook.name),
        };
        Self {
            id,
            webhook,
            queue,
            builder,
        }
    }
}

#[async_trait]
impl EventHandler for WebhookHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        let data = self
            .webhook
            .webhook_type
            .has_body()
            .then(|| self.builder.build(event, &self.webhook).into_value());

        let job = DeliveryJob::new(
            format!("Sending webhook “{}”", self.webhook.name),
            self.webhook.webhook_type,
            self.webhook.url.clone(),
            data,
        );

        tracing::debug!(
            webhook = %self.webhook.name,
            job_id = %job.id,
            event = %event.key(),
            "Queueing webhook delivery"
        );

        self.queue
            .push(job)
            .await
            .map_err(|e| EventError::handler(&self.id, e.to_string()))
    }
}
