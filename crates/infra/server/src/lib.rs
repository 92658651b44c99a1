//! # Hookbridge Server
//!
//! Hosts the webhook pipeline in one process: an event bus for the
//! application to fire into, a registry seeded from configuration, the event
//! bridge, and a pool of delivery workers.

mod config;

pub use config::{
    ConfigError, GroupSeed, HookbridgeConfig, ServerConfig, WebhookSeed, load_config, parse_config,
};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use hookbridge_events::{EventBus, EventRegistry};
use hookbridge_webhooks::{
    Binding, DeliveryClient, DeliveryWorker, EventBridge, InMemoryQueue, InMemoryWebhookRegistry,
    JobQueue, PayloadBuilder, WebhookError, WebhookGroup, WebhookRegistry,
};

/// Startup failure.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Registry or delivery client failure.
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    /// A seeded group or webhook failed validation.
    #[error("Invalid {kind} \"{name}\": {errors}")]
    InvalidSeed {
        /// `group` or `webhook`.
        kind: &'static str,
        /// Seed name.
        name: String,
        /// Field errors, joined.
        errors: String,
    },
    /// A seeded webhook names a group that is not seeded.
    #[error("Webhook \"{webhook}\" references unknown group \"{group}\"")]
    UnknownGroup {
        /// Webhook name.
        webhook: String,
        /// Missing group name.
        group: String,
    },
}

/// A running webhook pipeline.
pub struct WebhookHost {
    config: HookbridgeConfig,
    bus: Arc<EventBus>,
    registry: Arc<InMemoryWebhookRegistry>,
    queue: Arc<InMemoryQueue>,
    bridge: Option<EventBridge>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl WebhookHost {
    /// Creates a host from configuration.
    ///
    /// When the configuration declares sources, bindings are validated
    /// against them; otherwise they are not checked.
    pub fn new(config: HookbridgeConfig) -> Self {
        if config.sources.is_empty() {
            Self::with_bus(config, EventBus::new())
        } else {
            Self::with_sources(config, Arc::new(EventRegistry::new()))
        }
    }

    /// Creates a host whose bus validates bindings against `sources` and
    /// dispatches inherited events. Sources declared in the configuration
    /// are added to `sources`.
    pub fn with_sources(config: HookbridgeConfig, sources: Arc<EventRegistry>) -> Self {
        config.register_sources(&sources);
        Self::with_bus(config, EventBus::with_registry(sources))
    }

    fn with_bus(config: HookbridgeConfig, bus: EventBus) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            bus: Arc::new(bus),
            registry: Arc::new(InMemoryWebhookRegistry::new()),
            queue: Arc::new(InMemoryQueue::new()),
            bridge: None,
            shutdown,
            workers: Vec::new(),
        }
    }

    /// Gets the bus events are fired into.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Gets the webhook registry.
    pub fn registry(&self) -> &Arc<InMemoryWebhookRegistry> {
        &self.registry
    }

    /// Gets the delivery queue.
    pub fn queue(&self) -> &Arc<InMemoryQueue> {
        &self.queue
    }

    /// Gets the active bindings.
    pub fn bindings(&self) -> &[Binding] {
        self.bridge.as_ref().map(|b| b.bindings()).unwrap_or(&[])
    }

    /// Seeds the registry, binds webhooks and starts the workers.
    pub async fn start(&mut self) -> Result<(), HostError> {
        self.seed().await?;

        let webhooks = self.config.webhook_config();
        let builder = PayloadBuilder::new(webhooks.redaction.policy());
        let queue: Arc<dyn JobQueue> = self.queue.clone();

        let bridge =
            EventBridge::initialize(self.registry.as_ref(), &self.bus, Arc::clone(&queue), builder)
                .await;
        self.bridge = Some(bridge);

        let client = DeliveryClient::new(&webhooks.delivery)?;
        let worker = Arc::new(DeliveryWorker::new(
            queue,
            client,
            webhooks.retry.backoff(),
            webhooks.worker.clone(),
        ));
        self.workers = worker.spawn(webhooks.worker.count, self.shutdown.subscribe());

        tracing::info!(
            webhooks = self.bindings().len(),
            workers = self.workers.len(),
            "Hookbridge started"
        );
        Ok(())
    }

    /// Rebinds webhooks from the current registry state.
    pub async fn reload(&mut self) {
        if let Some(bridge) = self.bridge.take() {
            self.bridge = Some(bridge.reinitialize(self.registry.as_ref(), &self.bus).await);
        }
    }

    /// Unbinds all webhooks and waits for workers to finish their current job.
    pub async fn shutdown(mut self) {
        if let Some(bridge) = self.bridge.take() {
            bridge.teardown(&self.bus).await;
        }

        let _ = self.shutdown.send(true);
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Delivery worker panicked");
            }
        }
        tracing::info!("Hookbridge stopped");
    }

    async fn seed(&self) -> Result<(), HostError> {
        let mut group_ids = HashMap::new();
        for seed in &self.config.groups {
            let mut group = WebhookGroup::new(&seed.name);
            if !self.registry.save_group(&mut group).await? {
                return Err(HostError::InvalidSeed {
                    kind: "group",
                    name: seed.name.clone(),
                    errors: describe(group.errors().iter()),
                });
            }
            group_ids.insert(seed.name.clone(), group.id);
        }

        for seed in &self.config.webhooks {
            let group_id = match &seed.group {
                Some(name) => match group_ids.get(name) {
                    Some(id) => *id,
                    None => {
                        return Err(HostError::UnknownGroup {
                            webhook: seed.name.clone(),
                            group: name.clone(),
                        });
                    }
                },
                None => None,
            };

            let mut webhook = seed.to_webhook(group_id);
            if !self.registry.save(&mut webhook).await? {
                return Err(HostError::InvalidSeed {
                    kind: "webhook",
                    name: seed.name.clone(),
                    errors: describe(webhook.errors().iter()),
                });
            }
        }

        Ok(())
    }
}

fn describe<'a>(errors: impl Iterator<Item = (&'a String, &'a Vec<String>)>) -> String {
    errors
        .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}
