//! Event bus keyed by source type and event name.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;

use crate::error::EventResult;
use crate::event::Event;
use crate::handler::{BoxedHandler, EventHandler, SubscriptionId};
use crate::registry::EventRegistry;

type SubscriptionKey = (String, String);

/// The event bus for publishing and subscribing to events.
///
/// Handlers subscribe to a `(source type, event name)` pair and run in the
/// task that triggers the event, one after another in subscription order.
pub struct EventBus {
    /// Handlers mapped by `(source type, event name)`.
    subscribers: RwLock<HashMap<SubscriptionKey, Vec<(SubscriptionId, BoxedHandler)>>>,
    /// Source catalog used for inherited dispatch.
    sources: Option<Arc<EventRegistry>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            sources: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates an event bus that also dispatches to handlers registered on
    /// ancestor source types.
    pub fn with_registry(sources: Arc<EventRegistry>) -> Self {
        Self {
            sources: Some(sources),
            ..Self::new()
        }
    }

    /// Returns the attached source registry.
    pub fn sources(&self) -> Option<&Arc<EventRegistry>> {
        self.sources.as_ref()
    }

    /// Subscribes a handler to events named `event_name` fired by
    /// `source_type`.
    pub async fn on(
        &self,
        source_type: &str,
        event_name: &str,
        handler: impl EventHandler + 'static,
    ) -> SubscriptionId {
        self.on_shared(source_type, event_name, Arc::new(handler)).await
    }

    /// Subscribes an already shared handler.
    pub async fn on_shared(
        &self,
        source_type: &str,
        event_name: &str,
        handler: BoxedHandler,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subs = self.subscribers.write().await;
        subs.entry((source_type.to_string(), event_name.to_string()))
            .or_default()
            .push((id, handler));
        id
    }

    /// Removes a subscription. Returns false when it was not found.
    pub async fn off(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write().await;
        let mut removed = false;

        subs.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(sub, _)| *sub != id);
            removed |= handlers.len() != before;
            !handlers.is_empty()
        });

        removed
    }

    /// Triggers an event.
    ///
    /// Handlers run sequentially in the caller's task. The first failing
    /// handler stops dispatch and its error is returned to the caller.
    /// Returns the number of handlers that ran.
    pub async fn trigger(&self, event: &Event) -> EventResult<usize> {
        let handlers = self.collect_handlers(event).await;
        if handlers.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        for handler in &handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::error!(
                    "Event handler '{}' failed for {}: {}",
                    handler.id(),
                    event.key(),
                    e
                );
                return Err(e);
            }
        }

        tracing::debug!(
            "Dispatched {} to {} handler(s) in {}ms",
            event.key(),
            handlers.len(),
            start.elapsed().as_millis()
        );

        Ok(handlers.len())
    }

    /// Gets the number of subscribers for a source type and event.
    pub async fn subscriber_count(&self, source_type: &str, event_name: &str) -> usize {
        let subs = self.subscribers.read().await;
        subs.get(&(source_type.to_string(), event_name.to_string()))
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// Gets the total number of subscriptions.
    pub async fn total_subscriptions(&self) -> usize {
        let subs = self.subscribers.read().await;
        subs.values().map(|v| v.len()).sum()
    }

    /// Clears all subscribers.
    pub async fn clear_subscribers(&self) {
        let mut subs = self.subscribers.write().await;
        subs.clear();
    }

    // Exact source type first, then ancestors.
    async fn collect_handlers(&self, event: &Event) -> Vec<BoxedHandler> {
        let lineage = match &self.sources {
            Some(sources) => sources.lineage(&event.source),
            None => vec![event.source.clone()],
        };

        let subs = self.subscribers.read().await;
        let mut handlers = Vec::new();
        for source_type in lineage {
            if let Some(found) = subs.get(&(source_type, event.name.clone())) {
                handlers.extend(found.iter().map(|(_, h)| h.clone()));
            }
        }
        handlers
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;
    use crate::handler::FnHandler;
    use crate::registry::SourceDefinition;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder(id: &str, log: Arc<Mutex<Vec<String>>>) -> impl EventHandler + 'static {
        let id = id.to_string();
        FnHandler::new(id.clone(), move |event: &Event| {
            log.lock().unwrap().push(format!("{}:{}", id, event.key()));
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_trigger_matches_source_and_name() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on("OrderPlaced", "afterSave", recorder("a", log.clone())).await;

        let ran = bus
            .trigger(&Event::new("OrderPlaced", "afterSave", json!({})))
            .await
            .unwrap();
        assert_eq!(ran, 1);

        let ran = bus
            .trigger(&Event::new("OrderPlaced", "afterDelete", json!({})))
            .await
            .unwrap();
        assert_eq!(ran, 0);

        let ran = bus
            .trigger(&Event::new("Invoice", "afterSave", json!({})))
            .await
            .unwrap();
        assert_eq!(ran, 0);

        assert_eq!(*log.lock().unwrap(), vec!["a:OrderPlaced.afterSave"]);
    }

    #[tokio::test]
    async fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on("Entry", "afterSave", recorder("first", log.clone())).await;
        bus.on("Entry", "afterSave", recorder("second", log.clone())).await;

        bus.trigger(&Event::new("Entry", "afterSave", json!({})))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:Entry.afterSave", "second:Entry.afterSave"]
        );
    }

    #[tokio::test]
    async fn test_handler_error_stops_dispatch() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on(
            "Entry",
            "afterSave",
            FnHandler::new("broken", |_: &Event| Err(EventError::handler("broken", "boom"))),
        )
        .await;
        bus.on("Entry", "afterSave", recorder("after", log.clone())).await;

        let result = bus.trigger(&Event::new("Entry", "afterSave", json!({}))).await;
        assert!(matches!(result, Err(EventError::HandlerFailed { .. })));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_off_removes_subscription() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = bus.on("Entry", "afterSave", recorder("a", log.clone())).await;
        assert_eq!(bus.subscriber_count("Entry", "afterSave").await, 1);

        assert!(bus.off(id).await);
        assert!(!bus.off(id).await);
        assert_eq!(bus.total_subscriptions().await, 0);

        bus.trigger(&Event::new("Entry", "afterSave", json!({})))
            .await
            .unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inherited_dispatch() {
        let sources = Arc::new(EventRegistry::new());
        sources.register(SourceDefinition::new("Element").events(["afterSave"]));
        sources.register(SourceDefinition::new("Entry").extends("Element"));

        let bus = EventBus::with_registry(sources);
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on("Element", "afterSave", recorder("parent", log.clone())).await;
        bus.on("Entry", "afterSave", recorder("child", log.clone())).await;

        let ran = bus
            .trigger(&Event::new("Entry", "afterSave", json!({})))
            .await
            .unwrap();
        assert_eq!(ran, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["child:Entry.afterSave", "parent:Entry.afterSave"]
        );

        // Parent events do not reach child subscriptions.
        let ran = bus
            .trigger(&Event::new("Element", "afterSave", json!({})))
            .await
            .unwrap();
        assert_eq!(ran, 1);
    }
}
