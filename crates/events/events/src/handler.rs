//! Event handler trait and types.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::EventError;
use crate::event::Event;

/// Trait for event handlers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns a unique identifier for this handler.
    fn id(&self) -> &str {
        "anonymous"
    }

    /// Handles an event.
    async fn handle(&self, event: &Event) -> Result<(), EventError>;
}

/// A shared event handler.
pub type BoxedHandler = Arc<dyn EventHandler>;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Wrapper for closure handlers that do not await.
pub struct FnHandler<F>
where
    F: Fn(&Event) -> Result<(), EventError> + Send + Sync,
{
    id: String,
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Event) -> Result<(), EventError> + Send + Sync,
{
    /// Creates a new function handler.
    pub fn new(id: impl Into<String>, handler: F) -> Self {
        Self {
            id: id.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> Result<(), EventError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        (self.handler)(event)
    }
}
