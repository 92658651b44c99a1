//! Source registry for event discovery and validation.
//!
//! Every observable type is described by a [`SourceDefinition`]: its type
//! identifier, optional parent type, and the events it publishes. Subscribers
//! resolve `(source type, event name)` pairs against this catalog.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::{EventError, EventResult};
use crate::event::Event;
use crate::export::Exportable;

/// Definition of an event-publishing type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Type identifier (e.g. "OrderPlaced").
    pub type_id: String,
    /// Parent type identifier. Events of the parent are inherited.
    #[serde(default)]
    pub parent: Option<String>,
    /// Events published by this type.
    #[serde(default)]
    pub events: Vec<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl SourceDefinition {
    /// Creates a new source definition.
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            parent: None,
            events: Vec::new(),
            description: String::new(),
        }
    }

    /// Sets the parent type.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds published events.
    pub fn events(mut self, events: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.events.extend(events.into_iter().map(Into::into));
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Capability implemented by types that publish events.
pub trait EventSource {
    /// Type identifier used in subscriptions.
    const SOURCE_TYPE: &'static str;

    /// Events published by this type.
    fn published_events() -> &'static [&'static str];

    /// Parent type, if events are inherited from one.
    fn parent_type() -> Option<&'static str> {
        None
    }

    /// Builds the registry definition for this type.
    fn definition() -> SourceDefinition {
        let mut def = SourceDefinition::new(Self::SOURCE_TYPE)
            .events(Self::published_events().iter().copied());
        def.parent = Self::parent_type().map(str::to_string);
        def
    }

    /// Creates an event fired by `sender`.
    fn event(name: impl Into<String>, sender: impl Into<Exportable>) -> Event {
        Event::new(Self::SOURCE_TYPE, name, sender)
    }
}

/// Registry of event-publishing types.
pub struct EventRegistry {
    definitions: RwLock<HashMap<String, SourceDefinition>>,
}

impl EventRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a source definition, replacing any previous one.
    pub fn register(&self, definition: SourceDefinition) {
        self.write().insert(definition.type_id.clone(), definition);
    }

    /// Registers the definition of an [`EventSource`] type.
    pub fn register_source<S: EventSource>(&self) {
        self.register(S::definition());
    }

    /// Gets a source definition by type identifier.
    pub fn get(&self, type_id: &str) -> Option<SourceDefinition> {
        self.read().get(type_id).cloned()
    }

    /// Checks if a source type is registered.
    pub fn is_registered(&self, type_id: &str) -> bool {
        self.read().contains_key(type_id)
    }

    /// Returns the type followed by its registered ancestors.
    pub fn lineage(&self, type_id: &str) -> Vec<String> {
        parent_chain(&self.read(), type_id)
    }

    /// Checks that a type publishes an event, directly or by inheritance.
    pub fn resolve(&self, type_id: &str, event: &str) -> EventResult<()> {
        let defs = self.read();
        if !defs.contains_key(type_id) {
            return Err(EventError::UnknownSource(type_id.to_string()));
        }

        let declared = parent_chain(&defs, type_id)
            .iter()
            .filter_map(|t| defs.get(t))
            .any(|d| d.events.iter().any(|e| e == event));

        if declared {
            Ok(())
        } else {
            Err(EventError::UnknownEvent {
                source_type: type_id.to_string(),
                event: event.to_string(),
            })
        }
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Checks if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SourceDefinition>> {
        self.definitions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SourceDefinition>> {
        self.definitions.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn parent_chain(defs: &HashMap<String, SourceDefinition>, type_id: &str) -> Vec<String> {
    let mut chain = vec![type_id.to_string()];
    let mut current = defs.get(type_id).and_then(|d| d.parent.clone());

    while let Some(parent) = current {
        if chain.contains(&parent) {
            tracing::warn!("Source type '{}' has a cyclic parent chain", type_id);
            break;
        }
        current = defs.get(&parent).and_then(|d| d.parent.clone());
        chain.push(parent);
    }

    chain
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}
