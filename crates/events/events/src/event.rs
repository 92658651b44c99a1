//! Event types and structures.

use chrono::{DateTime, Utc};

use crate::export::Exportable;

/// Names of the fields every event carries. These never count as
/// event-specific fields.
pub const BASE_FIELDS: &[&str] = &["id", "source", "name", "sender", "timestamp"];

/// A field contributed by a specific event kind.
#[derive(Debug, Clone)]
pub struct EventField {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: Exportable,
}

impl EventField {
    /// Creates a new event field.
    pub fn new(name: impl Into<String>, value: impl Into<Exportable>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Capability of event kinds that carry fields beyond the common base.
///
/// Implementors list their own fields in a fixed order.
pub trait EventDetail {
    /// Returns the fields this event kind adds to the base event.
    fn fields(&self) -> Vec<EventField>;
}

/// An event fired by a source object.
#[derive(Debug, Clone)]
pub struct Event {
    /// Unique identifier for this event instance.
    pub id: String,
    /// Type identifier of the publishing object (e.g. "OrderPlaced").
    pub source: String,
    /// Event name (e.g. "afterSave").
    pub name: String,
    /// The object that fired the event.
    pub sender: Exportable,
    /// Timestamp when the event was created.
    pub timestamp: DateTime<Utc>,
    fields: Vec<EventField>,
}

impl Event {
    /// Creates a new event with no event-specific fields.
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        sender: impl Into<Exportable>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            name: name.into(),
            sender: sender.into(),
            timestamp: Utc::now(),
            fields: Vec::new(),
        }
    }

    /// Adds or replaces an event-specific field. Names in [`BASE_FIELDS`]
    /// are ignored.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Exportable>) -> Self {
        self.set_field(EventField::new(name, value));
        self
    }

    /// Adds every field declared by an event kind.
    pub fn with_detail(mut self, detail: &impl EventDetail) -> Self {
        for field in detail.fields() {
            self.set_field(field);
        }
        self
    }

    /// Returns the event-specific fields in declaration order.
    pub fn fields(&self) -> &[EventField] {
        &self.fields
    }

    /// Gets an event-specific field by name.
    pub fn field(&self, name: &str) -> Option<&Exportable> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Returns the `source.name` key used in logs.
    pub fn key(&self) -> String {
        format!("{}.{}", self.source, self.name)
    }

    fn set_field(&mut self, field: EventField) {
        if BASE_FIELDS.contains(&field.name.as_str()) {
            tracing::warn!(
                "Ignoring field '{}' on {}: it is a base event field",
                field.name,
                self.key()
            );
            return;
        }

        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }
}
