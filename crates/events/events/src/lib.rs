//! # Hookbridge Events
//!
//! Event facility that webhooks subscribe to:
//! - Events fired by a typed source, with explicit event-specific fields
//! - Exportable senders and field values with attribute selection
//! - Event bus keyed by `(source type, event name)`
//! - Source registry for discovery, validation and inherited dispatch
//!
//! ## Example
//!
//! ```rust,ignore
//! use hookbridge_events::{Event, EventBus, FnHandler, Record};
//!
//! let bus = EventBus::new();
//!
//! bus.on("OrderPlaced", "afterSave", FnHandler::new("audit", |event| {
//!     println!("Order saved: {}", event.key());
//!     Ok(())
//! })).await;
//!
//! let order = Record::new().field("id", 42).field("total", 99.5);
//! let event = Event::new("OrderPlaced", "afterSave", order)
//!     .with_field("isNew", serde_json::json!(true));
//! bus.trigger(&event).await?;
//! ```

mod bus;
mod error;
mod event;
mod export;
mod handler;
mod registry;

pub use bus::EventBus;
pub use error::{EventError, EventResult};
pub use event::{BASE_FIELDS, Event, EventDetail, EventField};
pub use export::{AttributeSelector, AttributeSpec, Exportable, FieldExport, Record};
pub use handler::{BoxedHandler, EventHandler, FnHandler, SubscriptionId};
pub use registry::{EventRegistry, EventSource, SourceDefinition};
