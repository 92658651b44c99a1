//! Payload construction for `post` webhooks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use hookbridge_events::{AttributeSpec, Event, Exportable};

use crate::redaction::{KeywordRedactionPolicy, RedactionPolicy, redact_document};
use crate::webhook::Webhook;

/// Body sent to `post` webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Current-user context. Always built from an empty placeholder, so it
    /// renders as `{}`.
    pub user: Value,
    /// Name of the fired event.
    pub name: String,
    /// The event sender.
    pub sender: Value,
    /// Fields added by the specific event kind.
    pub event: Map<String, Value>,
}

impl WebhookPayload {
    /// Converts the payload into a JSON document.
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Builds redacted payloads from fired events.
#[derive(Clone)]
pub struct PayloadBuilder {
    policy: Arc<dyn RedactionPolicy>,
}

impl PayloadBuilder {
    /// Creates a builder with the given redaction policy.
    pub fn new(policy: Arc<dyn RedactionPolicy>) -> Self {
        Self { policy }
    }

    /// Returns the redaction policy.
    pub fn policy(&self) -> &dyn RedactionPolicy {
        self.policy.as_ref()
    }

    /// Builds the payload for `event` as configured by `webhook`.
    pub fn build(&self, event: &Event, webhook: &Webhook) -> WebhookPayload {
        let mut fields = Map::new();
        for field in event.fields() {
            let spec = webhook.event_attributes_for(&field.name);
            let root = format!("event.{}", field.name);
            fields.insert(field.name.clone(), self.convert(&field.value, &spec, &root));
        }

        WebhookPayload {
            user: self.convert(&Exportable::empty(), &webhook.user_attributes, "user"),
            name: event.name.clone(),
            sender: self.convert(&event.sender, &webhook.sender_attributes, "sender"),
            event: fields,
        }
    }

    /// Converts an object to a redacted document.
    ///
    /// Structured objects export exactly the `extra` selection; plain values
    /// are exported whole. Every leaf is then passed through the policy with
    /// key paths rooted at `root`.
    pub fn convert(&self, object: &Exportable, extra: &AttributeSpec, root: &str) -> Value {
        let document = object.export_with(&AttributeSpec::new(), extra);
        redact_document(self.policy.as_ref(), root, document)
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(Arc::new(KeywordRedactionPolicy::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookbridge_events::{EventDetail, EventField, Record};
    use serde_json::json;

    struct OrderSaved {
        order: Record,
        is_new: bool,
        note: Option<String>,
    }

    impl EventDetail for OrderSaved {
        fn fields(&self) -> Vec<EventField> {
            vec![
                EventField::new("order", self.order.clone()),
                EventField::new("isNew", json!(self.is_new)),
                EventField::new("note", Exportable::plain(&self.note)),
            ]
        }
    }

    fn customer() -> Record {
        Record::new()
            .field("id", 42)
            .field("email", "a@b.com")
            .field("password", "hunter2")
    }

    fn webhook() -> Webhook {
        Webhook::new("Orders", "OrderPlaced", "afterSave", "https://example.test/hook")
    }

    #[test]
    fn test_sender_selection() {
        let builder = PayloadBuilder::default();
        let event = Event::new("OrderPlaced", "afterSave", customer());

        let payload = builder.build(&event, &webhook().sender_attributes(["id"]));
        assert_eq!(payload.sender, json!({"id": 42}));
        assert_eq!(payload.name, "afterSave");
    }

    #[test]
    fn test_sender_redaction() {
        let builder = PayloadBuilder::default();
        let event = Event::new("OrderPlaced", "afterSave", customer());

        let payload = builder.build(&event, &webhook().sender_attributes(["id", "password"]));
        assert_eq!(payload.sender, json!({"id": 42, "password": "•••••••"}));
    }

    #[test]
    fn test_user_is_empty_document() {
        let builder = PayloadBuilder::default();
        let event = Event::new("OrderPlaced", "afterSave", customer());

        let payload = builder.build(&event, &webhook().user_attributes(["id", "email"]));
        assert_eq!(payload.user, json!({}));
    }

    #[test]
    fn test_event_fields_only_specific() {
        let builder = PayloadBuilder::default();
        let event = Event::new("OrderPlaced", "afterSave", customer()).with_detail(&OrderSaved {
            order: Record::new().field("id", 7).field("total", 19.5),
            is_new: false,
            note: None,
        });

        let payload = builder.build(&event, &webhook().event_attribute("order", ["id"]));

        let keys: Vec<_> = payload.event.keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        for base in hookbridge_events::BASE_FIELDS {
            assert!(!payload.event.contains_key(*base));
        }
        assert_eq!(payload.event["order"], json!({"id": 7}));
        // Falsy and null values are still present.
        assert_eq!(payload.event["isNew"], json!(false));
        assert_eq!(payload.event["note"], json!(null));
    }

    #[test]
    fn test_base_named_fields_never_reach_event_section() {
        let builder = PayloadBuilder::default();
        let event = Event::new("OrderPlaced", "afterSave", customer())
            .with_field("sender", json!({"spoof": true}))
            .with_field("name", json!("x"))
            .with_field("isNew", json!(true));

        let payload = builder.build(&event, &webhook().sender_attributes(["id"]));
        let keys: Vec<_> = payload.event.keys().cloned().collect();
        assert_eq!(keys, vec!["isNew"]);
        assert_eq!(payload.name, "afterSave");
        assert_eq!(payload.sender, json!({"id": 42}));
    }

    #[test]
    fn test_event_field_without_spec_exports_nothing_structured() {
        let builder = PayloadBuilder::default();
        let event = Event::new("OrderPlaced", "afterSave", json!({}))
            .with_field("order", Record::new().field("id", 7));

        let payload = builder.build(&event, &webhook());
        assert_eq!(payload.event["order"], json!({}));
    }

    #[test]
    fn test_plain_sender_ignores_selection_but_is_redacted() {
        let builder = PayloadBuilder::default();
        let event = Event::new(
            "Cron",
            "tick",
            json!({"host": "worker-1", "secret": "s3"}),
        );

        let payload = builder.build(&event, &webhook().sender_attributes(["host"]));
        assert_eq!(payload.sender, json!({"host": "worker-1", "secret": "••"}));
    }

    #[test]
    fn test_scalar_event_field_redacted_by_name() {
        let builder = PayloadBuilder::default();
        let event = Event::new("Auth", "login", json!({})).with_field("apiToken", json!("abc"));

        let payload = builder.build(&event, &webhook());
        assert_eq!(payload.event["apiToken"], json!("•••"));
    }

    #[test]
    fn test_payload_has_four_fields() {
        let builder = PayloadBuilder::default();
        let event = Event::new("OrderPlaced", "afterSave", customer());

        let value = builder.build(&event, &webhook()).into_value();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        for key in ["user", "name", "sender", "event"] {
            assert!(value.get(key).is_some());
        }
    }
}
