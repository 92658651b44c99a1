//! Webhook and webhook group definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use hookbridge_events::AttributeSpec;

/// How a webhook is delivered.
///
/// `post` sends the payload as a JSON body; any other configured value is
/// treated as a plain `GET` trigger without a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WebhookType {
    /// POST with a JSON payload.
    #[default]
    Post,
    /// GET without a body.
    Get,
}

impl WebhookType {
    /// Returns the configuration value.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookType::Post => "post",
            WebhookType::Get => "get",
        }
    }

    /// Checks whether deliveries of this type carry a payload.
    pub fn has_body(&self) -> bool {
        matches!(self, WebhookType::Post)
    }
}

impl From<&str> for WebhookType {
    fn from(value: &str) -> Self {
        if value == "post" {
            WebhookType::Post
        } else {
            WebhookType::Get
        }
    }
}

impl From<String> for WebhookType {
    fn from(value: String) -> Self {
        WebhookType::from(value.as_str())
    }
}

impl From<WebhookType> for String {
    fn from(value: WebhookType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for WebhookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    /// Creates an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Returns the messages for a field.
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Checks whether a field has errors.
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Iterates over fields and their messages.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Returns the number of fields with errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes all messages.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// A configured binding from one event to one delivery target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    /// Identifier, assigned on first save.
    #[serde(default)]
    pub id: Option<u64>,
    /// Group used to organize webhooks.
    #[serde(default)]
    pub group_id: Option<u64>,
    /// Display name.
    pub name: String,
    /// Type identifier of the event source to observe.
    pub class: String,
    /// Event raised by the source.
    pub event: String,
    /// Delivery mode.
    #[serde(rename = "type", default)]
    pub webhook_type: WebhookType,
    /// Delivery target.
    pub url: String,
    /// Only enabled webhooks are bound to events.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Attributes forwarded for the current user.
    #[serde(default)]
    pub user_attributes: AttributeSpec,
    /// Attributes forwarded for the event sender.
    #[serde(default)]
    pub sender_attributes: AttributeSpec,
    /// Attributes forwarded per event field.
    #[serde(default)]
    pub event_attributes: BTreeMap<String, AttributeSpec>,
    /// When the webhook was first saved.
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    /// When the webhook was last saved.
    #[serde(default)]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(skip)]
    errors: ValidationErrors,
}

fn default_enabled() -> bool {
    true
}

impl Webhook {
    /// Creates an unsaved, enabled `post` webhook.
    pub fn new(
        name: impl Into<String>,
        class: impl Into<String>,
        event: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            group_id: None,
            name: name.into(),
            class: class.into(),
            event: event.into(),
            webhook_type: WebhookType::Post,
            url: url.into(),
            enabled: true,
            user_attributes: AttributeSpec::new(),
            sender_attributes: AttributeSpec::new(),
            event_attributes: BTreeMap::new(),
            date_created: None,
            date_updated: None,
            errors: ValidationErrors::new(),
        }
    }

    /// Sets the group.
    pub fn group(mut self, group_id: u64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Sets the delivery mode.
    pub fn webhook_type(mut self, webhook_type: impl Into<WebhookType>) -> Self {
        self.webhook_type = webhook_type.into();
        self
    }

    /// Sets the user attribute selection.
    pub fn user_attributes(mut self, spec: impl Into<AttributeSpec>) -> Self {
        self.user_attributes = spec.into();
        self
    }

    /// Sets the sender attribute selection.
    pub fn sender_attributes(mut self, spec: impl Into<AttributeSpec>) -> Self {
        self.sender_attributes = spec.into();
        self
    }

    /// Sets the attribute selection for one event field.
    pub fn event_attribute(mut self, field: impl Into<String>, spec: impl Into<AttributeSpec>) -> Self {
        self.event_attributes.insert(field.into(), spec.into());
        self
    }

    /// Disables the webhook.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns the attribute selection for an event field, empty if unset.
    pub fn event_attributes_for(&self, field: &str) -> AttributeSpec {
        self.event_attributes.get(field).cloned().unwrap_or_default()
    }

    /// Checks whether the webhook has been saved.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Validation errors from the last save attempt.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Checks for validation errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Records a validation error.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    /// Runs the rules that need no registry access. Returns true when valid.
    pub fn validate(&mut self) -> bool {
        self.errors.clear();

        for (field, value) in [
            ("name", &self.name),
            ("class", &self.class),
            ("event", &self.event),
            ("url", &self.url),
        ] {
            if value.trim().is_empty() {
                self.errors.add(field, format!("{} cannot be blank.", label(field)));
            }
        }

        if !self.url.trim().is_empty() && !is_valid_url(&self.url) {
            self.errors.add("url", "URL is not a valid URL.");
        }

        self.errors.is_empty()
    }
}

/// Group used purely to organize webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookGroup {
    /// Identifier, assigned on first save.
    #[serde(default)]
    pub id: Option<u64>,
    /// Group name.
    pub name: String,
    #[serde(skip)]
    errors: ValidationErrors,
}

impl WebhookGroup {
    /// Creates an unsaved group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            errors: ValidationErrors::new(),
        }
    }

    /// Validation errors from the last save attempt.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Records a validation error.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    /// Runs the rules that need no registry access. Returns true when valid.
    pub fn validate(&mut self) -> bool {
        self.errors.clear();
        if self.name.trim().is_empty() {
            self.errors.add("name", "Name cannot be blank.");
        }
        self.errors.is_empty()
    }
}

fn label(field: &str) -> &'static str {
    match field {
        "name" => "Name",
        "class" => "Sender Class",
        "event" => "Event Name",
        "url" => "URL",
        _ => "Value",
    }
}

/// Checks for an absolute `http`/`https` URL with a host.
fn is_valid_url(url: &str) -> bool {
    let rest = match url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return false,
    };

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.rsplit('@').next().unwrap_or_default();
    !host.is_empty() && !url.chars().any(char::is_whitespace)
}
