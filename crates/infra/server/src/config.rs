//! Host configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use hookbridge_events::{EventRegistry, SourceDefinition};
use hookbridge_webhooks::{
    DeliveryConfig, RedactionConfig, RetryConfig, Webhook, WebhookConfig, WorkerConfig,
};

/// Process-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Log level.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// A group created at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSeed {
    /// Group name.
    pub name: String,
}

/// A webhook created at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSeed {
    /// Display name.
    pub name: String,
    /// Name of a seeded group.
    #[serde(default)]
    pub group: Option<String>,
    /// Source type.
    pub class: String,
    /// Event name.
    pub event: String,
    /// Delivery mode.
    #[serde(rename = "type", default = "default_type")]
    pub webhook_type: String,
    /// Delivery target.
    pub url: String,
    /// Whether the webhook is bound at startup.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Attributes forwarded for the current user.
    #[serde(default)]
    pub user_attributes: Vec<String>,
    /// Attributes forwarded for the event sender, as dotted paths.
    #[serde(default)]
    pub sender_attributes: Vec<String>,
    /// Attribute selections keyed by event field name.
    #[serde(default)]
    pub event_attributes: BTreeMap<String, Vec<String>>,
}

fn default_type() -> String {
    "post".to_string()
}

fn default_enabled() -> bool {
    true
}

impl WebhookSeed {
    /// Builds an unsaved webhook in the given group.
    pub fn to_webhook(&self, group_id: Option<u64>) -> Webhook {
        let mut webhook = Webhook::new(&self.name, &self.class, &self.event, &self.url)
            .webhook_type(self.webhook_type.as_str())
            .user_attributes(self.user_attributes.clone())
            .sender_attributes(self.sender_attributes.clone());

        for (field, paths) in &self.event_attributes {
            webhook = webhook.event_attribute(field, paths.clone());
        }
        webhook.group_id = group_id;
        webhook.enabled = self.enabled;
        webhook
    }
}

/// Full configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookbridgeConfig {
    /// Process settings.
    pub server: ServerConfig,
    /// Worker pool settings.
    pub worker: WorkerConfig,
    /// HTTP delivery settings.
    pub delivery: DeliveryConfig,
    /// Retry settings.
    pub retry: RetryConfig,
    /// Redaction settings.
    pub redaction: RedactionConfig,
    /// Event sources webhooks may bind to. When empty, bindings are not
    /// checked.
    pub sources: Vec<SourceDefinition>,
    /// Groups created at startup.
    pub groups: Vec<GroupSeed>,
    /// Webhooks created at startup.
    pub webhooks: Vec<WebhookSeed>,
}

impl HookbridgeConfig {
    /// Delivery-side settings.
    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            worker: self.worker.clone(),
            delivery: self.delivery.clone(),
            retry: self.retry.clone(),
            redaction: self.redaction.clone(),
        }
    }

    /// Registers the configured sources into `registry`.
    pub fn register_sources(&self, registry: &EventRegistry) {
        for source in &self.sources {
            registry.register(source.clone());
        }
    }
}

/// Loads configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<HookbridgeConfig, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    parse_config(&content)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<HookbridgeConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    IoError(String),
    /// The file is not valid configuration.
    #[error("Parse error: {0}")]
    ParseError(String),
}
