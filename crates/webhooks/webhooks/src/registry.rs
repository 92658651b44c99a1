//! Webhook registry: persistence boundary for webhooks and groups.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::error::{WebhookError, WebhookResult};
use crate::webhook::{Webhook, WebhookGroup};

/// Trait for webhook registry backends.
///
/// `save_*` methods return `Ok(false)` with errors attached to the entity on
/// validation failure; `Err` is reserved for storage failures.
#[async_trait]
pub trait WebhookRegistry: Send + Sync {
    // ==================== Webhook Operations ====================

    /// Lists every webhook with `enabled = true`.
    async fn list_enabled(&self) -> WebhookResult<Vec<Webhook>>;

    /// Lists every webhook.
    async fn list_all(&self) -> WebhookResult<Vec<Webhook>>;

    /// Lists webhooks in a group; `None` lists ungrouped webhooks.
    async fn list_by_group(&self, group_id: Option<u64>) -> WebhookResult<Vec<Webhook>>;

    /// Gets a webhook by id, failing with [`WebhookError::NotFound`].
    async fn get_by_id(&self, id: u64) -> WebhookResult<Webhook>;

    /// Validates and persists a webhook, assigning its id on first save.
    async fn save(&self, webhook: &mut Webhook) -> WebhookResult<bool>;

    /// Deletes a webhook. Deleting a missing id is not an error.
    async fn delete_by_id(&self, id: u64) -> WebhookResult<()>;

    // ==================== Group Operations ====================

    /// Lists all groups ordered by name.
    async fn list_groups(&self) -> WebhookResult<Vec<WebhookGroup>>;

    /// Gets a group by id, failing with [`WebhookError::GroupNotFound`].
    async fn get_group_by_id(&self, id: u64) -> WebhookResult<WebhookGroup>;

    /// Validates and persists a group.
    async fn save_group(&self, group: &mut WebhookGroup) -> WebhookResult<bool>;

    /// Deletes a group; its webhooks become ungrouped.
    async fn delete_group_by_id(&self, id: u64) -> WebhookResult<()>;
}

#[derive(Default)]
struct RegistryState {
    webhooks: BTreeMap<u64, Webhook>,
    groups: BTreeMap<u64, WebhookGroup>,
}

/// In-memory webhook registry.
///
/// Ids come from a monotonic sequence; writes are last-write-wins.
pub struct InMemoryWebhookRegistry {
    state: RwLock<RegistryState>,
    next_webhook_id: AtomicU64,
    next_group_id: AtomicU64,
}

impl InMemoryWebhookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            next_webhook_id: AtomicU64::new(1),
            next_group_id: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryWebhookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookRegistry for InMemoryWebhookRegistry {
    async fn list_enabled(&self) -> WebhookResult<Vec<Webhook>> {
        let state = self.state.read().await;
        Ok(state.webhooks.values().filter(|w| w.enabled).cloned().collect())
    }

    async fn list_all(&self) -> WebhookResult<Vec<Webhook>> {
        let state = self.state.read().await;
        Ok(state.webhooks.values().cloned().collect())
    }

    async fn list_by_group(&self, group_id: Option<u64>) -> WebhookResult<Vec<Webhook>> {
        let state = self.state.read().await;
        Ok(state
            .webhooks
            .values()
            .filter(|w| w.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: u64) -> WebhookResult<Webhook> {
        let state = self.state.read().await;
        state
            .webhooks
            .get(&id)
            .cloned()
            .ok_or(WebhookError::NotFound(id))
    }

    async fn save(&self, webhook: &mut Webhook) -> WebhookResult<bool> {
        let mut state = self.state.write().await;

        let mut valid = webhook.validate();
        if let Some(group_id) = webhook.group_id {
            if !state.groups.contains_key(&group_id) {
                webhook.add_error("groupId", format!("No group exists with the ID \"{}\".", group_id));
                valid = false;
            }
        }
        if let Some(id) = webhook.id {
            if !state.webhooks.contains_key(&id) {
                return Err(WebhookError::NotFound(id));
            }
        }
        if !valid {
            tracing::debug!("Webhook '{}' failed validation", webhook.name);
            return Ok(false);
        }

        let now = Utc::now();
        let id = match webhook.id {
            Some(id) => id,
            None => {
                let id = self.next_webhook_id.fetch_add(1, Ordering::Relaxed);
                webhook.id = Some(id);
                webhook.date_created = Some(now);
                id
            }
        };
        webhook.date_updated = Some(now);

        state.webhooks.insert(id, webhook.clone());
        tracing::info!("Saved webhook {} ('{}')", id, webhook.name);
        Ok(true)
    }

    async fn delete_by_id(&self, id: u64) -> WebhookResult<()> {
        let mut state = self.state.write().await;
        if state.webhooks.remove(&id).is_some() {
            tracing::info!("Deleted webhook {}", id);
        }
        Ok(())
    }

    async fn list_groups(&self) -> WebhookResult<Vec<WebhookGroup>> {
        let state = self.state.read().await;
        let mut groups: Vec<_> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn get_group_by_id(&self, id: u64) -> WebhookResult<WebhookGroup> {
        let state = self.state.read().await;
        state
            .groups
            .get(&id)
            .cloned()
            .ok_or(WebhookError::GroupNotFound(id))
    }

    async fn save_group(&self, group: &mut WebhookGroup) -> WebhookResult<bool> {
        let mut state = self.state.write().await;

        let mut valid = group.validate();
        let taken = state
            .groups
            .values()
            .any(|g| g.name == group.name && g.id != group.id);
        if taken {
            group.add_error("name", format!("Name \"{}\" has already been taken.", group.name));
            valid = false;
        }
        if !valid {
            return Ok(false);
        }

        let id = match group.id {
            Some(id) => id,
            None => {
                let id = self.next_group_id.fetch_add(1, Ordering::Relaxed);
                group.id = Some(id);
                id
            }
        };

        state.groups.insert(id, group.clone());
        Ok(true)
    }

    async fn delete_group_by_id(&self, id: u64) -> WebhookResult<()> {
        let mut state = self.state.write().await;
        if state.groups.remove(&id).is_none() {
            return Ok(());
        }

        let mut ungrouped = 0;
        for webhook in state.webhooks.values_mut() {
            if webhook.group_id == Some(id) {
                webhook.group_id = None;
                ungrouped += 1;
            }
        }
        tracing::info!("Deleted webhook group {} ({} webhook(s) ungrouped)", id, ungrouped);
        Ok(())
    }
}
