//! Typed feed persistence over the [`Store`] collaborator.

use std::sync::Arc;

use tracing::warn;

use crate::feed::types::{Item, ItemEntry, Source};
use crate::store::{keys, Store};
use crate::Result;

/// Repository for items, entries, latest lists, subscribers and unread sets.
#[derive(Clone)]
pub struct FeedRepository {
    store: Arc<dyn Store>,
}

impl FeedRepository {
    /// Create a repository over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Store an item's content.
    pub async fn set_item(&self, item: &Item) -> Result<()> {
        let value = serde_json::to_string(item)?;
        self.store.put(&keys::item_key(&item.item_id), &value).await
    }

    /// Get an item's content.
    pub async fn get_item(&self, item_id: &str) -> Result<Option<Item>> {
        match self.store.get(&keys::item_key(item_id)).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Store an item entry under its source.
    pub async fn put_entry(&self, source_id: &str, entry: &ItemEntry) -> Result<()> {
        let value = serde_json::to_string(entry)?;
        self.store
            .put(&keys::entry_key(source_id, &entry.item_id), &value)
            .await
    }

    /// Get an item entry.
    pub async fn get_entry(&self, source_id: &str, item_id: &str) -> Result<Option<ItemEntry>> {
        match self.store.get(&keys::entry_key(source_id, item_id)).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Push an item ID onto a source's capped latest-items list.
    pub async fn push_latest(&self, source_id: &str, item_id: &str, capacity: usize) -> Result<()> {
        self.store
            .push_capped(&keys::latest_key(source_id), item_id, capacity)
            .await
    }

    /// Latest item IDs of a source, most recent first.
    pub async fn latest(&self, source_id: &str) -> Result<Vec<String>> {
        self.store.get_list(&keys::latest_key(source_id)).await
    }

    /// Current subscribers of a source.
    pub async fn subscribers(&self, source_id: &str) -> Result<Vec<String>> {
        self.store.get_list(&keys::subscriber_key(source_id)).await
    }

    /// Add a subscriber unless already listed. Returns whether it was added.
    pub async fn add_subscriber(&self, source_id: &str, user: &str) -> Result<bool> {
        let key = keys::subscriber_key(source_id);
        if self.store.get_list(&key).await?.iter().any(|u| u == user) {
            return Ok(false);
        }
        self.store.append_to_list(&key, user).await?;
        Ok(true)
    }

    /// Record a subscription in the user's list. Returns whether it was new.
    pub async fn add_subscription(&self, user: &str, source: &Source) -> Result<bool> {
        let value = serde_json::to_string(source)?;
        self.store
            .add_to_set(&keys::user_subscriptions_key(user), &value)
            .await
    }

    /// Sources a user is subscribed to, ordered by title.
    pub async fn subscriptions(&self, user: &str) -> Result<Vec<Source>> {
        let members = self
            .store
            .set_members(&keys::user_subscriptions_key(user))
            .await?;
        let mut sources = Vec::with_capacity(members.len());
        for member in members {
            match serde_json::from_str::<Source>(&member) {
                Ok(source) => sources.push(source),
                Err(e) => warn!(user = %user, "Skipping malformed subscription: {}", e),
            }
        }
        sources.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.url.cmp(&b.url)));
        Ok(sources)
    }

    /// Remove every subscription of a user to a source. Returns whether any
    /// was removed.
    pub async fn remove_subscription(&self, user: &str, source_id: &str) -> Result<bool> {
        let key = keys::user_subscriptions_key(user);
        let mut removed = false;
        for member in self.store.set_members(&key).await? {
            let matches = serde_json::from_str::<Source>(&member)
                .map(|source| source.source_id == source_id)
                .unwrap_or(false);
            if matches {
                removed |= self.store.remove_from_set(&key, &member).await?;
            }
        }
        Ok(removed)
    }

    /// Mark an item unread for a user.
    pub async fn add_unread(&self, user: &str, source_id: &str, item_id: &str) -> Result<bool> {
        self.store
            .add_to_set(&keys::unread_key(user, source_id), item_id)
            .await
    }

    /// Mark an item read for a user.
    pub async fn remove_unread(&self, user: &str, source_id: &str, item_id: &str) -> Result<bool> {
        self.store
            .remove_from_set(&keys::unread_key(user, source_id), item_id)
            .await
    }

    /// Whether an item is unread for a user.
    pub async fn is_unread(&self, user: &str, source_id: &str, item_id: &str) -> Result<bool> {
        self.store
            .set_contains(&keys::unread_key(user, source_id), item_id)
            .await
    }

    /// Unread item IDs of a user for one source.
    pub async fn unread(&self, user: &str, source_id: &str) -> Result<Vec<String>> {
        self.store
            .set_members(&keys::unread_key(user, source_id))
            .await
    }
}
