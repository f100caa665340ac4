//! User subscriptions for ReadKey.
//!
//! This module sits in front of the feed registry: subscribing resolves a
//! URL into a source (establishing it on first use) and from then on the
//! source's poller fans new item IDs out to the user's unread set.

use tracing::info;

use crate::config::FeederConfig;
use crate::feed::registry::FeedRegistry;
use crate::feed::repository::FeedRepository;
use crate::feed::types::{Item, ItemEntry, Source};
use crate::{ReadkeyError, Result};

/// Service for subscription operations.
#[derive(Clone)]
pub struct SubscriptionService {
    registry: FeedRegistry,
    repo: FeedRepository,
    initial_unread: usize,
}

impl SubscriptionService {
    /// Create a new SubscriptionService over a registry.
    pub fn new(registry: FeedRegistry, config: &FeederConfig) -> Self {
        let repo = registry.repository().clone();
        Self {
            registry,
            repo,
            initial_unread: config.initial_unread,
        }
    }

    /// Subscribe a user to the feed at `url`.
    ///
    /// The user's unread set is seeded with the source's most recent items.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The user name is empty
    /// - The feed cannot be established
    pub async fn subscribe(&self, user: &str, url: &str) -> Result<Source> {
        let user = validate_user(user)?;
        let url = url.trim();
        if url.is_empty() {
            return Err(ReadkeyError::Validation("feed URL is empty".to_string()));
        }

        let source = self.registry.get_feed_source(url).await?;

        self.repo.add_subscriber(&source.source_id, user).await?;
        if self.repo.add_subscription(user, &source).await? {
            let latest = self.repo.latest(&source.source_id).await?;
            for item_id in latest.iter().take(self.initial_unread) {
                self.repo
                    .add_unread(user, &source.source_id, item_id)
                    .await?;
            }
            info!(user = %user, source_id = %source.source_id, url = %url, "User subscribed");
        }

        Ok(source)
    }

    /// Remove a subscription from the user's list.
    ///
    /// The user stays on the source's subscriber list, so new items keep
    /// arriving in their unread set.
    pub async fn unsubscribe(&self, user: &str, source_id: &str) -> Result<()> {
        let user = validate_user(user)?;
        if !self.repo.remove_subscription(user, source_id).await? {
            return Err(ReadkeyError::NotFound("subscription".to_string()));
        }
        info!(user = %user, source_id = %source_id, "User unsubscribed");
        Ok(())
    }

    /// Sources the user is subscribed to.
    pub async fn subscriptions(&self, user: &str) -> Result<Vec<Source>> {
        self.repo.subscriptions(validate_user(user)?).await
    }

    /// Number of unread items of a source for the user.
    pub async fn unread_count(&self, user: &str, source_id: &str) -> Result<usize> {
        Ok(self.repo.unread(validate_user(user)?, source_id).await?.len())
    }

    /// Entries of a source's latest items, most recent first.
    ///
    /// Items whose entry has not been written yet are skipped.
    pub async fn entries(
        &self,
        user: &str,
        source_id: &str,
        unread_only: bool,
    ) -> Result<Vec<ItemEntry>> {
        let user = validate_user(user)?;
        let mut entries = Vec::new();
        for item_id in self.repo.latest(source_id).await? {
            if unread_only && !self.repo.is_unread(user, source_id, &item_id).await? {
                continue;
            }
            if let Some(entry) = self.repo.get_entry(source_id, &item_id).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Mark an item read or unread. Returns whether anything changed.
    pub async fn mark_item(
        &self,
        user: &str,
        source_id: &str,
        item_id: &str,
        read: bool,
    ) -> Result<bool> {
        let user = validate_user(user)?;
        if read {
            self.repo.remove_unread(user, source_id, item_id).await
        } else {
            self.repo.add_unread(user, source_id, item_id).await
        }
    }

    /// Get an item's content.
    pub async fn item(&self, item_id: &str) -> Result<Item> {
        self.repo
            .get_item(item_id)
            .await?
            .ok_or_else(|| ReadkeyError::NotFound("feed item".to_string()))
    }
}

fn validate_user(user: &str) -> Result<&str> {
    let user = user.trim();
    if user.is_empty() {
        return Err(ReadkeyError::Validation("user name is empty".to_string()));
    }
    Ok(user)
}
