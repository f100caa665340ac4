//! Per-source batch handler.
//!
//! One [`ItemHandler`] lives inside each polling task. For every fetched
//! batch it filters out items already seen, persists the new ones with an
//! entry that has no keywords yet, and fans their IDs out to subscribers.
//! Keyword enrichment then fills the entries in, and the whole batch is
//! awaited before returning so batches of the same source never interleave
//! their entry writes.

use futures::future::join_all;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::FeederConfig;
use crate::feed::identity;
use crate::feed::repository::FeedRepository;
use crate::feed::types::{FetchedFeed, Item, ItemEntry, ParsedItem, Source};
use crate::feed::window::RecentItems;
use crate::keyword::Enricher;

/// Title stored for entries that have none.
const UNTITLED: &str = "Untitled";

/// Tunables of an [`ItemHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerSettings {
    /// Initial capacity of the recent-items window.
    pub recent_window: usize,
    /// Length of the persisted latest-items list.
    pub latest_capacity: usize,
}

impl From<&FeederConfig> for HandlerSettings {
    fn from(config: &FeederConfig) -> Self {
        Self {
            recent_window: config.recent_window,
            latest_capacity: config.latest_capacity,
        }
    }
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self::from(&FeederConfig::default())
    }
}

/// Outcome of one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items in the batch.
    pub received: usize,
    /// IDs of the items processed as new, in document order.
    pub new_items: Vec<String>,
    /// Items skipped because they were seen recently.
    pub duplicates: usize,
    /// Items dropped for lack of any identifier.
    pub dropped: usize,
}

/// A new item with its derived ID.
struct NewItem<'a> {
    item_id: String,
    item: &'a ParsedItem,
}

impl NewItem<'_> {
    /// Entry for the item, without keywords.
    fn entry(&self) -> ItemEntry {
        ItemEntry {
            item_id: self.item_id.clone(),
            title: self
                .item
                .title
                .clone()
                .unwrap_or_else(|| UNTITLED.to_string()),
            keywords: Vec::new(),
            pub_date: self.item.published_at,
        }
    }
}

/// Handles fetched batches for a single source.
pub struct ItemHandler {
    source: Source,
    repo: FeedRepository,
    enricher: Enricher,
    window: RecentItems,
    latest_capacity: usize,
}

impl ItemHandler {
    /// Create a handler for an established source.
    pub fn new(
        source: Source,
        repo: FeedRepository,
        enricher: Enricher,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            source,
            repo,
            enricher,
            window: RecentItems::new(settings.recent_window),
            latest_capacity: settings.latest_capacity,
        }
    }

    /// The source this handler serves.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Capacity of the recent-items window.
    pub fn window_capacity(&self) -> usize {
        self.window.capacity()
    }

    /// Process one fetched batch.
    ///
    /// Storage failures are logged and skipped; nothing is rolled back.
    pub async fn process(&mut self, feed: &FetchedFeed) -> BatchReport {
        let source_id = self.source.source_id.clone();
        let mut report = BatchReport {
            received: feed.items.len(),
            ..BatchReport::default()
        };

        self.window.fit_batch(feed.items.len());

        let subscribers = match self.repo.subscribers(&source_id).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!(source_id = %source_id, "Failed to read subscribers: {}", e);
                Vec::new()
            }
        };

        let mut fresh = Vec::new();
        for item in &feed.items {
            let (Some(key), Some(item_id)) = (
                identity::dedup_key(item),
                identity::item_id(&source_id, item),
            ) else {
                warn!(source_id = %source_id, title = ?item.title, "Dropping item without identifier");
                report.dropped += 1;
                continue;
            };
            if !self.window.insert(&key) {
                report.duplicates += 1;
                continue;
            }
            fresh.push(NewItem { item_id, item });
        }
        self.window.truncate();

        if fresh.is_empty() {
            debug!(source_id = %source_id, received = report.received, "No new items");
            return report;
        }
        info!(
            source_id = %source_id,
            url = %feed.url,
            new = fresh.len(),
            "Found new item(s)"
        );

        join_all(fresh.iter().map(|new| self.deliver(new, &subscribers))).await;

        // Feeds list newest first, so push oldest first to leave the newest at the head
        for new in fresh.iter().rev() {
            if let Err(e) = self
                .repo
                .push_latest(&source_id, &new.item_id, self.latest_capacity)
                .await
            {
                error!(source_id = %source_id, item_id = %new.item_id, "Failed to update latest items: {}", e);
            }
        }

        let mut enrichment = JoinSet::new();
        for new in &fresh {
            let repo = self.repo.clone();
            let enricher = self.enricher.clone();
            let source_id = source_id.clone();
            let content = new.item.content.clone().unwrap_or_default();
            let lang = new
                .item
                .language
                .clone()
                .or_else(|| feed.channel.language.clone());
            let mut entry = new.entry();

            enrichment.spawn(async move {
                entry.keywords = enricher.keywords(&content, lang.as_deref()).await;
                if entry.keywords.is_empty() {
                    return;
                }
                if let Err(e) = repo.put_entry(&source_id, &entry).await {
                    error!(source_id = %source_id, item_id = %entry.item_id, "Failed to store item keywords: {}", e);
                }
            });
        }
        while let Some(result) = enrichment.join_next().await {
            if let Err(e) = result {
                error!(source_id = %source_id, "Enrichment task failed: {}", e);
            }
        }

        report.new_items = fresh.into_iter().map(|new| new.item_id).collect();
        report
    }

    /// Persist an item's content and keyword-less entry, and mark it
    /// unread for every subscriber.
    async fn deliver(&self, new: &NewItem<'_>, subscribers: &[String]) {
        let source_id = &self.source.source_id;
        let item = Item {
            item_id: new.item_id.clone(),
            link: new.item.link.clone().unwrap_or_default(),
            content: new.item.content.clone().unwrap_or_default(),
        };
        if let Err(e) = self.repo.set_item(&item).await {
            error!(source_id = %source_id, item_id = %item.item_id, "Failed to store item: {}", e);
        }
        if let Err(e) = self.repo.put_entry(source_id, &new.entry()).await {
            error!(source_id = %source_id, item_id = %item.item_id, "Failed to store item entry: {}", e);
        }

        for user in subscribers {
            if let Err(e) = self.repo.add_unread(user, source_id, &item.item_id).await {
                error!(
                    source_id = %source_id,
                    item_id = %item.item_id,
                    user = %user,
                    "Failed to add unread item: {}", e
                );
            }
        }
    }
}
