//! Feed types for ReadKey.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed source being polled.
///
/// Created the first time its URL is fetched successfully and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Canonical source ID, stable across fetches of the same feed.
    #[serde(rename = "id")]
    pub source_id: String,
    /// Channel title at establishment time.
    pub title: String,
    /// Feed URL as requested.
    pub url: String,
}

/// The durable content of one feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item ID, the join key between items, entries and unread sets.
    #[serde(rename = "id")]
    pub item_id: String,
    /// Link to the original article (empty if the entry has none).
    pub link: String,
    /// Raw content of the entry.
    pub content: String,
}

/// Lightweight per-item metadata stored under its source.
///
/// Keywords arrive later than the content, so this is written once the
/// enrichment task finishes or times out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    /// Item ID.
    #[serde(rename = "id")]
    pub item_id: String,
    /// Entry title.
    pub title: String,
    /// Extracted keywords, empty when enrichment produced nothing.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Publication date reported by the feed.
    #[serde(rename = "pubDate", default)]
    pub pub_date: Option<DateTime<Utc>>,
}

/// Channel metadata of a fetched feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    /// Canonical channel identifier (Atom `<id>`), if any.
    pub id: Option<String>,
    /// Primary link of the channel.
    pub link: Option<String>,
    /// Channel title.
    pub title: String,
    /// Language of the channel content.
    pub language: Option<String>,
}

impl Channel {
    /// Create channel metadata with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the channel identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the primary link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// One entry of a fetched feed document.
///
/// Atom and RSS carry different identifiers, so both are kept and the
/// identity strategies decide which one to use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedItem {
    /// Native identifier (Atom `<id>`).
    pub native_id: Option<String>,
    /// RSS `<guid>`.
    pub guid: Option<String>,
    /// Entry title.
    pub title: Option<String>,
    /// Link to the original article.
    pub link: Option<String>,
    /// Entry content, full body preferred over summary.
    pub content: Option<String>,
    /// Language of the entry content.
    pub language: Option<String>,
    /// When the entry was published.
    pub published_at: Option<DateTime<Utc>>,
}

impl ParsedItem {
    /// Create an empty item.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the native identifier.
    pub fn with_native_id(mut self, id: impl Into<String>) -> Self {
        self.native_id = Some(id.into());
        self
    }

    /// Set the RSS guid.
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the published date.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// Result of one fetch: channel metadata plus the items in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFeed {
    /// URL the document was fetched from.
    pub url: String,
    /// Channel metadata.
    pub channel: Channel,
    /// Items as returned; not necessarily new.
    pub items: Vec<ParsedItem>,
    /// Server-hinted delay before the next fetch, in seconds.
    pub refresh_secs: Option<u64>,
}

impl FetchedFeed {
    /// Create a fetched feed without items.
    pub fn new(url: impl Into<String>, channel: Channel) -> Self {
        Self {
            url: url.into(),
            channel,
            items: Vec::new(),
            refresh_secs: None,
        }
    }

    /// Set the items.
    pub fn with_items(mut self, items: Vec<ParsedItem>) -> Self {
        self.items = items;
        self
    }

    /// Set the refresh hint.
    pub fn with_refresh_secs(mut self, secs: u64) -> Self {
        self.refresh_secs = Some(secs);
        self
    }
}
