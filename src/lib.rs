//! ReadKey - feed ingestion with keyword enrichment
//!
//! Polls RSS/Atom feeds, deduplicates their items, fans new items out to
//! subscribers and stores keyword-annotated entries for each item.

pub mod config;
pub mod error;
pub mod feed;
pub mod keyword;
pub mod logging;
pub mod sanitize;
pub mod store;
pub mod subscription;

pub use config::Config;
pub use error::{ReadkeyError, Result};
pub use feed::{
    BatchReport, Channel, FeedFetcher, FeedRegistry, FeedRepository, FetchedFeed, HttpFeedFetcher,
    Item, ItemEntry, ItemHandler, ParsedItem, RecoveryLog, Source,
};
pub use keyword::{Enricher, KeywordExtractor};
pub use store::{MemoryStore, Store};
pub use subscription::SubscriptionService;
