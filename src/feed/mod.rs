//! Feed ingestion for ReadKey.
//!
//! This module provides:
//! - Feed fetching and parsing (RSS 2.0, Atom, RDF)
//! - Item and source identity derivation
//! - The per-source recent-items window and batch handler
//! - The source registry with its polling tasks and recovery log

pub mod fetcher;
pub mod handler;
pub mod identity;
pub mod recovery;
pub mod registry;
pub mod repository;
pub mod types;
pub mod window;

pub use fetcher::{validate_url, FeedFetcher, HttpFeedFetcher};
pub use handler::{BatchReport, HandlerSettings, ItemHandler};
pub use recovery::RecoveryLog;
pub use registry::FeedRegistry;
pub use repository::FeedRepository;
pub use types::{Channel, FetchedFeed, Item, ItemEntry, ParsedItem, Source};
pub use window::RecentItems;
