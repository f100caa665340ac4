//! Shared helpers for ReadKey integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use readkey::config::FeederConfig;
use readkey::keyword::KeywordExtractor;
use readkey::store::MemoryStore;
use readkey::{Channel, Enricher, FeedFetcher, FeedRegistry, FetchedFeed, ParsedItem, ReadkeyError};

/// One scripted fetch outcome.
#[derive(Clone)]
pub enum Response {
    Feed(FetchedFeed),
    Fail,
}

/// Fetcher serving scripted responses per URL.
///
/// Responses are consumed in order; the last one repeats.
#[derive(Default)]
pub struct MockFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Response>>>,
    calls: Mutex<Vec<(String, bool)>>,
    fetches: AtomicUsize,
    delay: Duration,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Replace the responses for a URL.
    pub fn script(&self, url: &str, responses: Vec<Response>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Every fetch made so far as `(url, bypass_cache)`.
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for MockFetcher {
    async fn fetch(&self, url: &str, bypass_cache: bool) -> readkey::Result<FetchedFeed> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), bypass_cache));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let response = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(Response::Feed(feed)) => Ok(feed),
            Some(Response::Fail) => Err(ReadkeyError::Fetch(format!("scripted failure for {url}"))),
            None => Err(ReadkeyError::Fetch(format!("no feed at {url}"))),
        }
    }
}

/// Extractor that never produces keywords and counts its calls.
#[derive(Default)]
pub struct FailingExtractor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl KeywordExtractor for FailingExtractor {
    async fn extract(&self, _: &str, _: Option<&str>, _: u32) -> Option<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        None
    }
}

/// Extractor that never answers.
pub struct HangingExtractor;

#[async_trait]
impl KeywordExtractor for HangingExtractor {
    async fn extract(&self, _: &str, _: Option<&str>, _: u32) -> Option<Vec<String>> {
        std::future::pending::<()>().await;
        None
    }
}

/// Extractor returning the same keywords for everything.
pub struct StaticExtractor(pub Vec<String>);

#[async_trait]
impl KeywordExtractor for StaticExtractor {
    async fn extract(&self, _: &str, _: Option<&str>, _: u32) -> Option<Vec<String>> {
        Some(self.0.clone())
    }
}

/// Feeder settings that keep pollers idle after their first batch.
pub fn test_config() -> FeederConfig {
    FeederConfig {
        default_refresh_secs: 3600,
        min_refresh_secs: 0,
        ..FeederConfig::default()
    }
}

pub fn static_enricher() -> Enricher {
    Enricher::new(
        Arc::new(StaticExtractor(vec!["rust".to_string(), "feeds".to_string()])),
        3,
        Duration::from_secs(1),
    )
}

/// A feed whose items carry the given GUIDs, newest first.
pub fn feed(url: &str, title: &str, guids: &[&str]) -> FetchedFeed {
    let items = guids
        .iter()
        .map(|guid| {
            ParsedItem::new()
                .with_guid(*guid)
                .with_title(format!("Item {guid}"))
                .with_link(format!("{url}/{guid}"))
                .with_content(format!("<p>Body of {guid}</p>"))
        })
        .collect();
    FetchedFeed::new(url, Channel::new(title).with_link(format!("{url}/home"))).with_items(items)
}

pub fn registry(
    fetcher: Arc<MockFetcher>,
    store: Arc<MemoryStore>,
    config: FeederConfig,
) -> FeedRegistry {
    FeedRegistry::new(fetcher, store, static_enricher(), config)
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5 seconds"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
