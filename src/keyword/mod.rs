//! Keyword enrichment for ReadKey.
//!
//! Enrichment is best-effort: a slow or failing keyword service only means
//! entries are stored without keywords, never that ingestion stops.

pub mod extractor;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::{KeywordConfig, KeywordMode};
use crate::Result;

pub use extractor::{DisabledExtractor, HttpKeywordExtractor, KeywordExtractor, SummaryExtractor};

/// Build the extractor selected by the configuration.
pub fn extractor_from_config(config: &KeywordConfig) -> Result<Arc<dyn KeywordExtractor>> {
    Ok(match config.mode {
        KeywordMode::Service => Arc::new(HttpKeywordExtractor::new(config)?),
        KeywordMode::Summary => Arc::new(SummaryExtractor::new(config.summary_size)),
        KeywordMode::Disabled => Arc::new(DisabledExtractor),
    })
}

/// Runs an extractor with a retry budget under a hard timeout.
#[derive(Clone)]
pub struct Enricher {
    extractor: Arc<dyn KeywordExtractor>,
    retry: u32,
    timeout: Duration,
}

impl Enricher {
    /// Create an enricher.
    pub fn new(extractor: Arc<dyn KeywordExtractor>, retry: u32, timeout: Duration) -> Self {
        Self {
            extractor,
            retry,
            timeout,
        }
    }

    /// Create an enricher from the keyword configuration.
    pub fn from_config(config: &KeywordConfig) -> Result<Self> {
        Ok(Self::new(
            extractor_from_config(config)?,
            config.retry,
            config.timeout(),
        ))
    }

    /// Keywords for `content`, or an empty list if none arrive in time.
    ///
    /// A late extraction is dropped together with its in-flight request.
    pub async fn keywords(&self, content: &str, lang: Option<&str>) -> Vec<String> {
        match tokio::time::timeout(
            self.timeout,
            self.extractor.extract(content, lang, self.retry),
        )
        .await
        {
            Ok(Some(keywords)) => keywords,
            Ok(None) => Vec::new(),
            Err(_) => {
                debug!(timeout_ms = self.timeout.as_millis() as u64, "Keyword extraction timed out");
                Vec::new()
            }
        }
    }
}
