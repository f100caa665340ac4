//! Recovery log of currently listening sources.
//!
//! Written once per newly established source, read once at startup so the
//! registry can resume polling without a fresh establishing fetch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::feed::types::Source;
use crate::store::{keys, Store};
use crate::Result;

/// Persisted set of sources being polled.
#[derive(Clone)]
pub struct RecoveryLog {
    store: Arc<dyn Store>,
}

impl RecoveryLog {
    /// Create a recovery log over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a source as listening. Returns whether it was newly recorded.
    pub async fn record(&self, source: &Source) -> Result<bool> {
        let value = serde_json::to_string(source)?;
        self.store.add_to_set(&keys::listening_key(), &value).await
    }

    /// Load every recorded source, one per URL.
    ///
    /// Malformed records are skipped with a warning.
    pub async fn load(&self) -> Result<Vec<Source>> {
        let members = self.store.set_members(&keys::listening_key()).await?;
        let mut by_url: HashMap<String, Source> = HashMap::new();
        for member in members {
            match serde_json::from_str::<Source>(&member) {
                Ok(source) => {
                    by_url.insert(source.url.clone(), source);
                }
                Err(e) => warn!(record = %member, "Skipping malformed listening record: {}", e),
            }
        }
        let mut sources: Vec<Source> = by_url.into_values().collect();
        sources.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn source(id: &str, url: &str) -> Source {
        Source {
            source_id: id.to_string(),
            title: format!("Feed {id}"),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_and_load() {
        let log = RecoveryLog::new(Arc::new(MemoryStore::new()));
        assert!(log.load().await.unwrap().is_empty());

        let s1 = source("s1", "https://a.example.com/rss");
        let s2 = source("s2", "https://b.example.com/rss");
        assert!(log.record(&s1).await.unwrap());
        assert!(log.record(&s2).await.unwrap());
        assert!(!log.record(&s1).await.unwrap());

        assert_eq!(log.load().await.unwrap(), vec![s1, s2]);
    }

    #[tokio::test]
    async fn test_load_skips_malformed() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_to_set(&keys::listening_key(), "{not json")
            .await
            .unwrap();
        let log = RecoveryLog::new(store);
        log.record(&source("s1", "https://a.example.com/rss"))
            .await
            .unwrap();

        let sources = log.load().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source_id, "s1");
    }
}
