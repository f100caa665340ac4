//! Source registry and pollers.
//!
//! The registry maps feed URLs to sources. The first caller asking for an
//! unknown URL starts establishing it; concurrent callers for the same URL
//! share that single in-flight attempt instead of fetching again. Once a
//! source is established a polling task owns its [`ItemHandler`] and
//! refetches the feed on the interval the feed asks for.
//!
//! Every spawned task is tracked so [`FeedRegistry::shutdown`] can stop
//! pollers between polls and wait for them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::FeederConfig;
use crate::error::{ReadkeyError, Result};
use crate::feed::fetcher::FeedFetcher;
use crate::feed::handler::{HandlerSettings, ItemHandler};
use crate::feed::identity;
use crate::feed::recovery::RecoveryLog;
use crate::feed::repository::FeedRepository;
use crate::feed::types::{FetchedFeed, Source};
use crate::keyword::Enricher;
use crate::store::Store;

/// Outcome of an establishing attempt, shared by every waiting caller.
type Establishing = Shared<BoxFuture<'static, std::result::Result<Source, String>>>;

enum SourceSlot {
    Establishing(Establishing),
    Active(Source),
}

struct Inner {
    fetcher: Arc<dyn FeedFetcher>,
    repo: FeedRepository,
    recovery: RecoveryLog,
    enricher: Enricher,
    config: FeederConfig,
    sources: Mutex<HashMap<String, SourceSlot>>,
    tasks: StdMutex<JoinSet<()>>,
    shutdown: watch::Sender<bool>,
}

/// Registry of feed sources and their polling tasks.
#[derive(Clone)]
pub struct FeedRegistry {
    inner: Arc<Inner>,
}

impl FeedRegistry {
    /// Create a registry.
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        store: Arc<dyn Store>,
        enricher: Enricher,
        config: FeederConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                fetcher,
                repo: FeedRepository::new(store.clone()),
                recovery: RecoveryLog::new(store),
                enricher,
                config,
                sources: Mutex::new(HashMap::new()),
                tasks: StdMutex::new(JoinSet::new()),
                shutdown,
            }),
        }
    }

    /// Repository over the registry's store.
    pub fn repository(&self) -> &FeedRepository {
        &self.inner.repo
    }

    /// Get the source for a feed URL, establishing it if needed.
    ///
    /// Concurrent calls for the same unknown URL wait on one establishing
    /// fetch and all receive the same source. A failed attempt leaves no
    /// record behind, so a later call tries again.
    pub async fn get_feed_source(&self, url: &str) -> Result<Source> {
        if self.is_shutting_down() {
            return Err(ReadkeyError::Shutdown);
        }

        let pending = {
            let mut sources = self.inner.sources.lock().await;
            match sources.get(url) {
                Some(SourceSlot::Active(source)) => return Ok(source.clone()),
                Some(SourceSlot::Establishing(pending)) => {
                    debug!(url = %url, "Joining in-flight establishing");
                    pending.clone()
                }
                None => {
                    let pending = self.start_establishing(url);
                    sources.insert(url.to_string(), SourceSlot::Establishing(pending.clone()));
                    pending
                }
            }
        };

        pending.await.map_err(ReadkeyError::Fetch)
    }

    /// Resume polling every source in the recovery log.
    ///
    /// Recovered pollers start with a regular fetch; no establishing fetch
    /// is made. Returns the number of sources resumed.
    pub async fn recover(&self) -> Result<usize> {
        if self.is_shutting_down() {
            return Err(ReadkeyError::Shutdown);
        }

        let recorded = self.inner.recovery.load().await?;
        let mut resumed = 0;
        let mut sources = self.inner.sources.lock().await;
        for source in recorded {
            if sources.contains_key(&source.url) {
                continue;
            }
            sources.insert(source.url.clone(), SourceSlot::Active(source.clone()));
            self.spawn_poller(source, None);
            resumed += 1;
        }

        info!(resumed, "Recovered listening sources");
        Ok(resumed)
    }

    /// Sources currently being polled.
    pub async fn active_sources(&self) -> Vec<Source> {
        let sources = self.inner.sources.lock().await;
        let mut active: Vec<Source> = sources
            .values()
            .filter_map(|slot| match slot {
                SourceSlot::Active(source) => Some(source.clone()),
                SourceSlot::Establishing(_) => None,
            })
            .collect();
        active.sort_by(|a, b| a.url.cmp(&b.url));
        active
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Stop all pollers and wait for outstanding tasks.
    ///
    /// Pollers finish the batch they are handling and exit at their next
    /// pause.
    pub async fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        info!("Shutting down feed registry");

        let mut tasks = {
            let mut guard = match self.inner.tasks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Feed task failed: {}", e);
            }
        }
        info!("Feed registry stopped");
    }

    fn start_establishing(&self, url: &str) -> Establishing {
        let (tx, rx) = oneshot::channel();
        let registry = self.clone();
        let task_url = url.to_string();
        self.spawn_tracked(async move {
            let result = registry
                .establish(&task_url)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(result);
        });

        async move {
            rx.await
                .unwrap_or_else(|_| Err("establishing task ended without a result".to_string()))
        }
        .boxed()
        .shared()
    }

    async fn establish(&self, url: &str) -> Result<Source> {
        info!(url = %url, "Establishing feed source");

        let fetched = match self.inner.fetcher.fetch(url, true).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(url = %url, "Failed to establish feed source: {}", e);
                self.inner.sources.lock().await.remove(url);
                return Err(e);
            }
        };

        let source = Source {
            source_id: identity::source_id(url, &fetched.channel),
            title: fetched.channel.title.clone(),
            url: url.to_string(),
        };

        if let Err(e) = self.inner.recovery.record(&source).await {
            error!(url = %url, source_id = %source.source_id, "Failed to record listening source: {}", e);
        }

        self.inner
            .sources
            .lock()
            .await
            .insert(url.to_string(), SourceSlot::Active(source.clone()));
        info!(url = %url, source_id = %source.source_id, title = %source.title, "Feed source established");

        self.spawn_poller(source.clone(), Some(fetched));
        Ok(source)
    }

    fn spawn_poller(&self, source: Source, initial: Option<FetchedFeed>) {
        let registry = self.clone();
        self.spawn_tracked(async move { registry.poll(source, initial).await });
    }

    fn spawn_tracked<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut tasks = match self.inner.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Reap finished tasks so the set only holds live ones
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!("Feed task failed: {}", e);
            }
        }
        tasks.spawn(task);
    }

    /// Poll a source until it fails too often or shutdown is requested.
    async fn poll(self, source: Source, initial: Option<FetchedFeed>) {
        let config = &self.inner.config;
        let mut shutdown = self.inner.shutdown.subscribe();
        let mut handler = ItemHandler::new(
            source.clone(),
            self.inner.repo.clone(),
            self.inner.enricher.clone(),
            HandlerSettings::from(config),
        );
        let mut pending = initial;
        let mut failures = 0u32;

        info!(url = %source.url, source_id = %source.source_id, "Polling started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = match pending.take() {
                Some(batch) => batch,
                None => match self.inner.fetcher.fetch(&source.url, false).await {
                    Ok(batch) => {
                        failures = 0;
                        batch
                    }
                    Err(e) => {
                        failures += 1;
                        if failures >= config.max_poll_failures {
                            error!(
                                url = %source.url,
                                source_id = %source.source_id,
                                failures,
                                "Polling stopped: {}", e
                            );
                            self.deactivate(&source).await;
                            return;
                        }
                        warn!(url = %source.url, failures, "Poll failed, retrying: {}", e);
                        if !pause(&mut shutdown, config.default_refresh()).await {
                            break;
                        }
                        continue;
                    }
                },
            };

            let report = handler.process(&batch).await;
            debug!(
                url = %source.url,
                received = report.received,
                new = report.new_items.len(),
                duplicates = report.duplicates,
                "Batch processed"
            );

            if !pause(&mut shutdown, config.refresh_interval(batch.refresh_secs)).await {
                break;
            }
        }

        info!(url = %source.url, source_id = %source.source_id, "Polling stopped for shutdown");
    }

    /// Forget a terminated source so the next request re-establishes it.
    ///
    /// The recovery log keeps the source.
    async fn deactivate(&self, source: &Source) {
        let mut sources = self.inner.sources.lock().await;
        if matches!(
            sources.get(&source.url),
            Some(SourceSlot::Active(active)) if active.source_id == source.source_id
        ) {
            sources.remove(&source.url);
        }
    }
}

/// Sleep for `delay`. Returns false if shutdown was requested instead.
async fn pause(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.changed() => false,
    }
}
