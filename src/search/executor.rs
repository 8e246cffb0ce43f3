//! Search execution and orchestration

use super::debounce::Debouncer;
use super::models::{Dispatch, SearchState};
use crate::cache::{query_cache_key, ResultCache};
use crate::config::{SearchSettings, Settings};
use crate::embedding::Embedder;
use crate::metrics::Metrics;
use crate::query::{SearchFilters, SearchQuery};
use crate::results::{
    clamp_similarity, LexicalHit, ResultGroups, SearchSourceError, SemanticHit, SourceKind,
    SourceState,
};
use crate::sources::{LexicalSource, SemanticSource};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Coordinates lexical and semantic search for a live query.
///
/// Must be created and driven from within a Tokio runtime.
pub struct Search {
    shared: Arc<Shared>,
    debouncer: Debouncer,
}

struct Shared {
    lexical: Arc<dyn LexicalSource>,
    semantic: Arc<dyn SemanticSource>,
    embedder: Arc<dyn Embedder>,
    settings: SearchSettings,
    state: watch::Sender<SearchState>,
    lexical_cache: Option<ResultCache<Vec<LexicalHit>>>,
    semantic_cache: Option<ResultCache<Vec<SemanticHit>>>,
    metrics: Metrics,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Search {
    /// Create a new search orchestrator
    pub fn new(
        lexical: Arc<dyn LexicalSource>,
        semantic: Arc<dyn SemanticSource>,
        embedder: Arc<dyn Embedder>,
        settings: &Settings,
    ) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        let cache = &settings.cache;
        let (lexical_cache, semantic_cache) = if cache.enabled {
            (
                Some(ResultCache::new(cache.ttl_seconds, cache.max_capacity)),
                Some(ResultCache::new(cache.ttl_seconds, cache.max_capacity)),
            )
        } else {
            (None, None)
        };

        Self {
            shared: Arc::new(Shared {
                lexical,
                semantic,
                embedder,
                settings: settings.search.clone(),
                state,
                lexical_cache,
                semantic_cache,
                metrics: Metrics::new(),
                tasks: Mutex::new(Vec::new()),
            }),
            debouncer: Debouncer::new(settings.search.debounce()),
        }
    }

    /// Feed the current search-box contents.
    ///
    /// Non-empty input is committed once the debounce window passes with no
    /// further calls. Blank input cancels any pending commit and resets the
    /// state immediately without dispatching anything.
    pub fn dispatch_query(&self, raw: &str, filters: SearchFilters) -> Dispatch {
        let query = SearchQuery::new(raw, filters);
        if query.is_empty() {
            self.debouncer.cancel();
            return self.shared.commit(query);
        }

        let shared = self.shared.clone();
        self.debouncer.schedule(async move {
            shared.commit(query);
        });
        Dispatch::Scheduled
    }

    /// Commit a query immediately, bypassing the debounce window
    pub fn commit(&self, query: SearchQuery) -> Dispatch {
        self.debouncer.cancel();
        self.shared.commit(query)
    }

    /// Watch the raw orchestrator state
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.shared.state.subscribe()
    }

    /// Invoke `callback` with the grouped results after every state change.
    ///
    /// The callback runs on a background task until the returned handle is
    /// dropped. Rapid changes may be coalesced.
    pub fn on_results_changed<F>(&self, callback: F) -> ResultsSubscription
    where
        F: Fn(&ResultGroups) + Send + Sync + 'static,
    {
        let mut rx = self.shared.state.subscribe();
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let groups = ResultGroups::from_state(&rx.borrow_and_update());
                callback(&groups);
            }
        });
        ResultsSubscription { handle }
    }

    /// Grouped view of the current state
    pub fn results(&self) -> ResultGroups {
        ResultGroups::from_state(&self.shared.state.borrow())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SearchState {
        self.shared.state.borrow().clone()
    }

    /// Wait for any debounced commit to fire and for both sources to
    /// settle, then return the grouped view
    pub async fn settled(&self) -> ResultGroups {
        self.debouncer.idle().await;
        let mut rx = self.shared.state.subscribe();
        let groups = match rx.wait_for(SearchState::is_settled).await {
            Ok(state) => ResultGroups::from_state(&state),
            Err(_) => self.results(),
        };
        groups
    }

    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    /// Whether a debounced commit is waiting
    pub fn has_pending_input(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Cancel the pending commit and abandon in-flight source calls.
    ///
    /// Sources still pending are reset to idle so waiters wake up.
    pub fn shutdown(&self) {
        self.debouncer.cancel();
        self.shared.abort_tasks();
        self.shared.state.send_modify(|state| {
            state.generation += 1;
            if state.lexical.is_pending() {
                state.lexical = SourceState::Idle;
            }
            if state.semantic.is_pending() {
                state.semantic = SourceState::Idle;
            }
        });
        info!("Search orchestrator shut down");
    }
}

impl Drop for Search {
    fn drop(&mut self) {
        self.shared.abort_tasks();
    }
}

/// Keeps an [`on_results_changed`](Search::on_results_changed) callback alive
pub struct ResultsSubscription {
    handle: JoinHandle<()>,
}

impl ResultsSubscription {
    /// Stop invoking the callback
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ResultsSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Shared {
    fn commit(self: &Arc<Self>, query: SearchQuery) -> Dispatch {
        if query.is_empty() {
            self.state.send_modify(|state| {
                state.generation += 1;
                state.query = query;
                state.lexical = SourceState::Idle;
                state.semantic = SourceState::Idle;
            });
            debug!("Empty query, nothing dispatched");
            return Dispatch::EmptyQueryNoop;
        }

        self.metrics.inc_search();
        let wants_semantic = query.semantic_eligible(self.settings.semantic_min_chars);
        let unavailable = wants_semantic && self.embedder.status().is_error();

        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            generation = state.generation;
            state.query = query.clone();
            state.lexical = SourceState::Pending;
            state.semantic = if !wants_semantic {
                SourceState::Idle
            } else if unavailable {
                SourceState::Unavailable
            } else {
                SourceState::Pending
            };
        });

        info!(
            "Committing search '{}' (generation {}, semantic: {})",
            query.text,
            generation,
            wants_semantic && !unavailable
        );

        let mut handles = Vec::with_capacity(2);
        if wants_semantic && !unavailable {
            let shared = self.clone();
            let query = query.clone();
            handles.push(tokio::spawn(async move {
                let outcome = catch_panic(shared.semantic_results(&query, generation))
                    .await
                    .unwrap_or_else(|message| Some(shared.panicked(SourceKind::Semantic, message)));
                if let Some(outcome) = outcome {
                    shared.apply(generation, SourceKind::Semantic, |state| {
                        state.semantic = outcome
                    });
                }
            }));
        }
        let shared = self.clone();
        handles.push(tokio::spawn(async move {
            let outcome = catch_panic(shared.lexical_results(&query))
                .await
                .unwrap_or_else(|message| shared.panicked(SourceKind::Lexical, message));
            shared.apply(generation, SourceKind::Lexical, |state| state.lexical = outcome);
        }));

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.extend(handles);

        Dispatch::Committed { generation }
    }

    /// Write a source outcome unless a newer query has been committed since
    fn apply(&self, generation: u64, source: SourceKind, update: impl FnOnce(&mut SearchState)) {
        let applied = self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            update(state);
            true
        });
        if !applied {
            self.metrics.record_stale(source);
            debug!("Discarded stale {} response (generation {})", source, generation);
        }
    }

    fn panicked<T>(&self, source: SourceKind, message: String) -> SourceState<T> {
        error!("{} source panicked: {}", source, message);
        self.metrics.record_error(source);
        SourceState::Failed(SearchSourceError::Backend(format!(
            "{} source panicked: {}",
            source, message
        )))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.borrow().generation == generation
    }

    async fn lexical_results(&self, query: &SearchQuery) -> SourceState<LexicalHit> {
        let key = query_cache_key(SourceKind::Lexical, query, "");
        if let Some(cache) = &self.lexical_cache {
            if let Some(hits) = cache.get(&key).await {
                self.metrics.record_cache_hit(SourceKind::Lexical);
                return SourceState::Ready(hits);
            }
        }

        self.metrics.record_dispatch(SourceKind::Lexical);
        let start = Instant::now();
        let result = timeout(self.settings.source_timeout(), self.lexical.search(query)).await;
        let elapsed = start.elapsed();

        match result {
            Ok(Ok(hits)) => {
                self.metrics
                    .record_response_time(SourceKind::Lexical, elapsed.as_millis() as u64);
                self.metrics.record_success(SourceKind::Lexical);
                debug!(
                    "Source {} returned {} results in {:?}",
                    self.lexical.name(),
                    hits.len(),
                    elapsed
                );
                if let Some(cache) = &self.lexical_cache {
                    cache.set(key, hits.clone()).await;
                }
                SourceState::Ready(hits)
            }
            Ok(Err(e)) => {
                warn!("Source {} failed: {}", self.lexical.name(), e);
                self.metrics.record_error(SourceKind::Lexical);
                SourceState::Failed(SearchSourceError::Backend(e.to_string()))
            }
            Err(_) => {
                warn!("Source {} timed out after {:?}", self.lexical.name(), elapsed);
                self.metrics.record_error(SourceKind::Lexical);
                SourceState::Failed(SearchSourceError::Timeout)
            }
        }
    }

    /// `None` when the query was superseded before the vector search ran
    async fn semantic_results(
        &self,
        query: &SearchQuery,
        generation: u64,
    ) -> Option<SourceState<SemanticHit>> {
        let threshold = self.settings.similarity_threshold;
        let max_results = self.settings.max_semantic_results;
        let key = query_cache_key(
            SourceKind::Semantic,
            query,
            &format!("{}:{}", threshold, max_results),
        );
        if let Some(cache) = &self.semantic_cache {
            if let Some(hits) = cache.get(&key).await {
                self.metrics.record_cache_hit(SourceKind::Semantic);
                return Some(SourceState::Ready(hits));
            }
        }

        let embedding = match self.embedder.embed(&query.text).await {
            Ok(embedding) => embedding,
            Err(e) if e.is_worker_failure() => {
                warn!("Semantic search unavailable: {}", e);
                return Some(SourceState::Unavailable);
            }
            Err(e) => {
                warn!("Query embedding failed: {}", e);
                self.metrics.record_error(SourceKind::Semantic);
                return Some(SourceState::Failed(SearchSourceError::Embedding(
                    e.to_string(),
                )));
            }
        };

        if !self.is_current(generation) {
            self.metrics.record_stale(SourceKind::Semantic);
            debug!("Query superseded after embedding, skipping vector search");
            return None;
        }

        let attempts = self.settings.semantic_retries + 1;
        let mut last_error = SearchSourceError::Timeout;
        for attempt in 0..attempts {
            if attempt > 0 {
                self.metrics.record_retry(SourceKind::Semantic);
                debug!("Retrying vector search (attempt {})", attempt + 1);
            }
            self.metrics.record_dispatch(SourceKind::Semantic);
            let start = Instant::now();
            let result = timeout(
                self.settings.source_timeout(),
                self.semantic.match_notes(&embedding, threshold, max_results),
            )
            .await;
            let elapsed = start.elapsed();

            match result {
                Ok(Ok(mut hits)) => {
                    self.metrics
                        .record_response_time(SourceKind::Semantic, elapsed.as_millis() as u64);
                    self.metrics.record_success(SourceKind::Semantic);
                    for hit in &mut hits {
                        hit.similarity = clamp_similarity(hit.similarity);
                    }
                    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
                    hits.truncate(max_results);
                    debug!(
                        "Source {} returned {} results in {:?}",
                        self.semantic.name(),
                        hits.len(),
                        elapsed
                    );
                    if let Some(cache) = &self.semantic_cache {
                        cache.set(key, hits.clone()).await;
                    }
                    return Some(SourceState::Ready(hits));
                }
                Ok(Err(e)) => {
                    warn!("Source {} failed: {}", self.semantic.name(), e);
                    last_error = SearchSourceError::Backend(e.to_string());
                }
                Err(_) => {
                    warn!("Source {} timed out after {:?}", self.semantic.name(), elapsed);
                    last_error = SearchSourceError::Timeout;
                }
            }
            self.metrics.record_error(SourceKind::Semantic);
        }

        Some(SourceState::Failed(last_error))
    }

    fn abort_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// Run `future` to completion, turning a panic into its message
async fn catch_panic<T>(future: impl Future<Output = T>) -> Result<T, String> {
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
