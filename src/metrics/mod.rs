//! Metrics collection module
//!
//! Tracks per-source dispatch counts, failures, discarded stale responses and
//! response times for the search orchestrator.

use crate::results::SourceKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

const RESPONSE_WINDOW: usize = 100;

/// Orchestrator metrics
pub struct Metrics {
    /// Committed non-empty queries
    pub total_searches: AtomicU64,
    sources: RwLock<HashMap<SourceKind, SourceCounters>>,
}

#[derive(Debug, Default)]
struct SourceCounters {
    dispatched: u64,
    successes: u64,
    errors: u64,
    stale: u64,
    cache_hits: u64,
    retries: u64,
    response_times: Vec<u64>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_searches: AtomicU64::new(0),
            sources: RwLock::new(HashMap::new()),
        }
    }

    fn with_source(&self, source: SourceKind, f: impl FnOnce(&mut SourceCounters)) {
        let mut sources = self.sources.write();
        f(sources.entry(source).or_default());
    }

    /// Increment total search count
    pub fn inc_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a collaborator call being issued
    pub fn record_dispatch(&self, source: SourceKind) {
        self.with_source(source, |c| c.dispatched += 1);
    }

    /// Record source response time
    pub fn record_response_time(&self, source: SourceKind, time_ms: u64) {
        self.with_source(source, |c| {
            if c.response_times.len() >= RESPONSE_WINDOW {
                c.response_times.remove(0);
            }
            c.response_times.push(time_ms);
        });
    }

    pub fn record_success(&self, source: SourceKind) {
        self.with_source(source, |c| c.successes += 1);
    }

    pub fn record_error(&self, source: SourceKind) {
        self.with_source(source, |c| c.errors += 1);
    }

    /// A response arrived for a query that was no longer current
    pub fn record_stale(&self, source: SourceKind) {
        self.with_source(source, |c| c.stale += 1);
    }

    pub fn record_cache_hit(&self, source: SourceKind) {
        self.with_source(source, |c| c.cache_hits += 1);
    }

    pub fn record_retry(&self, source: SourceKind) {
        self.with_source(source, |c| c.retries += 1);
    }

    /// Get total searches
    pub fn get_total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    /// Get average response time for a source
    pub fn get_avg_response_time(&self, source: SourceKind) -> Option<u64> {
        let sources = self.sources.read();
        sources.get(&source).and_then(|c| {
            if c.response_times.is_empty() {
                None
            } else {
                Some(c.response_times.iter().sum::<u64>() / c.response_times.len() as u64)
            }
        })
    }

    /// Get reliability percentage for a source
    pub fn get_reliability(&self, source: SourceKind) -> f64 {
        let sources = self.sources.read();
        let (ok, err) = sources
            .get(&source)
            .map(|c| (c.successes, c.errors))
            .unwrap_or((0, 0));

        let total = ok + err;
        if total == 0 {
            100.0
        } else {
            (ok as f64 / total as f64) * 100.0
        }
    }

    /// Snapshot of one source's counters
    pub fn get_source_stats(&self, source: SourceKind) -> SourceStats {
        let (dispatched, errors, stale, cache_hits, retries) = {
            let sources = self.sources.read();
            sources
                .get(&source)
                .map(|c| (c.dispatched, c.errors, c.stale, c.cache_hits, c.retries))
                .unwrap_or_default()
        };

        SourceStats {
            dispatched,
            errors,
            stale_discarded: stale,
            cache_hits,
            retries,
            avg_response_time: self.get_avg_response_time(source),
            reliability: self.get_reliability(source),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a single source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStats {
    pub dispatched: u64,
    pub errors: u64,
    pub stale_discarded: u64,
    pub cache_hits: u64,
    pub retries: u64,
    pub avg_response_time: Option<u64>,
    pub reliability: f64,
}
