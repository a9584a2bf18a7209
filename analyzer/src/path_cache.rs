use chrono::{DateTime, Utc};
use hoppipolla_core::cache::BoundedCache;
use hoppipolla_core::metrics::CacheMetrics;
use hoppipolla_core::model::{IsdAsn, ResolvedPath};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::debug;

pub type CachedPaths = Arc<Vec<ResolvedPath>>;

struct CacheState {
    entries: BoundedCache<IsdAsn, CachedPaths>,
    /// Bumped by every purge.
    generation: u64,
    /// Eviction timer of each cached destination.
    timers: HashMap<IsdAsn, AbortHandle>,
}

impl CacheState {
    fn cancel_timer(&mut self, dst: &IsdAsn) {
        if let Some(timer) = self.timers.remove(dst) {
            timer.abort();
        }
    }
}

/// Resolved paths keyed by destination.
///
/// Entries leave the cache when their one-shot eviction timer fires, when they are
/// the least recently used entry of a full cache, or on purge. A lookup past an
/// entry's expiry is a miss even if its timer has not fired yet.
pub struct PathCache {
    state: Arc<Mutex<CacheState>>,
    metrics: CacheMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Stored,
    /// The validity window had already closed.
    Expired,
    /// A purge happened after the result was requested from upstream.
    Superseded,
}

impl PathCache {
    pub fn new(max_entries: usize, metrics: CacheMetrics) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: BoundedCache::with_capacity(max_entries),
                generation: 0,
                timers: HashMap::new(),
            })),
            metrics,
        }
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub async fn get(&self, dst: &IsdAsn) -> Option<CachedPaths> {
        let hit = self.state.lock().await.entries.get(dst, Instant::now());
        self.metrics.record_lookup(hit.is_some());
        hit
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stores `paths` until `expiry`, provided no purge happened since `generation`
    /// was read.
    pub async fn insert(
        &self,
        dst: IsdAsn,
        paths: CachedPaths,
        expiry: DateTime<Utc>,
        generation: u64,
    ) -> InsertOutcome {
        let remaining = match (expiry - Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => return InsertOutcome::Expired,
        };

        let mut state = self.state.lock().await;
        if state.generation != generation {
            return InsertOutcome::Superseded;
        }

        let deadline = Instant::now() + remaining;
        let (stamp, evicted) = state.entries.insert(dst, paths, Some(deadline));
        state.cancel_timer(&dst);
        for key in evicted {
            state.cancel_timer(&key);
            debug!("Evicted least recently used paths to {}", key);
            self.metrics.record_eviction();
        }

        let weak: Weak<Mutex<CacheState>> = Arc::downgrade(&self.state);
        let metrics = self.metrics.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = state.lock().await;
            if state.entries.remove_if_stamp(&dst, stamp) {
                state.timers.remove(&dst);
                debug!("Paths to {} expired", dst);
                metrics.record_eviction();
            }
        });
        state.timers.insert(dst, timer.abort_handle());

        InsertOutcome::Stored
    }

    pub async fn purge(&self) {
        let mut state = self.state.lock().await;
        state.generation = state.generation.wrapping_add(1);
        state.entries.purge();
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}
