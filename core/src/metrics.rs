use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_LATENCY_HISTORY: usize = 1024;

#[derive(Debug, Clone, Default)]
struct CacheCounters {
    lookups: u64,
    hits: u64,
    upstream_round_trips: u64,
    evictions: u64,
    refreshes: u64,
    refresh_failures: u64,
    miss_latencies: VecDeque<u64>, // microseconds
}

/// Counters shared by a cache and everything that reports into it.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    state: Arc<Mutex<CacheCounters>>,
    max_history: usize,
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_HISTORY)
    }
}

impl CacheMetrics {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheCounters::default())),
            max_history,
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheCounters> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_lookup(&self, is_hit: bool) {
        let mut state = self.state();
        state.lookups += 1;
        if is_hit {
            state.hits += 1;
        }
    }

    pub fn record_round_trip(&self, latency_us: u64) {
        let mut state = self.state();
        state.upstream_round_trips += 1;
        state.miss_latencies.push_back(latency_us);
        if state.miss_latencies.len() > self.max_history {
            state.miss_latencies.pop_front();
        }
    }

    pub fn record_eviction(&self) {
        self.state().evictions += 1;
    }

    pub fn record_refresh(&self, succeeded: bool) {
        let mut state = self.state();
        state.refreshes += 1;
        if !succeeded {
            state.refresh_failures += 1;
        }
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        let state = self.state();

        let mut sorted_latencies: Vec<u64> = state.miss_latencies.iter().copied().collect();
        sorted_latencies.sort_unstable();

        let hit_rate = if state.lookups > 0 {
            state.hits as f32 / state.lookups as f32
        } else {
            0.0
        };

        CacheMetricsSnapshot {
            lookups: state.lookups,
            hits: state.hits,
            misses: state.lookups - state.hits,
            hit_rate,
            upstream_round_trips: state.upstream_round_trips,
            evictions: state.evictions,
            refreshes: state.refreshes,
            refresh_failures: state.refresh_failures,
            p50_miss_us: percentile(&sorted_latencies, 50.0),
            p95_miss_us: percentile(&sorted_latencies, 95.0),
            p99_miss_us: percentile(&sorted_latencies, 99.0),
        }
    }
}

fn percentile(sorted: &[u64], p: f32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f32)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheMetricsSnapshot {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f32,
    pub upstream_round_trips: u64,
    pub evictions: u64,
    pub refreshes: u64,
    pub refresh_failures: u64,
    pub p50_miss_us: u64,
    pub p95_miss_us: u64,
    pub p99_miss_us: u64,
}
