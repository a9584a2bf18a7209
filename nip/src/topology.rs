use crate::collector::PathCollector;
use crate::error::NipError;
use crate::geo::Geolocator;
use crate::source::{MetadataRequest, NipSource};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hoppipolla_core::cache::BoundedCache;
use hoppipolla_core::config::NipConfig;
use hoppipolla_core::error::with_deadline;
use hoppipolla_core::metadata::{merge_metadata, Metadata};
use hoppipolla_core::metrics::{CacheMetrics, CacheMetricsSnapshot};
use hoppipolla_core::model::IsdAsn;
use hoppipolla_core::upstream::{PathQuery, TopologyOracle, TOPOLOGY_ORACLE};
use jobs::{PeriodicJob, PeriodicWorker};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub const SOURCE_NAME: &str = "topology";

type PairKey = (IsdAsn, IsdAsn);
type Collected = Result<Arc<Metadata>, NipError>;
type InflightTable = DashMap<PairKey, watch::Receiver<Option<Collected>>>;

/// State shared between request handling and the refresh job.
struct Aggregator {
    oracle: Arc<dyn TopologyOracle>,
    collector: PathCollector,
    cache: Mutex<BoundedCache<PairKey, Arc<Metadata>>>,
    metrics: CacheMetrics,
    upstream_timeout: Duration,
}

impl Aggregator {
    /// Fetches every candidate path between the pair and merges their fragments in
    /// candidate order once all of them are done.
    async fn collect(&self, (src, dst): PairKey) -> Result<Metadata, NipError> {
        let candidates = with_deadline(
            TOPOLOGY_ORACLE,
            self.upstream_timeout,
            self.oracle.find_paths(dst, src, PathQuery::default()),
        )
        .await
        .map_err(NipError::OracleUnavailable)?;

        let mut tasks = JoinSet::new();
        for (idx, path) in candidates.into_iter().enumerate() {
            let collector = self.collector.clone();
            tasks.spawn(async move { (idx, collector.collect(&path).await) });
        }

        let mut fragments = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(fragment) => fragments.push(fragment),
                Err(err) => error!(
                    "Metadata collection task for {} -> {} failed: {}",
                    src, dst, err
                ),
            }
        }
        fragments.sort_by_key(|(idx, _)| *idx);

        Ok(merge_metadata(fragments.into_iter().map(|(_, fragment)| fragment)))
    }

    async fn lookup(&self, key: &PairKey) -> Option<Arc<Metadata>> {
        let hit = self.cache.lock().await.get(key, Instant::now());
        self.metrics.record_lookup(hit.is_some());
        hit
    }

    async fn store(&self, key: PairKey, metadata: Arc<Metadata>) {
        let (_, evicted) = self.cache.lock().await.insert(key, metadata, None);
        for (src, dst) in evicted {
            debug!("Evicted least recently used metadata for {} -> {}", src, dst);
            self.metrics.record_eviction();
        }
    }

    async fn refresh_all(&self) {
        let keys = self.cache.lock().await.keys();
        for key in keys {
            match self.collect(key).await {
                Ok(metadata) => {
                    // Keys evicted while collecting stay evicted.
                    self.cache
                        .lock()
                        .await
                        .update_existing(&key, Arc::new(metadata));
                    self.metrics.record_refresh(true);
                }
                Err(err) => {
                    warn!(
                        "Failed to refresh metadata for {} -> {}: {}",
                        key.0, key.1, err
                    );
                    self.metrics.record_refresh(false);
                }
            }
        }
    }
}

struct RefreshJob {
    aggregator: Arc<Aggregator>,
}

#[async_trait::async_trait]
impl PeriodicJob for RefreshJob {
    fn name(&self) -> &str {
        "metadata-refresh"
    }

    async fn run_once(&self) {
        self.aggregator.refresh_all().await;
    }
}

enum Role {
    Leader(watch::Sender<Option<Collected>>),
    Follower(watch::Receiver<Option<Collected>>),
}

/// Removes the in-flight marker of a pair when its leader finishes or is cancelled.
struct InflightGuard<'a> {
    key: PairKey,
    inflight: &'a InflightTable,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}

/// Metadata derived from the paths the topology oracle knows between two nodes.
///
/// Results are cached per (source, destination) without expiry and kept warm by a
/// background job started in [`init`](NipSource::init). Concurrent misses for the
/// same pair share one collection.
pub struct TopologyNipSource {
    aggregator: Arc<Aggregator>,
    inflight: InflightTable,
    refresh_interval: Duration,
    worker: Mutex<Option<PeriodicWorker>>,
}

impl TopologyNipSource {
    pub fn new(
        oracle: Arc<dyn TopologyOracle>,
        geolocator: Option<Arc<dyn Geolocator>>,
        config: &NipConfig,
    ) -> Self {
        let geolocator = match (config.enable_geolocation, geolocator) {
            (true, None) => {
                warn!("Geolocation is enabled but no geolocator was provided");
                None
            }
            (true, geolocator) => geolocator,
            (false, _) => None,
        };

        Self {
            aggregator: Arc::new(Aggregator {
                oracle,
                collector: PathCollector::new(geolocator, config.upstream_timeout()),
                cache: Mutex::new(BoundedCache::with_capacity(config.cache_size)),
                metrics: CacheMetrics::default(),
                upstream_timeout: config.upstream_timeout(),
            }),
            inflight: DashMap::new(),
            refresh_interval: config.refresh_interval(),
            worker: Mutex::new(None),
        }
    }

    /// Overrides the refresh period taken from the configuration.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.aggregator.metrics.snapshot()
    }

    pub async fn cached_pairs(&self) -> usize {
        self.aggregator.cache.lock().await.len()
    }

    pub async fn is_refreshing(&self) -> bool {
        match self.worker.lock().await.as_ref() {
            Some(worker) => worker.is_running().await,
            None => false,
        }
    }

    /// Runs one refresh cycle over every cached pair right away.
    pub async fn refresh_now(&self) {
        self.aggregator.refresh_all().await;
    }
}

#[async_trait::async_trait]
impl NipSource for TopologyNipSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn init(&self) -> Result<(), NipError> {
        let mut worker = self.worker.lock().await;
        if worker.is_none() {
            let job = Arc::new(RefreshJob {
                aggregator: self.aggregator.clone(),
            });
            *worker = Some(PeriodicWorker::start(job, self.refresh_interval));
        }
        if self.aggregator.collector.geolocation_enabled() {
            info!("Geolocation enrichment enabled");
        }
        Ok(())
    }

    /// Stops the refresh job before releasing the oracle.
    async fn close(&self) -> Result<(), NipError> {
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            worker.stop().await?;
        }
        self.aggregator
            .oracle
            .close()
            .await
            .map_err(NipError::OracleUnavailable)
    }

    async fn get_metadata(&self, request: &MetadataRequest) -> Result<Arc<Metadata>, NipError> {
        let key = request.endpoints()?;

        loop {
            if let Some(metadata) = self.aggregator.lookup(&key).await {
                debug!("Metadata cache hit for {} -> {}", key.0, key.1);
                return Ok(metadata);
            }

            let role = match self.inflight.entry(key) {
                Entry::Occupied(pending) => Role::Follower(pending.get().clone()),
                Entry::Vacant(slot) => {
                    let (tx, rx) = watch::channel(None);
                    slot.insert(rx);
                    Role::Leader(tx)
                }
            };

            match role {
                Role::Leader(tx) => {
                    let guard = InflightGuard {
                        key,
                        inflight: &self.inflight,
                    };
                    debug!("Metadata cache miss for {} -> {}", key.0, key.1);
                    let started = Instant::now();
                    let outcome = self.aggregator.collect(key).await.map(Arc::new);
                    self.aggregator
                        .metrics
                        .record_round_trip(
                            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
                        );
                    if let Ok(metadata) = &outcome {
                        self.aggregator.store(key, metadata.clone()).await;
                    }

                    drop(guard);
                    let _ = tx.send(Some(outcome.clone()));
                    return outcome;
                }
                Role::Follower(mut rx) => {
                    let shared = rx
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|outcome| outcome.clone());
                    if let Some(outcome) = shared {
                        return outcome;
                    }
                    // Leader was cancelled before publishing; start over.
                }
            }
        }
    }
}
