use crate::path_cache::{CachedPaths, InsertOutcome, PathCache};
use crate::policy::{PolicyEngine, POLICY_ENGINE};
use crate::reconstruct::reconstruct_paths;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hoppipolla_core::config::AnalyzerConfig;
use hoppipolla_core::error::{with_deadline, ErrorCode, HoppipollaError, UpstreamError};
use hoppipolla_core::metrics::{CacheMetrics, CacheMetricsSnapshot};
use hoppipolla_core::model::{min_expiry, IsdAsn, Link, ResolvedPath};
use hoppipolla_core::upstream::{PathQuery, TopologyOracle, TOPOLOGY_ORACLE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
    #[error("topology oracle error: {0}")]
    OracleUnavailable(UpstreamError),
    #[error("policy engine error: {0}")]
    PolicyUnavailable(UpstreamError),
}

impl HoppipollaError for AnalyzerError {
    fn error_code(&self) -> ErrorCode {
        match self {
            AnalyzerError::InvalidDestination(_) => ErrorCode::InvalidArgument,
            AnalyzerError::OracleUnavailable(err) | AnalyzerError::PolicyUnavailable(err) => {
                err.error_code()
            }
        }
    }
}

type Resolution = Result<CachedPaths, AnalyzerError>;
/// Pending resolution of a destination, tagged with the cache generation it was
/// started under.
struct Pending {
    generation: u64,
    outcome: watch::Receiver<Option<Resolution>>,
}

type InflightTable = DashMap<IsdAsn, Pending>;

/// Removes the in-flight marker of a destination when its leader finishes or is
/// cancelled, unless a leader of a later generation has taken the slot over.
struct InflightGuard<'a> {
    key: IsdAsn,
    generation: u64,
    inflight: &'a InflightTable,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight
            .remove_if(&self.key, |_, pending| pending.generation == self.generation);
    }
}

enum Role {
    Leader(watch::Sender<Option<Resolution>>),
    Follower(watch::Receiver<Option<Resolution>>),
}

/// Resolves policy-compliant paths to a destination and caches them until the
/// underlying candidates expire or the policies change.
pub struct PathAnalyzer {
    oracle: Arc<dyn TopologyOracle>,
    policy: Arc<dyn PolicyEngine>,
    cache: PathCache,
    inflight: InflightTable,
    upstream_timeout: Duration,
}

impl PathAnalyzer {
    pub fn new(
        oracle: Arc<dyn TopologyOracle>,
        policy: Arc<dyn PolicyEngine>,
        config: &AnalyzerConfig,
    ) -> Self {
        Self {
            oracle,
            policy,
            cache: PathCache::new(config.cache_size, CacheMetrics::default()),
            inflight: DashMap::new(),
            upstream_timeout: config.upstream_timeout(),
        }
    }

    /// Subscribes to policy invalidations so the policy engine can trigger purges.
    pub async fn init(&self, callback_address: &str) -> Result<(), AnalyzerError> {
        with_deadline(
            POLICY_ENGINE,
            self.upstream_timeout,
            self.policy.subscribe_for_invalidation(callback_address),
        )
        .await
        .map_err(AnalyzerError::PolicyUnavailable)?;
        info!(
            "Subscribed to policy invalidations with callback {}",
            callback_address
        );
        Ok(())
    }

    /// Releases the policy engine and oracle handles. Both are attempted.
    pub async fn shutdown(&self) -> Result<(), AnalyzerError> {
        let policy = self.policy.close().await;
        let oracle = self.oracle.close().await;
        policy.map_err(AnalyzerError::PolicyUnavailable)?;
        oracle.map_err(AnalyzerError::OracleUnavailable)?;
        Ok(())
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.cache.metrics().snapshot()
    }

    pub async fn cached_destinations(&self) -> usize {
        self.cache.len().await
    }

    /// Empties the cache. Results of resolutions already in flight are returned to
    /// their callers but not stored.
    pub async fn purge(&self) {
        self.cache.purge().await;
        info!("Path cache purged");
    }

    pub async fn resolve(&self, destination: &str) -> Result<CachedPaths, AnalyzerError> {
        let dst = destination
            .trim()
            .parse::<IsdAsn>()
            .map_err(|err| AnalyzerError::InvalidDestination(err.to_string()))?;

        loop {
            if let Some(paths) = self.cache.get(&dst).await {
                debug!("Path cache hit for {}", dst);
                return Ok(paths);
            }

            // Resolutions started before the last purge are never joined.
            let generation = self.cache.generation().await;
            let role = match self.inflight.entry(dst) {
                Entry::Occupied(pending) if pending.get().generation == generation => {
                    Role::Follower(pending.get().outcome.clone())
                }
                Entry::Occupied(mut stale) => {
                    let (tx, rx) = watch::channel(None);
                    stale.insert(Pending {
                        generation,
                        outcome: rx,
                    });
                    Role::Leader(tx)
                }
                Entry::Vacant(slot) => {
                    let (tx, rx) = watch::channel(None);
                    slot.insert(Pending {
                        generation,
                        outcome: rx,
                    });
                    Role::Leader(tx)
                }
            };

            match role {
                Role::Leader(tx) => {
                    let guard = InflightGuard {
                        key: dst,
                        generation,
                        inflight: &self.inflight,
                    };
                    debug!("Path cache miss for {}", dst);
                    let outcome = self.resolve_uncached(dst, generation).await;
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
                    match shared {
                        Some(outcome) => return outcome,
                        // Leader was cancelled before publishing; start over.
                        None => continue,
                    }
                }
            }
        }
    }

    async fn resolve_uncached(&self, dst: IsdAsn, generation: u64) -> Resolution {
        let started = Instant::now();

        let src = with_deadline(
            TOPOLOGY_ORACLE,
            self.upstream_timeout,
            self.oracle.local_node(),
        )
        .await
        .map_err(AnalyzerError::OracleUnavailable)?;

        let candidates = with_deadline(
            TOPOLOGY_ORACLE,
            self.upstream_timeout,
            self.oracle.find_paths(
                dst,
                src,
                PathQuery {
                    force_refresh: true,
                },
            ),
        )
        .await
        .map_err(AnalyzerError::OracleUnavailable)?;

        let links: Vec<Link> = candidates.iter().flat_map(|path| path.links()).collect();
        let expiry = min_expiry(&candidates);

        let compliant = with_deadline(
            POLICY_ENGINE,
            self.upstream_timeout,
            self.policy.find_paths(src, dst, links),
        )
        .await
        .map_err(AnalyzerError::PolicyUnavailable)?;

        let paths: Vec<ResolvedPath> = compliant
            .iter()
            .flat_map(|path| reconstruct_paths(src, dst, &path.links))
            .collect();
        let paths = Arc::new(paths);
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.cache.metrics().record_round_trip(elapsed_us);

        match expiry {
            Some(expiry) => match self.cache.insert(dst, paths.clone(), expiry, generation).await {
                InsertOutcome::Stored => {
                    debug!("Cached {} path(s) to {} until {}", paths.len(), dst, expiry)
                }
                InsertOutcome::Expired => {
                    warn!("Candidates to {} expired before they could be cached", dst)
                }
                InsertOutcome::Superseded => {
                    debug!("Policies changed while resolving {}; result not cached", dst)
                }
            },
            None => debug!("No candidates towards {}; result not cached", dst),
        }

        Ok(paths)
    }
}
