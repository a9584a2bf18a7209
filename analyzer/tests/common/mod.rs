#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use hoppipolla_core::config::AnalyzerConfig;
use hoppipolla_core::error::UpstreamError;
use hoppipolla_core::model::{CandidatePath, IsdAsn, Link, PathInterface};
use hoppipolla_core::upstream::{PathQuery, TopologyOracle, TOPOLOGY_ORACLE};
use path_analyzer::policy::POLICY_ENGINE;
use path_analyzer::{PolicyEngine, PolicyPath};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn ia(raw: &str) -> IsdAsn {
    raw.parse().expect("valid ISD-AS")
}

pub fn src() -> IsdAsn {
    ia("1-ff00:0:110")
}

pub fn config(timeout_ms: u64) -> AnalyzerConfig {
    AnalyzerConfig {
        sciond_addr: "127.0.0.1:30255".to_string(),
        cache_size: 16,
        policy_manager_addr: "127.0.0.1:27002".to_string(),
        upstream_timeout_ms: timeout_ms,
    }
}

/// Candidate crossing `hops` in order, valid for `ttl`.
pub fn candidate(hops: &[(IsdAsn, u64)], ttl: ChronoDuration) -> CandidatePath {
    CandidatePath::new(
        hops.iter()
            .map(|(node, id)| PathInterface::new(*node, *id))
            .collect(),
        Utc::now() + ttl,
    )
}

pub struct FakeOracle {
    local: IsdAsn,
    candidates: Mutex<Vec<CandidatePath>>,
    failure: Mutex<Option<UpstreamError>>,
    delay: Duration,
    pub find_calls: AtomicUsize,
    pub forced_refreshes: AtomicUsize,
    pub closed: AtomicBool,
}

impl FakeOracle {
    pub fn new(candidates: Vec<CandidatePath>) -> Self {
        Self::with_delay(candidates, Duration::ZERO)
    }

    pub fn with_delay(candidates: Vec<CandidatePath>, delay: Duration) -> Self {
        Self {
            local: src(),
            candidates: Mutex::new(candidates),
            failure: Mutex::new(None),
            delay,
            find_calls: AtomicUsize::new(0),
            forced_refreshes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn set_candidates(&self, candidates: Vec<CandidatePath>) {
        *self.candidates.lock().unwrap() = candidates;
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(UpstreamError::unavailable(TOPOLOGY_ORACLE, message));
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TopologyOracle for FakeOracle {
    async fn local_node(&self) -> Result<IsdAsn, UpstreamError> {
        Ok(self.local)
    }

    async fn find_paths(
        &self,
        _dst: IsdAsn,
        _src: IsdAsn,
        query: PathQuery,
    ) -> Result<Vec<CandidatePath>, UpstreamError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if query.force_refresh {
            self.forced_refreshes.fetch_add(1, Ordering::SeqCst);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.candidates.lock().unwrap().clone())
    }

    async fn close(&self) -> Result<(), UpstreamError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Returns the configured paths, or every submitted link as a single path when none
/// are configured.
#[derive(Default)]
pub struct FakePolicy {
    response: Mutex<Option<Vec<PolicyPath>>>,
    failure: Mutex<Option<UpstreamError>>,
    pub calls: AtomicUsize,
    pub subscriptions: Mutex<Vec<String>>,
    pub closed: AtomicBool,
}

impl FakePolicy {
    pub fn pass_through() -> Self {
        Self::default()
    }

    pub fn answering(paths: Vec<PolicyPath>) -> Self {
        let policy = Self::default();
        *policy.response.lock().unwrap() = Some(paths);
        policy
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(UpstreamError::unavailable(POLICY_ENGINE, message));
    }
}

#[async_trait::async_trait]
impl PolicyEngine for FakePolicy {
    async fn find_paths(
        &self,
        _src: IsdAsn,
        _dst: IsdAsn,
        links: Vec<Link>,
    ) -> Result<Vec<PolicyPath>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        let configured = self.response.lock().unwrap().clone();
        Ok(configured.unwrap_or_else(|| vec![PolicyPath::new(links)]))
    }

    async fn subscribe_for_invalidation(&self, callback_address: &str) -> Result<(), UpstreamError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push(callback_address.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), UpstreamError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
