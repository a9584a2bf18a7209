#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use hoppipolla_core::config::NipConfig;
use hoppipolla_core::error::UpstreamError;
use hoppipolla_core::model::{CandidatePath, GeoCoordinates, IsdAsn, PathInterface};
use hoppipolla_core::upstream::{PathQuery, TopologyOracle, TOPOLOGY_ORACLE};
use nip_proxy::geo::GEOLOCATION;
use nip_proxy::Geolocator;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const SRC: &str = "1-ff00:0:110";
pub const DST: &str = "1-ff00:0:112";

pub fn ia(raw: &str) -> IsdAsn {
    raw.parse().expect("valid ISD-AS")
}

pub fn config(enable_geolocation: bool) -> NipConfig {
    NipConfig {
        sciond_addr: "127.0.0.1:30255".to_string(),
        cache_size: 16,
        google_maps_api_key: if enable_geolocation { "key" } else { "" }.to_string(),
        enable_geolocation,
        refresh_interval_secs: 60,
        local_data_dir: None,
        upstream_timeout_ms: 1_000,
    }
}

/// Candidate `SRC#1 -> mid#1, mid#2 -> DST#1` with the given link bandwidths.
pub fn candidate(mid: &str, bandwidth_kbps: [u64; 3]) -> CandidatePath {
    let (a, b, c) = (ia(SRC), ia(mid), ia(DST));
    let mut path = CandidatePath::new(
        vec![
            PathInterface::new(a, 1),
            PathInterface::new(b, 1),
            PathInterface::new(b, 2),
            PathInterface::new(c, 1),
        ],
        Utc::now() + ChronoDuration::minutes(5),
    );
    path.bandwidth_kbps = bandwidth_kbps.iter().map(|kbps| Some(*kbps)).collect();
    path.latency = vec![Some(Duration::from_millis(2)); 3];
    path
}

pub fn located(mut path: CandidatePath, latitude: f32) -> CandidatePath {
    path.geo = vec![
        Some(GeoCoordinates {
            latitude,
            longitude: 8.5,
            address: None,
        });
        path.interfaces.len()
    ];
    path
}

pub struct FakeOracle {
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

    pub fn calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TopologyOracle for FakeOracle {
    async fn local_node(&self) -> Result<IsdAsn, UpstreamError> {
        Ok(ia(SRC))
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

/// Answers `["CH"]` for northern latitudes and fails for southern ones.
#[derive(Default)]
pub struct FakeGeolocator {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Geolocator for FakeGeolocator {
    async fn reverse_geocode(
        &self,
        latitude: f32,
        _longitude: f32,
    ) -> Result<Vec<String>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if latitude < 0.0 {
            return Err(UpstreamError::unavailable(GEOLOCATION, "over query limit"));
        }
        Ok(vec!["CH".to_string()])
    }
}
