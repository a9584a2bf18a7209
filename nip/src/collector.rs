use crate::geo::{Geolocator, GEOLOCATION};
use hoppipolla_core::error::with_deadline;
use hoppipolla_core::metadata::{
    LinkMetadata, Metadata, MetadataValue, NodeMetadata, BANDWIDTH, LATENCY, OPERATES,
};
use hoppipolla_core::model::{CandidatePath, Link};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Builds the metadata fragment of a single candidate path.
#[derive(Clone)]
pub struct PathCollector {
    geolocator: Option<Arc<dyn Geolocator>>,
    upstream_timeout: Duration,
}

impl PathCollector {
    /// Geolocation runs only when a geolocator is given.
    pub fn new(geolocator: Option<Arc<dyn Geolocator>>, upstream_timeout: Duration) -> Self {
        Self {
            geolocator,
            upstream_timeout,
        }
    }

    pub fn geolocation_enabled(&self) -> bool {
        self.geolocator.is_some()
    }

    /// Emits `bandwidth` and `latency` per traversed link and, with geolocation,
    /// `operates` per country of each hop. Unknown link values are left out, as are
    /// hops whose lookup fails.
    pub async fn collect(&self, path: &CandidatePath) -> Metadata {
        let mut out = Metadata::default();

        for (idx, current) in path.interfaces.iter().enumerate() {
            if let Some(geolocator) = &self.geolocator {
                if let Some(Some(coords)) = path.geo.get(idx) {
                    let lookup = with_deadline(
                        GEOLOCATION,
                        self.upstream_timeout,
                        geolocator.reverse_geocode(coords.latitude, coords.longitude),
                    )
                    .await;
                    match lookup {
                        Ok(countries) => {
                            let mut seen: Vec<&str> = Vec::new();
                            for country in &countries {
                                if country.is_empty() || seen.contains(&country.as_str()) {
                                    continue;
                                }
                                seen.push(country.as_str());
                                out.node_info.push(NodeMetadata::new(
                                    OPERATES,
                                    current.node,
                                    MetadataValue::String(country.clone()),
                                ));
                            }
                        }
                        Err(err) => warn!(
                            "Reverse geocoding of {}#{} failed: {}",
                            current.node, current.id, err
                        ),
                    }
                }
            }

            let Some(next) = path.interfaces.get(idx + 1) else {
                break;
            };
            let link = Link::between(*current, *next);

            if let Some(Some(kbps)) = path.bandwidth_kbps.get(idx) {
                out.link_info.push(LinkMetadata::new(
                    BANDWIDTH,
                    link,
                    MetadataValue::Int32(clamp_i32(*kbps)),
                ));
            }
            if let Some(Some(latency)) = path.latency.get(idx) {
                let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
                out.link_info.push(LinkMetadata::new(
                    LATENCY,
                    link,
                    MetadataValue::Int32(clamp_i32(micros)),
                ));
            }
        }

        out
    }
}

fn clamp_i32(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
