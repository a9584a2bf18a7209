use crate::error::NipError;
use crate::geo::Geolocator;
use crate::local::LocalNipSource;
use crate::source::{MetadataRequest, NipSource};
use crate::topology::TopologyNipSource;
use hoppipolla_core::config::NipConfig;
use hoppipolla_core::metadata::{merge_metadata, Metadata};
use hoppipolla_core::upstream::TopologyOracle;
use std::sync::Arc;
use tracing::{debug, info};

/// Fans a metadata request out to every configured source and merges the answers
/// in source order.
pub struct NipProxy {
    sources: Vec<Arc<dyn NipSource>>,
}

impl NipProxy {
    pub fn new(sources: Vec<Arc<dyn NipSource>>) -> Self {
        Self { sources }
    }

    /// Topology source first, then the local source when a data directory is set.
    pub fn from_config(
        oracle: Arc<dyn TopologyOracle>,
        geolocator: Option<Arc<dyn Geolocator>>,
        config: &NipConfig,
    ) -> Self {
        let mut sources: Vec<Arc<dyn NipSource>> =
            vec![Arc::new(TopologyNipSource::new(oracle, geolocator, config))];
        if let Some(dir) = &config.local_data_dir {
            sources.push(Arc::new(LocalNipSource::new(dir)));
        }
        Self::new(sources)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    pub async fn init(&self) -> Result<(), NipError> {
        for source in &self.sources {
            source.init().await?;
            info!("Metadata source '{}' initialized", source.name());
        }
        Ok(())
    }

    pub async fn close(&self) -> Result<(), NipError> {
        for source in &self.sources {
            source.close().await?;
            info!("Metadata source '{}' closed", source.name());
        }
        Ok(())
    }

    /// Fails as soon as one source fails.
    pub async fn get_metadata(&self, request: &MetadataRequest) -> Result<Metadata, NipError> {
        let mut bundles = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let bundle = source.get_metadata(request).await?;
            debug!(
                "Source '{}' returned {} node and {} link attribute(s)",
                source.name(),
                bundle.node_info.len(),
                bundle.link_info.len()
            );
            bundles.push(Arc::unwrap_or_clone(bundle));
        }
        Ok(merge_metadata(bundles))
    }
}
