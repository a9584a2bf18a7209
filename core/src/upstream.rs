use crate::error::UpstreamError;
use crate::model::{CandidatePath, IsdAsn};

pub const TOPOLOGY_ORACLE: &str = "topology oracle";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathQuery {
    /// Bypass any oracle-side path cache.
    pub force_refresh: bool,
}

/// Path discovery service (the local SCION daemon in production).
#[async_trait::async_trait]
pub trait TopologyOracle: Send + Sync {
    async fn local_node(&self) -> Result<IsdAsn, UpstreamError>;

    async fn find_paths(
        &self,
        dst: IsdAsn,
        src: IsdAsn,
        query: PathQuery,
    ) -> Result<Vec<CandidatePath>, UpstreamError>;

    /// Releases the oracle connection.
    async fn close(&self) -> Result<(), UpstreamError> {
        Ok(())
    }
}
