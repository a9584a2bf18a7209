use hoppipolla_core::error::UpstreamError;
use hoppipolla_core::model::{IsdAsn, Link};
use serde::{Deserialize, Serialize};

pub const POLICY_ENGINE: &str = "policy engine";

/// One policy-compliant route as returned by the policy engine: an unordered set of
/// links forming one or more walks from source to destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPath {
    pub links: Vec<Link>,
}

impl PolicyPath {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }
}

/// External engine filtering a link graph against the published policies.
#[async_trait::async_trait]
pub trait PolicyEngine: Send + Sync {
    async fn find_paths(
        &self,
        src: IsdAsn,
        dst: IsdAsn,
        links: Vec<Link>,
    ) -> Result<Vec<PolicyPath>, UpstreamError>;

    /// Registers `callback_address` to be notified whenever policies change.
    async fn subscribe_for_invalidation(&self, callback_address: &str)
        -> Result<(), UpstreamError>;

    async fn close(&self) -> Result<(), UpstreamError> {
        Ok(())
    }
}
