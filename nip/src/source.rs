use crate::error::NipError;
use hoppipolla_core::metadata::Metadata;
use hoppipolla_core::model::{IsdAsn, Link};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Metadata query for a (source, destination) pair. `topology` narrows the links of
/// interest; sources are free to ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRequest {
    pub src: String,
    pub dst: String,
    #[serde(default)]
    pub topology: Vec<Link>,
}

impl MetadataRequest {
    pub fn new(src: impl Into<String>, dst: impl Into<String>, topology: Vec<Link>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            topology,
        }
    }

    /// Parses both endpoints.
    pub fn endpoints(&self) -> Result<(IsdAsn, IsdAsn), NipError> {
        let parse = |raw: &str| {
            raw.trim()
                .parse::<IsdAsn>()
                .map_err(|err| NipError::InvalidNode(format!("{raw:?}: {err}")))
        };
        Ok((parse(&self.src)?, parse(&self.dst)?))
    }
}

/// A provider of network information plane metadata.
#[async_trait::async_trait]
pub trait NipSource: Send + Sync {
    fn name(&self) -> &str;

    async fn init(&self) -> Result<(), NipError>;

    async fn close(&self) -> Result<(), NipError>;

    async fn get_metadata(&self, request: &MetadataRequest) -> Result<Arc<Metadata>, NipError>;
}
