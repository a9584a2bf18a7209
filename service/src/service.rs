use crate::api::{
    ErrorResponse, GetMetadataRequest, GetMetadataResponse, PathDto, PayloadError,
    RefreshPathCacheResponse, ResolvePathsRequest, ResolvePathsResponse,
};
use hoppipolla_core::config::AppConfig;
use hoppipolla_core::error::{ErrorCode, HoppipollaError};
use hoppipolla_core::model::Link;
use hoppipolla_core::upstream::TopologyOracle;
use nip_proxy::{Geolocator, MetadataRequest, NipError, NipProxy};
use path_analyzer::{AnalyzerError, PathAnalyzer, PolicyEngine};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Nip(#[from] NipError),
    #[error("failed to encode response: {0}")]
    Encoding(String),
}

impl From<PayloadError> for ServiceError {
    fn from(err: PayloadError) -> Self {
        ServiceError::InvalidRequest(err.to_string())
    }
}

impl HoppipollaError for ServiceError {
    fn error_code(&self) -> ErrorCode {
        match self {
            ServiceError::InvalidRequest(_) | ServiceError::UnknownMethod(_) => {
                ErrorCode::InvalidArgument
            }
            ServiceError::Analyzer(err) => err.error_code(),
            ServiceError::Nip(err) => err.error_code(),
            ServiceError::Encoding(_) => ErrorCode::Internal,
        }
    }
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        ErrorResponse::from_error(err)
    }
}

/// Request handlers of the path analyzer and the NIP proxy behind one facade.
pub struct Hoppipolla {
    analyzer: PathAnalyzer,
    nip: NipProxy,
    callback_address: String,
}

impl Hoppipolla {
    pub fn new(analyzer: PathAnalyzer, nip: NipProxy, callback_address: impl Into<String>) -> Self {
        Self {
            analyzer,
            nip,
            callback_address: callback_address.into(),
        }
    }

    /// The analyzer and the NIP proxy each hold their own oracle connection.
    pub fn from_config(
        analyzer_oracle: Arc<dyn TopologyOracle>,
        nip_oracle: Arc<dyn TopologyOracle>,
        policy: Arc<dyn PolicyEngine>,
        geolocator: Option<Arc<dyn Geolocator>>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            PathAnalyzer::new(analyzer_oracle, policy, &config.analyzer),
            NipProxy::from_config(nip_oracle, geolocator, &config.nip),
            config.server.callback_address(),
        )
    }

    pub fn analyzer(&self) -> &PathAnalyzer {
        &self.analyzer
    }

    /// Subscribes for policy invalidations and initializes every metadata source.
    pub async fn init(&self) -> Result<(), ServiceError> {
        self.analyzer.init(&self.callback_address).await?;
        self.nip.init().await?;
        info!("Service initialized");
        Ok(())
    }

    /// Closes every handle; the first failure is reported after all were attempted.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        let nip = self.nip.close().await;
        let analyzer = self.analyzer.shutdown().await;
        if let Err(err) = &nip {
            warn!("Failed to close metadata sources: {}", err);
        }
        if let Err(err) = &analyzer {
            warn!("Failed to close path analyzer: {}", err);
        }
        nip?;
        analyzer?;
        info!("Service shut down");
        Ok(())
    }

    pub async fn resolve_paths(
        &self,
        request: ResolvePathsRequest,
    ) -> Result<ResolvePathsResponse, ServiceError> {
        let paths = self.analyzer.resolve(&request.destination).await?;
        Ok(ResolvePathsResponse {
            paths: paths.iter().map(PathDto::from).collect(),
        })
    }

    /// Invoked by the policy engine whenever policies change.
    pub async fn refresh_path_cache(&self) -> RefreshPathCacheResponse {
        self.analyzer.purge().await;
        RefreshPathCacheResponse {}
    }

    pub async fn get_metadata(
        &self,
        request: GetMetadataRequest,
    ) -> Result<GetMetadataResponse, ServiceError> {
        let topology = request
            .topology
            .iter()
            .map(Link::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let metadata = self
            .nip
            .get_metadata(&MetadataRequest::new(request.src, request.dst, topology))
            .await?;
        Ok(GetMetadataResponse::from(&metadata))
    }

    /// JSON entry point keyed by RPC method name.
    pub async fn handle_json(&self, method: &str, body: &str) -> Result<String, ErrorResponse> {
        let outcome = match method {
            "ResolvePaths" => match decode::<ResolvePathsRequest>(body) {
                Ok(request) => self.resolve_paths(request).await.and_then(encode),
                Err(err) => Err(err),
            },
            "RefreshPathCache" => encode(self.refresh_path_cache().await),
            "GetMetadata" => match decode::<GetMetadataRequest>(body) {
                Ok(request) => self.get_metadata(request).await.and_then(encode),
                Err(err) => Err(err),
            },
            other => Err(ServiceError::UnknownMethod(other.to_string())),
        };

        outcome.map_err(|err| {
            warn!("{} failed: {}", method, err);
            ErrorResponse::from(&err)
        })
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ServiceError> {
    serde_json::from_str(body).map_err(|err| ServiceError::InvalidRequest(err.to_string()))
}

fn encode<T: Serialize>(response: T) -> Result<String, ServiceError> {
    serde_json::to_string(&response).map_err(|err| ServiceError::Encoding(err.to_string()))
}
