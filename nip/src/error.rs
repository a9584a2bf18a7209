use hoppipolla_core::error::{ErrorCode, HoppipollaError, UpstreamError};
use jobs::JobError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NipError {
    #[error("invalid node: {0}")]
    InvalidNode(String),
    #[error("topology oracle error: {0}")]
    OracleUnavailable(UpstreamError),
    #[error("local metadata at {path} is unreadable: {message}")]
    LocalData { path: String, message: String },
    #[error("refresh worker error: {0}")]
    Worker(#[from] JobError),
}

impl HoppipollaError for NipError {
    fn error_code(&self) -> ErrorCode {
        match self {
            NipError::InvalidNode(_) => ErrorCode::InvalidArgument,
            NipError::OracleUnavailable(err) => err.error_code(),
            NipError::LocalData { .. } => ErrorCode::FailedPrecondition,
            NipError::Worker(_) => ErrorCode::Internal,
        }
    }
}
