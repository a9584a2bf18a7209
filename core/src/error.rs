use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    Unavailable,
    DeadlineExceeded,
    FailedPrecondition,
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorCode::Internal => "INTERNAL",
        };
        write!(f, "{}", s)
    }
}

pub trait HoppipollaError: std::error::Error {
    fn error_code(&self) -> ErrorCode;
}

/// Failure of an outbound call to a collaborator service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },
    #[error("{service} did not answer within {after:?}")]
    Timeout {
        service: &'static str,
        after: Duration,
    },
}

impl UpstreamError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        UpstreamError::Unavailable {
            service,
            message: message.into(),
        }
    }
}

impl HoppipollaError for UpstreamError {
    fn error_code(&self) -> ErrorCode {
        match self {
            UpstreamError::Unavailable { .. } => ErrorCode::Unavailable,
            UpstreamError::Timeout { .. } => ErrorCode::DeadlineExceeded,
        }
    }
}

/// Bounds `call` by `limit`, mapping expiry to [`UpstreamError::Timeout`].
pub async fn with_deadline<T, F>(
    service: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, UpstreamError>
where
    F: std::future::Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout {
            service,
            after: limit,
        }),
    }
}
