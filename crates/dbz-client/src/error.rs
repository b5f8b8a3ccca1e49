use thiserror::Error;

use crate::service::ServiceState;

/// Failures surfaced to callers of the client API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("CONNECTION_UNAVAILABLE: {0}")]
    ConnectionUnavailable(String),
    #[error("CLIENT: {0}")]
    Client(String),
    #[error("TIMEOUT: {0}")]
    Timeout(String),
    #[error("DISPATCH: unable to send to {topic} with key {key}")]
    Dispatch { topic: String, key: String },
    #[error("NOT_RUNNING: {0}")]
    NotRunning(String),
}

/// Service lifecycle failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("INVALID_TRANSITION: {service}: {from:?} -> {to:?}")]
    InvalidTransition {
        service: String,
        from: ServiceState,
        to: ServiceState,
    },
    #[error("NOT_RUNNING: {0}")]
    NotRunning(String),
    #[error("SUBSCRIBE_FAILED: group {0}")]
    SubscribeFailed(String),
}

impl From<ServiceError> for ClientError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotRunning(name) => ClientError::NotRunning(name),
            other => ClientError::Client(other.to_string()),
        }
    }
}
