use crate::api::ApiError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PsaError {
    #[error("Management API error: {0}")]
    Api(#[from] ApiError),

    #[error("psact value was not changed, Expected: {expected}, Actual: {actual}")]
    PsactNotChanged { expected: String, actual: String },

    #[error("Deployment rejected: {0}")]
    Forbidden(String),

    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("Invalid deployment: {0}")]
    InvalidDeployment(String),
}
