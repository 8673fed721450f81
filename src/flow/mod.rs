//! The three state-machine entry points of the device authorization grant:
//! issuing codes, recording the user's decision, and answering device polls.

use crate::cache::CacheError;
use crate::records::RecordError;
use thiserror::Error;

pub mod approve;
pub mod authorize;
pub mod poll;

/// Grant type identifying a device-flow token request (RFC 8628 §3.4).
pub const GRANT_TYPE_DEVICE_CODE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Errors surfaced by the flow handlers
#[derive(Debug, Error)]
pub enum FlowError {
    /// Missing or invalid profile configuration, including a generator that
    /// cannot produce identifiers of the configured length. Not retryable.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The request is malformed: unknown or expired user code, missing
    /// parameter, wrong grant type.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    /// Code generation kept colliding with stored codes.
    #[error("Failed to store device codes after {0} attempts")]
    CodesExhausted(usize),
    #[error("Token issuance failed: {0}")]
    TokenIssuance(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<RecordError> for FlowError {
    fn from(err: RecordError) -> Self {
        FlowError::InvalidMessage(err.to_string())
    }
}
