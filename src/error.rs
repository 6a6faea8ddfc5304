use std::time::Duration;
use thiserror::Error;

/// Why a single HTTP request produced no usable response.
///
/// Always recovered inside the worker: a failed probe abandons the endpoint,
/// a failed trial moves on to the next credential pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Other(String),
}
