//! Relay error taxonomy

use crate::auth_store::StoreError;
use crate::http::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Token or uuid absent at import time. Not retryable.
    #[error("not authenticated: token or uuid missing")]
    AuthMissing,

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("auth store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("unknown message type")]
    UnknownMessageType,

    #[error("relay channel closed")]
    Closed,
}

impl RelayError {
    /// Whether the failure came from missing credentials
    pub fn is_auth_missing(&self) -> bool {
        matches!(self, RelayError::AuthMissing)
    }
}
