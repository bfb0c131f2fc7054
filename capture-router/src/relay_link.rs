//! Page-context side of the relay.
//!
//! The controller and bridge only need "send one request, get one reply".
//! In-process deployments use a [`RelayHandle`] directly; the standalone
//! binary talks to `relay-server` over its Unix socket.

use async_trait::async_trait;
use relay_service::{RelayError, RelayHandle, RelayRequest, RelayResponse};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("relay io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("relay json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("relay closed the connection")]
    Closed,

    #[error("relay did not answer within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// One request, one reply
#[async_trait]
pub trait RelaySender: Send + Sync {
    async fn send(&self, request: RelayRequest) -> Result<RelayResponse, LinkError>;
}

#[async_trait]
impl RelaySender for RelayHandle {
    async fn send(&self, request: RelayRequest) -> Result<RelayResponse, LinkError> {
        Ok(self.request(request).await?)
    }
}

/// Client for `relay-server`'s newline-delimited JSON socket
pub struct SocketRelay {
    socket_path: PathBuf,
    next_id: AtomicU64,
    timeout: Duration,
}

impl SocketRelay {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn exchange(&self, id: u64, line: String) -> Result<RelayResponse, LinkError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (reader, mut writer) = stream.into_split();

        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        let mut lines = BufReader::new(reader).lines();
        while let Some(reply) = lines.next_line().await? {
            if reply.trim().is_empty() {
                continue;
            }
            let response: RelayResponse = serde_json::from_str(&reply)?;
            if response.id == Some(id) {
                return Ok(response);
            }
            trace!("Skipping reply for id {:?}", response.id);
        }

        Err(LinkError::Closed)
    }
}

#[async_trait]
impl RelaySender for SocketRelay {
    async fn send(&self, request: RelayRequest) -> Result<RelayResponse, LinkError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut message = serde_json::to_value(&request)?;
        if let Value::Object(fields) = &mut message {
            fields.insert("id".to_string(), Value::from(id));
        }
        let line = serde_json::to_string(&message)?;

        debug!("Sending {} to relay (id {})", request.kind(), id);
        tokio::time::timeout(self.timeout, self.exchange(id, line))
            .await
            .map_err(|_| LinkError::Timeout(self.timeout))?
    }
}
