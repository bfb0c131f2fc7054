//! Relay client: the only component allowed to talk to the backend or write
//! credentials.
//!
//! Every request is handled on its own task and produces exactly one
//! [`RelayResponse`]. Nothing is retried; a failed import is reported to the
//! caller and left for backend-side reconciliation.

use crate::auth_store::{AuthRecord, AuthStore};
use crate::error::RelayError;
use crate::http::{IngestTransport, OutboundRequest};
use crate::payload::{CaptureEvent, RelayRequest, RelayResponse};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Ingestion endpoint, relative to the stored `apiBase`
pub const IMPORT_PATH: &str = "/api/applications/import/extension";

/// Fallback backend origin when no `apiBase` has been synced
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Clone)]
pub struct RelayClient {
    store: Arc<dyn AuthStore>,
    transport: Arc<dyn IngestTransport>,
    default_api_base: String,
}

impl RelayClient {
    pub fn new(
        store: Arc<dyn AuthStore>,
        transport: Arc<dyn IngestTransport>,
        default_api_base: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            default_api_base: default_api_base.into(),
        }
    }

    /// Overwrite stored credentials. `api_base` is kept when not supplied.
    ///
    /// No validation happens here: an empty token is stored as given and
    /// only rejected when an import is attempted.
    pub async fn store_credentials(
        &self,
        token: String,
        uuid: String,
        api_base: Option<String>,
    ) -> Result<(), RelayError> {
        let current = self.store.load().await?;
        let record = AuthRecord {
            token: Some(token),
            uuid: Some(uuid),
            api_base: api_base.or(current.api_base),
        };
        self.store.replace(record).await?;
        info!("Stored credentials");
        Ok(())
    }

    /// Forward one capture to the backend and return its parsed body
    pub async fn import_application(&self, event: &CaptureEvent) -> Result<Value, RelayError> {
        // job_url is the backend's dedup key
        if event.job_url.trim().is_empty() {
            warn!("Import rejected: empty job_url");
            return Err(RelayError::InvalidMessage("job_url is empty".to_string()));
        }

        let record = self.store.load().await?;
        let Some(credentials) = record.credentials() else {
            warn!("Import of {} skipped: not authenticated", event.job_url);
            return Err(RelayError::AuthMissing);
        };

        let url = import_url(record.api_base_or(&self.default_api_base));
        let body =
            serde_json::to_value(event).map_err(|e| RelayError::InvalidMessage(e.to_string()))?;

        let request = OutboundRequest {
            url,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", credentials.token),
                ),
                ("uuid".to_string(), credentials.uuid.to_string()),
            ],
            body,
        };

        info!(
            "Importing {} application: {}",
            event.platform.as_str(),
            event.job_url
        );
        let reply = self.transport.post_json(request).await?;

        if !reply.is_success() {
            warn!("Backend rejected import with status {}", reply.status);
            return Err(RelayError::Backend {
                status: reply.status,
                body: reply.body,
            });
        }

        debug!("Import accepted with status {}", reply.status);
        Ok(parse_body(reply.body))
    }

    /// Dispatch a decoded request
    pub async fn handle(&self, request: RelayRequest) -> RelayResponse {
        let outcome = match request {
            RelayRequest::StoreAuth {
                token,
                uuid,
                api_base,
            } => self
                .store_credentials(token, uuid, api_base)
                .await
                .map(|()| None),
            RelayRequest::ImportApplication { payload } => {
                self.import_application(&payload).await.map(Some)
            }
            RelayRequest::Unknown => Err(RelayError::UnknownMessageType),
        };

        match outcome {
            Ok(None) => RelayResponse::ok(),
            Ok(Some(result)) => RelayResponse::ok_with(result),
            Err(e) => {
                debug!("Request failed: {}", e);
                RelayResponse::error(&e.to_string())
            }
        }
    }

    /// Decode a JSON line, dispatch it, and echo its `id`
    pub async fn handle_line(&self, line: &str) -> RelayResponse {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to parse message: {}", e);
                return RelayResponse::error(&RelayError::InvalidMessage(e.to_string()).to_string());
            }
        };

        let id = value.get("id").and_then(Value::as_u64);
        let response = match serde_json::from_value::<RelayRequest>(value) {
            Ok(request) => {
                debug!("Received {} request (id {:?})", request.kind(), id);
                self.handle(request).await
            }
            Err(e) => {
                warn!("Malformed request: {}", e);
                RelayResponse::error(&RelayError::InvalidMessage(e.to_string()).to_string())
            }
        };

        response.with_id(id)
    }

    /// Serve requests from an in-process channel.
    ///
    /// Each request runs on its own task; the reply channel stays open until
    /// that task settles.
    pub fn spawn(self, capacity: usize) -> RelayHandle {
        let (tx, mut rx) = mpsc::channel::<RelayJob>(capacity);

        tokio::spawn(async move {
            while let Some((request, reply)) = rx.recv().await {
                let client = self.clone();
                tokio::spawn(async move {
                    let response = client.handle(request).await;
                    if reply.send(response).is_err() {
                        debug!("Requester dropped before reply");
                    }
                });
            }
            debug!("Relay channel closed");
        });

        RelayHandle { tx }
    }
}

type RelayJob = (RelayRequest, oneshot::Sender<RelayResponse>);

/// Sending side of an in-process relay
#[derive(Clone, Debug)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayJob>,
}

impl RelayHandle {
    pub async fn request(&self, request: RelayRequest) -> Result<RelayResponse, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| RelayError::Closed)?;
        reply_rx.await.map_err(|_| RelayError::Closed)
    }
}

fn import_url(api_base: &str) -> String {
    format!("{}{}", api_base.trim().trim_end_matches('/'), IMPORT_PATH)
}

/// Success bodies pass through as JSON; anything else is kept as text
fn parse_body(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}
