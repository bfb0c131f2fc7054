//! Unix socket server for relay requests from page contexts.
//!
//! One JSON request per line. Requests on a connection are handled
//! concurrently and every line gets exactly one reply line, tagged with the
//! request's `id` so callers can correlate out-of-order replies.

use crate::auth_store::SqliteAuthStore;
use crate::config::RelayConfig;
use crate::http::ReqwestTransport;
use crate::payload::RelayResponse;
use crate::relay::RelayClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Relay server listening on a Unix socket
pub struct RelayServer {
    socket_path: PathBuf,
    client: RelayClient,
}

impl RelayServer {
    /// Create a server around an already-wired client
    pub fn new(socket_path: impl Into<PathBuf>, client: RelayClient) -> Self {
        Self {
            socket_path: socket_path.into(),
            client,
        }
    }

    /// Wire the SQLite store and HTTP transport from configuration
    pub fn from_config(config: &RelayConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = SqliteAuthStore::open(&config.db_path)?;
        let transport = ReqwestTransport::new(config.request_timeout())?;
        let client = RelayClient::new(
            Arc::new(store),
            Arc::new(transport),
            config.default_api_base.clone(),
        );
        Ok(Self::new(config.socket_path.clone(), client))
    }

    /// Bind the socket, replacing a stale one
    pub fn bind(&self) -> std::io::Result<UnixListener> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        let listener = UnixListener::bind(&self.socket_path)?;
        info!("Relay server listening on {:?}", self.socket_path);
        Ok(listener)
    }

    /// Start the server and listen for connections
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = self.bind()?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections on an already-bound listener
    pub async fn serve(&self, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let client = self.client.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, client).await {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Process a single line (for direct integration without socket)
    pub async fn process(&self, line: &str) -> RelayResponse {
        self.client.handle_line(line).await
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: UnixStream,
    client: RelayClient,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // Single writer so concurrent replies never interleave
    let (reply_tx, mut reply_rx) = mpsc::channel::<RelayResponse>(32);
    let writer_task = tokio::spawn(async move {
        while let Some(response) = reply_rx.recv().await {
            let json = match serde_json::to_string(&response) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to encode reply: {}", e);
                    continue;
                }
            };
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    while reader.read_line(&mut line).await? > 0 {
        let request = line.trim().to_string();
        line.clear();
        if request.is_empty() {
            continue;
        }

        let client = client.clone();
        let reply_tx = reply_tx.clone();
        tokio::spawn(async move {
            let response = client.handle_line(&request).await;
            if reply_tx.send(response).await.is_err() {
                warn!("Connection closed before reply could be written");
            }
        });
    }

    // In-flight handlers hold their own senders; the writer drains them all
    drop(reply_tx);
    writer_task.await??;
    debug!("Connection finished");

    Ok(())
}
