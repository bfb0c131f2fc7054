//! Relay Service Library
//!
//! The privileged side of the capture pipeline: holds credentials in a
//! persistent store and forwards captured applications, authenticated, to
//! the ingestion backend. Page contexts reach it over a Unix socket or an
//! in-process [`RelayHandle`].

pub mod auth_store;
pub mod config;
pub mod error;
pub mod http;
pub mod payload;
pub mod relay;
pub mod server;

pub use auth_store::{AuthRecord, AuthStore, MemoryAuthStore, SqliteAuthStore, StoreError};
pub use config::RelayConfig;
pub use error::RelayError;
pub use http::{HttpReply, IngestTransport, OutboundRequest, ReqwestTransport, TransportError};
pub use payload::{CaptureEvent, CaptureExtra, EventType, Platform, RelayRequest, RelayResponse};
pub use relay::{RelayClient, RelayHandle, DEFAULT_API_BASE, IMPORT_PATH};
pub use server::RelayServer;
