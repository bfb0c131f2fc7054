//! Credential bridge.
//!
//! Runs once on the tracker web app: reads the signed-in session from page
//! storage and hands it to the relay. Nothing here ever fails loudly; a
//! missing session is simply skipped until the next page load.

use crate::config::BridgeConfig;
use crate::page::PageStorage;
use crate::platforms::read_or_none;
use crate::relay_link::RelaySender;
use relay_service::RelayRequest;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a sync attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Credentials handed to the relay
    Synced,
    /// Token or uuid not in storage
    NoSession,
    /// Storage or relay failure
    Failed(String),
}

pub struct CredentialBridge {
    storage: Arc<dyn PageStorage>,
    relay: Arc<dyn RelaySender>,
    token_key: String,
    uuid_key: String,
    api_base: Option<String>,
}

impl CredentialBridge {
    pub fn new(storage: Arc<dyn PageStorage>, relay: Arc<dyn RelaySender>) -> Self {
        Self::from_config(storage, relay, &BridgeConfig::default())
    }

    pub fn from_config(
        storage: Arc<dyn PageStorage>,
        relay: Arc<dyn RelaySender>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            storage,
            relay,
            token_key: config.token_key.clone(),
            uuid_key: config.uuid_key.clone(),
            api_base: config.api_base.clone(),
        }
    }

    fn read_key(&self, key: &str) -> Option<String> {
        read_or_none(self.storage.get_item(key), key).filter(|value| !value.is_empty())
    }

    /// Single sync attempt, no retry
    pub async fn sync_once(&self) -> BridgeOutcome {
        let (Some(token), Some(uuid)) = (self.read_key(&self.token_key), self.read_key(&self.uuid_key))
        else {
            debug!("No session in page storage, skipping credential sync");
            return BridgeOutcome::NoSession;
        };

        let request = RelayRequest::StoreAuth {
            token,
            uuid,
            api_base: self.api_base.clone(),
        };

        match self.relay.send(request).await {
            Ok(response) if response.ok => {
                info!("Credentials synced to relay");
                BridgeOutcome::Synced
            }
            Ok(response) => {
                let error = response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string());
                warn!("Relay rejected credentials: {}", error);
                BridgeOutcome::Failed(error)
            }
            Err(e) => {
                warn!("Failed to sync credentials: {}", e);
                BridgeOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageSnapshot;
    use crate::relay_link::tests::RecordingSender;
    use crate::relay_link::LinkError;
    use relay_service::RelayResponse;

    fn bridge(snapshot: PageSnapshot, relay: Arc<RecordingSender>) -> CredentialBridge {
        CredentialBridge::new(Arc::new(snapshot), relay)
    }

    #[tokio::test]
    async fn test_syncs_when_both_keys_present() {
        let relay = Arc::new(RecordingSender::new());
        let page = PageSnapshot::new("http://localhost:3000/dashboard")
            .with_storage("token", "jwt-abc")
            .with_storage("uuid", "user-1");

        assert_eq!(bridge(page, relay.clone()).sync_once().await, BridgeOutcome::Synced);
        assert_eq!(
            relay.sent(),
            vec![RelayRequest::StoreAuth {
                token: "jwt-abc".to_string(),
                uuid: "user-1".to_string(),
                api_base: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_or_empty_key_sends_nothing() {
        let relay = Arc::new(RecordingSender::new());

        let only_token = PageSnapshot::default().with_storage("token", "jwt-abc");
        assert_eq!(
            bridge(only_token, relay.clone()).sync_once().await,
            BridgeOutcome::NoSession
        );

        let empty_uuid = PageSnapshot::default()
            .with_storage("token", "jwt-abc")
            .with_storage("uuid", "");
        assert_eq!(
            bridge(empty_uuid, relay.clone()).sync_once().await,
            BridgeOutcome::NoSession
        );

        assert!(relay.sent().is_empty());
    }

    #[tokio::test]
    async fn test_custom_keys_and_api_base() {
        let relay = Arc::new(RecordingSender::new());
        let config = BridgeConfig {
            token_key: "authToken".to_string(),
            uuid_key: "userId".to_string(),
            api_base: Some("https://api.apptrack.io".to_string()),
            ..BridgeConfig::default()
        };
        let page = PageSnapshot::default()
            .with_storage("authToken", "t")
            .with_storage("userId", "u");

        let bridge = CredentialBridge::from_config(Arc::new(page), relay.clone(), &config);
        assert_eq!(bridge.sync_once().await, BridgeOutcome::Synced);
        assert!(matches!(
            &relay.sent()[0],
            RelayRequest::StoreAuth { api_base: Some(base), .. } if base == "https://api.apptrack.io"
        ));
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let page = PageSnapshot::default()
            .with_storage("token", "t")
            .with_storage("uuid", "u");

        let relay = Arc::new(RecordingSender::new());
        relay.push_reply(Err(LinkError::Closed));
        assert!(matches!(
            bridge(page.clone(), relay).sync_once().await,
            BridgeOutcome::Failed(_)
        ));

        let relay = Arc::new(RecordingSender::new());
        relay.push_reply(Ok(RelayResponse::error("auth store error: disk full")));
        assert_eq!(
            bridge(page, relay).sync_once().await,
            BridgeOutcome::Failed("auth store error: disk full".to_string())
        );
    }
}
