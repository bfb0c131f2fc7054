//! One page load, driven by the host over newline-delimited JSON.
//!
//! The first snapshot with a usable URL decides what the session is for: a
//! supported job site gets a capture controller, the tracker web app gets a
//! credential sync, anything else is ignored. Snapshots without a URL only
//! update the page view until one arrives. Every later snapshot replaces the
//! page view and counts as a DOM mutation.

use crate::bridge::{BridgeOutcome, CredentialBridge};
use crate::config::CaptureConfig;
use crate::controller::{CaptureController, ControllerTiming};
use crate::page::{LivePage, PageSnapshot};
use crate::platforms::{adapter_for, PlatformRegistry};
use crate::relay_link::RelaySender;
use crate::types::{CaptureState, NodeId, PageEvent};
use relay_service::Platform;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One line from the host
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SessionInput {
    Snapshot(PageSnapshot),
    Click { node: NodeId },
}

/// What a page load is wired for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Capture(Platform),
    Bridge,
    Passive,
}

impl SessionRole {
    pub fn for_url(url: Option<&str>, registry: &PlatformRegistry, config: &CaptureConfig) -> Self {
        Self::try_for_url(url, registry, config).unwrap_or(SessionRole::Passive)
    }

    /// `None` while the URL is missing or has no host
    pub fn try_for_url(
        url: Option<&str>,
        registry: &PlatformRegistry,
        config: &CaptureConfig,
    ) -> Option<Self> {
        let parsed = url::Url::parse(url?).ok()?;
        let host = parsed.host_str()?;

        let role = if config.bridge.is_app_host(host) {
            SessionRole::Bridge
        } else if let Some(platform) = registry.platform_for_host(host) {
            SessionRole::Capture(platform)
        } else {
            SessionRole::Passive
        };
        Some(role)
    }
}

/// Summary of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub role: SessionRole,
    pub state: CaptureState,
    pub bridge: Option<BridgeOutcome>,
    /// Lines accepted
    pub inputs: usize,
    /// Lines that failed to parse
    pub rejected: usize,
}

struct CaptureWiring {
    controller: Arc<CaptureController>,
    events: mpsc::Sender<PageEvent>,
    task: JoinHandle<CaptureState>,
}

pub struct PageSession {
    config: CaptureConfig,
    registry: PlatformRegistry,
    relay: Arc<dyn RelaySender>,
}

impl PageSession {
    pub fn new(config: CaptureConfig, relay: Arc<dyn RelaySender>) -> Self {
        Self {
            config,
            registry: PlatformRegistry::new(),
            relay,
        }
    }

    pub fn with_registry(mut self, registry: PlatformRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Consume host input until EOF, then wait for pending captures to settle
    pub async fn run<R>(&self, reader: R) -> std::io::Result<SessionReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut report = SessionReport {
            role: SessionRole::Passive,
            state: CaptureState::Idle,
            bridge: None,
            inputs: 0,
            rejected: 0,
        };
        let mut page: Option<Arc<LivePage>> = None;
        let mut capture: Option<CaptureWiring> = None;
        let mut role_decided = false;

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let input: SessionInput = match serde_json::from_str(&line) {
                Ok(input) => input,
                Err(e) => {
                    warn!("Ignoring malformed host input: {}", e);
                    report.rejected += 1;
                    continue;
                }
            };
            report.inputs += 1;

            match input {
                SessionInput::Snapshot(snapshot) => {
                    let role = if role_decided {
                        None
                    } else {
                        SessionRole::try_for_url(
                            snapshot.url.as_deref(),
                            &self.registry,
                            &self.config,
                        )
                    };

                    let live = match &page {
                        Some(live) => {
                            live.update(snapshot);
                            live.clone()
                        }
                        None => {
                            let live = Arc::new(LivePage::new(snapshot));
                            page = Some(live.clone());
                            live
                        }
                    };

                    match role {
                        Some(role) => {
                            info!("Page session started as {:?}", role);
                            role_decided = true;
                            report.role = role;
                            match role {
                                SessionRole::Capture(platform) => {
                                    let wiring = self.start_capture(platform, live);
                                    send_event(&wiring, PageEvent::Mutation).await;
                                    capture = Some(wiring);
                                }
                                SessionRole::Bridge => {
                                    let bridge = CredentialBridge::from_config(
                                        live,
                                        self.relay.clone(),
                                        &self.config.bridge,
                                    );
                                    report.bridge = Some(bridge.sync_once().await);
                                }
                                SessionRole::Passive => {}
                            }
                        }
                        None if !role_decided => debug!("Snapshot without a URL, role pending"),
                        None => {
                            if let Some(wiring) = &capture {
                                send_event(wiring, PageEvent::Mutation).await;
                            }
                        }
                    }
                }
                SessionInput::Click { node } => match &capture {
                    Some(wiring) => send_event(wiring, PageEvent::Click(node)).await,
                    None => debug!("Click on {} outside a capture session", node),
                },
            }
        }

        if let Some(wiring) = capture {
            drop(wiring.events);
            report.state = match wiring.task.await {
                Ok(state) => state,
                Err(e) => {
                    warn!("Capture controller stopped: {}", e);
                    wiring.controller.state()
                }
            };
        }

        debug!("Page session finished: {:?}", report);
        Ok(report)
    }

    fn start_capture(&self, platform: Platform, page: Arc<LivePage>) -> CaptureWiring {
        let phrases = self.config.adapters.phrases_for(platform);
        let adapter = adapter_for(platform, &phrases);
        let controller = Arc::new(CaptureController::new(
            Arc::from(adapter),
            page,
            self.relay.clone(),
            ControllerTiming::from(&self.config.timing),
        ));

        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let task = tokio::spawn(controller.clone().run(rx));

        CaptureWiring {
            controller,
            events,
            task,
        }
    }
}

async fn send_event(wiring: &CaptureWiring, event: PageEvent) {
    if wiring.events.send(event).await.is_err() {
        debug!("Controller no longer listening");
    }
}
