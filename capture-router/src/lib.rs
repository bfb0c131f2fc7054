//! Capture Router - page-side application capture
//!
//! Watches a job site page for a completed application and relays it, once,
//! to the relay service:
//!
//! - **Platforms**: per-site detection and extraction (LinkedIn, Indeed,
//!   Greenhouse, Lever)
//! - **Controller**: the per-page Idle -> Sent state machine
//! - **Bridge**: one-shot credential sync from the tracker web app
//!
//! # Architecture
//!
//! The host streams page snapshots and clicks into a [`PageSession`]. The
//! session picks a role from the page host, wires an adapter into a
//! [`CaptureController`] and talks to the relay through a [`RelaySender`].

pub mod bridge;
pub mod config;
pub mod controller;
pub mod page;
pub mod platforms;
pub mod relay_link;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use bridge::{BridgeOutcome, CredentialBridge};
pub use config::CaptureConfig;
pub use controller::{CaptureController, ControllerTiming};
pub use page::{ElementSnapshot, LivePage, Page, PageSnapshot, PageStorage};
pub use platforms::{adapter_for, PlatformAdapter, PlatformRegistry};
pub use relay_link::{LinkError, RelaySender, SocketRelay};
pub use session::{PageSession, SessionInput, SessionReport, SessionRole};
pub use types::{
    CaptureOutcome, CaptureState, CaptureTrigger, JobDetails, NodeId, PageError, PageEvent,
};
