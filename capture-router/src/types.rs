//! Core types used throughout the capture engine.
//!
//! This module defines the page-side data structures: extracted job details,
//! detection triggers, and the controller's state and outcomes.

use serde::{Deserialize, Serialize};

/// Host-assigned identifier for a DOM node
pub type NodeId = String;

/// Best-effort job metadata read from the page. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Canonical posting URL, when the adapter can derive one
    pub job_url: Option<String>,
}

impl JobDetails {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.company.is_none()
            && self.location.is_none()
            && self.job_url.is_none()
    }
}

/// What the host reports to a running controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// The DOM changed
    Mutation,
    /// A node was clicked
    Click(NodeId),
}

/// Events that can lead to a capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTrigger {
    /// DOM mutation observed
    Mutation,
    /// Fixed-delay re-check after start
    Poll { delay_ms: u64 },
    /// Click on a bound apply button
    ApplyClick { node: NodeId },
}

impl CaptureTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureTrigger::Mutation => "mutation",
            CaptureTrigger::Poll { .. } => "poll",
            CaptureTrigger::ApplyClick { .. } => "apply-click",
        }
    }
}

/// Per-page capture state. `Sent` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    Sent,
}

/// Result of handling one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// This trigger produced the page's one capture
    Emitted,
    /// A capture was already sent; no-op
    AlreadySent,
    /// No confirmation on the page yet
    NotDetected,
    /// Submission seen but no job URL resolvable yet
    Deferred,
    /// Click on a node that is not a bound apply button
    Ignored,
}

/// Errors reading from the host page
#[derive(Debug, Clone, thiserror::Error)]
pub enum PageError {
    #[error("Page unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_details_empty() {
        assert!(JobDetails::default().is_empty());
        let details = JobDetails {
            company: Some("Acme".to_string()),
            ..JobDetails::default()
        };
        assert!(!details.is_empty());
    }

    #[test]
    fn test_trigger_as_str() {
        assert_eq!(CaptureTrigger::Mutation.as_str(), "mutation");
        assert_eq!(CaptureTrigger::Poll { delay_ms: 1500 }.as_str(), "poll");
        assert_eq!(
            CaptureTrigger::ApplyClick {
                node: "n1".to_string()
            }
            .as_str(),
            "apply-click"
        );
    }
}
