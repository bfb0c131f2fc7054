//! Per-page capture controller.
//!
//! Watches one page for a completed application and emits exactly one
//! `IMPORT_APPLICATION`. Triggers are DOM mutations, two fixed-delay polls,
//! and clicks on the platform's apply buttons. The `Sent` latch is a
//! compare-and-set taken only after a job URL resolves, so a trigger that
//! cannot emit never blocks a later one.

use crate::config::TimingConfig;
use crate::page::Page;
use crate::platforms::{read_or_none, PlatformAdapter};
use crate::relay_link::RelaySender;
use crate::types::{CaptureOutcome, CaptureState, CaptureTrigger, NodeId, PageEvent};
use relay_service::{CaptureEvent, RelayRequest};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

/// Delays driving the fallback triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTiming {
    pub short_poll: Duration,
    pub medium_poll: Duration,
    pub settle_delay: Duration,
}

impl Default for ControllerTiming {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for ControllerTiming {
    fn from(config: &TimingConfig) -> Self {
        Self {
            short_poll: config.short_poll(),
            medium_poll: config.medium_poll(),
            settle_delay: config.settle_delay(),
        }
    }
}

pub struct CaptureController {
    adapter: Arc<dyn PlatformAdapter>,
    page: Arc<dyn Page>,
    relay: Arc<dyn RelaySender>,
    timing: ControllerTiming,
    /// Idle -> Sent latch
    sent: AtomicBool,
    /// A settled click found no job URL; the next trigger may emit without detection
    pending_click: AtomicBool,
    /// Apply-button nodes already wired
    bound: Mutex<HashSet<NodeId>>,
}

impl CaptureController {
    pub fn new(
        adapter: Arc<dyn PlatformAdapter>,
        page: Arc<dyn Page>,
        relay: Arc<dyn RelaySender>,
        timing: ControllerTiming,
    ) -> Self {
        Self {
            adapter,
            page,
            relay,
            timing,
            sent: AtomicBool::new(false),
            pending_click: AtomicBool::new(false),
            bound: Mutex::new(HashSet::new()),
        }
    }

    pub fn state(&self) -> CaptureState {
        if self.sent.load(Ordering::SeqCst) {
            CaptureState::Sent
        } else {
            CaptureState::Idle
        }
    }

    pub fn timing(&self) -> ControllerTiming {
        self.timing
    }

    /// Wire every apply button currently on the page. Returns how many were new.
    pub fn bind_apply_buttons(&self) -> usize {
        let mut found = Vec::new();
        for selector in self.adapter.apply_click_selectors() {
            if let Ok(nodes) = self.page.query_all(selector) {
                found.extend(nodes);
            }
        }

        let mut bound = self
            .bound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let newly_bound = found.into_iter().filter(|node| bound.insert(node.clone())).count();
        if newly_bound > 0 {
            debug!("Bound {} apply button(s), {} total", newly_bound, bound.len());
        }
        newly_bound
    }

    pub fn is_bound(&self, node: &str) -> bool {
        self.bound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(node)
    }

    /// Handle one trigger to completion (click triggers include the settle delay)
    pub async fn on_trigger(&self, trigger: CaptureTrigger) -> CaptureOutcome {
        trace!("Trigger: {:?}", trigger);
        match trigger {
            CaptureTrigger::Mutation => {
                if self.sent.load(Ordering::SeqCst) {
                    return CaptureOutcome::AlreadySent;
                }
                self.bind_apply_buttons();
                self.check(CaptureTrigger::Mutation).await
            }
            CaptureTrigger::Poll { .. } => self.check(trigger).await,
            CaptureTrigger::ApplyClick { node } => self.on_click(&node).await,
        }
    }

    /// Detection-gated emission for mutations and polls
    pub async fn check(&self, trigger: CaptureTrigger) -> CaptureOutcome {
        if self.sent.load(Ordering::SeqCst) {
            return CaptureOutcome::AlreadySent;
        }

        let clicked = self.pending_click.load(Ordering::SeqCst);
        if !clicked && !self.adapter.detect(self.page.as_ref()) {
            return CaptureOutcome::NotDetected;
        }

        self.try_emit(&trigger).await
    }

    /// Click on a node: only bound apply buttons count, and they emit after
    /// the settle delay whether or not confirmation text appeared
    pub async fn on_click(&self, node: &str) -> CaptureOutcome {
        if self.sent.load(Ordering::SeqCst) {
            return CaptureOutcome::AlreadySent;
        }
        if !self.is_bound(node) {
            trace!("Click on unbound node {}", node);
            return CaptureOutcome::Ignored;
        }

        tokio::time::sleep(self.timing.settle_delay).await;

        let trigger = CaptureTrigger::ApplyClick {
            node: node.to_string(),
        };
        let outcome = self.try_emit(&trigger).await;
        if outcome == CaptureOutcome::Deferred {
            debug!("Apply click settled without a job URL; waiting for the next trigger");
            self.pending_click.store(true, Ordering::SeqCst);
        }
        outcome
    }

    /// Resolve the job URL, take the latch, and send the capture
    async fn try_emit(&self, trigger: &CaptureTrigger) -> CaptureOutcome {
        if self.sent.load(Ordering::SeqCst) {
            return CaptureOutcome::AlreadySent;
        }

        let page = self.page.as_ref();
        let details = self.adapter.extract(page);
        let job_url = details
            .job_url
            .clone()
            .or_else(|| read_or_none(page.url(), "page url"))
            .filter(|url| !url.trim().is_empty());

        let Some(job_url) = job_url else {
            debug!("No job URL resolvable on {} trigger", trigger.as_str());
            return CaptureOutcome::Deferred;
        };

        if self
            .sent
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return CaptureOutcome::AlreadySent;
        }
        self.pending_click.store(false, Ordering::SeqCst);

        let platform = self.adapter.platform();
        info!(
            "Application captured on {} via {}: {}",
            platform.as_str(),
            trigger.as_str(),
            job_url
        );

        let event = CaptureEvent::applied(platform, job_url)
            .with_title(details.title)
            .with_company(details.company)
            .with_location(details.location);

        match self
            .relay
            .send(RelayRequest::ImportApplication { payload: event })
            .await
        {
            Ok(response) if response.ok => debug!("Relay accepted capture"),
            Ok(response) => warn!(
                "Relay rejected capture: {}",
                response.error.as_deref().unwrap_or("unknown error")
            ),
            Err(e) => warn!("Failed to reach relay: {}", e),
        }

        CaptureOutcome::Emitted
    }

    /// Drive the controller from host events until the channel closes.
    ///
    /// Schedules both polls, handles mutations inline and runs each click on
    /// its own task so a settle delay never holds up mutation handling.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<PageEvent>) -> CaptureState {
        self.bind_apply_buttons();

        let mut tasks = JoinSet::new();
        for delay in [self.timing.short_poll, self.timing.medium_poll] {
            let controller = Arc::clone(&self);
            tasks.spawn(async move {
                tokio::time::sleep(delay).await;
                let delay_ms = delay.as_millis() as u64;
                controller.on_trigger(CaptureTrigger::Poll { delay_ms }).await
            });
        }

        while let Some(event) = events.recv().await {
            match event {
                PageEvent::Mutation => {
                    self.on_trigger(CaptureTrigger::Mutation).await;
                }
                PageEvent::Click(node) => {
                    let controller = Arc::clone(&self);
                    tasks.spawn(async move {
                        controller.on_trigger(CaptureTrigger::ApplyClick { node }).await
                    });
                }
            }
        }

        // Late timers and clicks still get their chance; once Sent they are no-ops
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Capture task failed: {}", e);
            }
        }

        self.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{LivePage, PageSnapshot};
    use crate::platforms::{GreenhouseAdapter, LeverAdapter, LinkedinAdapter};
    use crate::relay_link::tests::RecordingSender;
    use relay_service::{Platform, RelayResponse};

    const LEVER_JOB: &str = "https://jobs.lever.co/acme/5f0c2a9e";

    struct Harness {
        page: Arc<LivePage>,
        relay: Arc<RecordingSender>,
        controller: Arc<CaptureController>,
    }

    fn harness(adapter: Arc<dyn PlatformAdapter>, snapshot: PageSnapshot) -> Harness {
        harness_with(adapter, snapshot, RecordingSender::new())
    }

    fn harness_with(
        adapter: Arc<dyn PlatformAdapter>,
        snapshot: PageSnapshot,
        relay: RecordingSender,
    ) -> Harness {
        let page = Arc::new(LivePage::new(snapshot));
        let relay = Arc::new(relay);
        let controller = Arc::new(CaptureController::new(
            adapter,
            page.clone(),
            relay.clone(),
            ControllerTiming::default(),
        ));
        Harness {
            page,
            relay,
            controller,
        }
    }

    fn imported(relay: &RecordingSender) -> Vec<CaptureEvent> {
        relay
            .sent()
            .into_iter()
            .filter_map(|request| match request {
                RelayRequest::ImportApplication { payload } => Some(payload),
                _ => None,
            })
            .collect()
    }

    fn lever_confirmation() -> PageSnapshot {
        PageSnapshot::new(&format!("{}/thanks", LEVER_JOB))
            .with_title("Acme - Backend Engineer")
            .with_body("Application submitted! Thanks for applying.")
    }

    #[tokio::test]
    async fn test_mutation_with_confirmation_emits_once() {
        let h = harness(Arc::new(LeverAdapter::new()), lever_confirmation());

        assert_eq!(
            h.controller.on_trigger(CaptureTrigger::Mutation).await,
            CaptureOutcome::Emitted
        );
        assert_eq!(h.controller.state(), CaptureState::Sent);

        for trigger in [
            CaptureTrigger::Mutation,
            CaptureTrigger::Poll { delay_ms: 1500 },
            CaptureTrigger::Poll { delay_ms: 4000 },
        ] {
            assert_eq!(
                h.controller.on_trigger(trigger).await,
                CaptureOutcome::AlreadySent
            );
        }

        let events = imported(&h.relay);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].platform, Platform::Lever);
        assert_eq!(events[0].job_url, LEVER_JOB);
        assert_eq!(events[0].title.as_deref(), Some("Backend Engineer"));
        assert_eq!(events[0].company.as_deref(), Some("Acme"));
        assert_eq!(events[0].extra.source, "lever-adapter");
    }

    #[tokio::test]
    async fn test_no_confirmation_stays_idle() {
        let h = harness(
            Arc::new(LeverAdapter::new()),
            PageSnapshot::new(LEVER_JOB).with_body("Apply for this job"),
        );
        assert_eq!(
            h.controller.on_trigger(CaptureTrigger::Mutation).await,
            CaptureOutcome::NotDetected
        );
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert!(h.relay.sent().is_empty());
    }

    #[tokio::test]
    async fn test_page_url_used_when_adapter_has_none() {
        let page = PageSnapshot::new("https://www.linkedin.com/jobs/collections/recommended/")
            .with_body("Your application was sent to Acme");
        let h = harness(Arc::new(LinkedinAdapter::new()), page);

        assert_eq!(
            h.controller.on_trigger(CaptureTrigger::Mutation).await,
            CaptureOutcome::Emitted
        );
        assert_eq!(
            imported(&h.relay)[0].job_url,
            "https://www.linkedin.com/jobs/collections/recommended/"
        );
    }

    #[tokio::test]
    async fn test_detection_without_url_defers() {
        let page = PageSnapshot::default().with_body("Thank you for applying");
        let h = harness(Arc::new(GreenhouseAdapter::new()), page);

        assert_eq!(
            h.controller.on_trigger(CaptureTrigger::Mutation).await,
            CaptureOutcome::Deferred
        );
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert!(h.relay.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_binds_apply_buttons_idempotently() {
        let page = PageSnapshot::new(LEVER_JOB)
            .with_element("#btn-submit", "n1", "Submit application")
            .with_element("a.postings-btn", "n2", "Apply");
        let h = harness(Arc::new(LeverAdapter::new()), page);

        assert_eq!(h.controller.bind_apply_buttons(), 2);
        assert_eq!(h.controller.bind_apply_buttons(), 0);

        h.page.update(
            PageSnapshot::new(LEVER_JOB)
                .with_element("#btn-submit", "n1", "Submit application")
                .with_element("#btn-submit", "n3", "Submit application"),
        );
        h.controller.on_trigger(CaptureTrigger::Mutation).await;
        assert!(h.controller.is_bound("n1"));
        assert!(h.controller.is_bound("n3"));
        assert!(!h.controller.is_bound("n4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_on_unbound_node_is_ignored() {
        let h = harness(Arc::new(LeverAdapter::new()), lever_confirmation());
        assert_eq!(
            h.controller.on_click("nowhere").await,
            CaptureOutcome::Ignored
        );
        assert!(h.relay.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_click_emits_after_settle_without_confirmation() {
        let page = PageSnapshot::new(LEVER_JOB).with_element("#btn-submit", "submit", "Submit");
        let h = harness(Arc::new(LeverAdapter::new()), page);
        h.controller.bind_apply_buttons();

        let start = tokio::time::Instant::now();
        assert_eq!(h.controller.on_click("submit").await, CaptureOutcome::Emitted);
        assert!(start.elapsed() >= Duration::from_millis(1200));
        assert_eq!(imported(&h.relay).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_click_resolves_on_next_trigger() {
        let page = PageSnapshot::default().with_element("#btn-submit", "submit", "Submit");
        let h = harness(Arc::new(LeverAdapter::new()), page);
        h.controller.bind_apply_buttons();

        assert_eq!(h.controller.on_click("submit").await, CaptureOutcome::Deferred);
        assert_eq!(h.controller.state(), CaptureState::Idle);

        // URL appears, still no confirmation text
        h.page.update(PageSnapshot::new(LEVER_JOB));
        assert_eq!(
            h.controller.on_trigger(CaptureTrigger::Mutation).await,
            CaptureOutcome::Emitted
        );
        assert_eq!(
            h.controller.on_trigger(CaptureTrigger::Poll { delay_ms: 4000 }).await,
            CaptureOutcome::AlreadySent
        );
        assert_eq!(imported(&h.relay).len(), 1);
    }

    #[tokio::test]
    async fn test_relay_failure_does_not_resend() {
        let h = harness_with(
            Arc::new(LeverAdapter::new()),
            lever_confirmation(),
            RecordingSender::failing(),
        );

        assert_eq!(
            h.controller.on_trigger(CaptureTrigger::Mutation).await,
            CaptureOutcome::Emitted
        );
        assert_eq!(
            h.controller.on_trigger(CaptureTrigger::Mutation).await,
            CaptureOutcome::AlreadySent
        );
        assert_eq!(h.relay.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_relay_rejection_stays_sent() {
        let relay = RecordingSender::new();
        relay.push_reply(Ok(RelayResponse::error(
            "not authenticated: token or uuid missing",
        )));
        let h = harness_with(Arc::new(LeverAdapter::new()), lever_confirmation(), relay);

        h.controller.on_trigger(CaptureTrigger::Mutation).await;
        assert_eq!(h.controller.state(), CaptureState::Sent);
        assert_eq!(h.relay.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_triggers_emit_once() {
        let page = lever_confirmation().with_element("#btn-submit", "submit", "Submit");
        let h = harness(Arc::new(LeverAdapter::new()), page);
        h.controller.bind_apply_buttons();

        let mut tasks = JoinSet::new();
        for i in 0..8 {
            let controller = h.controller.clone();
            tasks.spawn(async move {
                let trigger = match i % 3 {
                    0 => CaptureTrigger::Mutation,
                    1 => CaptureTrigger::Poll { delay_ms: 1500 },
                    _ => CaptureTrigger::ApplyClick {
                        node: "submit".to_string(),
                    },
                };
                controller.on_trigger(trigger).await
            });
        }

        let mut emitted = 0;
        while let Some(outcome) = tasks.join_next().await {
            if outcome.unwrap() == CaptureOutcome::Emitted {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 1);
        assert_eq!(imported(&h.relay).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_poll_catches_confirmation_without_mutation() {
        let h = harness(
            Arc::new(LeverAdapter::new()),
            PageSnapshot::new(LEVER_JOB).with_body("Apply for this job"),
        );
        let (tx, rx) = mpsc::channel(8);
        let run = tokio::spawn(h.controller.clone().run(rx));

        // Confirmation renders between the two polls
        tokio::time::sleep(Duration::from_millis(2000)).await;
        h.page.update(lever_confirmation());
        drop(tx);

        assert_eq!(run.await.unwrap(), CaptureState::Sent);
        assert_eq!(imported(&h.relay).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_handles_click_events() {
        let page = PageSnapshot::new(LEVER_JOB).with_element("#btn-submit", "submit", "Submit");
        let h = harness(Arc::new(LeverAdapter::new()), page);
        let (tx, rx) = mpsc::channel(8);
        let run = tokio::spawn(h.controller.clone().run(rx));

        tx.send(PageEvent::Click("elsewhere".to_string())).await.unwrap();
        tx.send(PageEvent::Click("submit".to_string())).await.unwrap();
        tx.send(PageEvent::Mutation).await.unwrap();
        drop(tx);

        assert_eq!(run.await.unwrap(), CaptureState::Sent);
        assert_eq!(imported(&h.relay).len(), 1);
    }
}
