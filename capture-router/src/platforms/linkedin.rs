//! LinkedIn Easy Apply.
//!
//! Jobs open either on `/jobs/view/{id}` or inside the search split view,
//! where the selected posting is carried in `currentJobId`. Both collapse to
//! the same canonical view URL.

use super::{page_url, AdapterProfile, ConfirmationMatcher, PlatformAdapter, TitleLayout};
use crate::page::Page;
use lazy_static::lazy_static;
use regex::Regex;
use relay_service::Platform;

const CONFIRMATION_PHRASES: &[&str] = &[
    "your application was sent",
    "application sent",
    "application submitted",
];

lazy_static! {
    static ref JOB_VIEW_PATH: Regex = Regex::new(r"/jobs/view/(?:[^/]*-)?(\d+)").unwrap();
}

pub struct LinkedinAdapter {
    profile: AdapterProfile,
}

impl LinkedinAdapter {
    pub fn new() -> Self {
        Self::with_phrases(&[])
    }

    pub fn with_phrases(extra: &[String]) -> Self {
        let mut confirmation = ConfirmationMatcher::new(CONFIRMATION_PHRASES);
        confirmation.extend(extra);

        Self {
            profile: AdapterProfile {
                platform: Platform::Linkedin,
                confirmation,
                title_selectors: &[
                    ".job-details-jobs-unified-top-card__job-title",
                    ".jobs-unified-top-card__job-title",
                    ".top-card-layout__title",
                ],
                company_selectors: &[
                    ".job-details-jobs-unified-top-card__company-name",
                    ".jobs-unified-top-card__company-name",
                    ".topcard__org-name-link",
                ],
                location_selectors: &[
                    ".job-details-jobs-unified-top-card__primary-description-container .tvm__text",
                    ".jobs-unified-top-card__bullet",
                    ".topcard__flavor--bullet",
                ],
                apply_click_selectors: &[
                    "button.jobs-apply-button",
                    "button[aria-label='Submit application']",
                    "button[data-live-test-easy-apply-submit-button]",
                ],
                // "Senior Engineer | Acme | LinkedIn"
                title_layout: TitleLayout {
                    separator: " | ",
                    title_index: 0,
                    company_index: Some(1),
                },
            },
        }
    }
}

impl Default for LinkedinAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for LinkedinAdapter {
    fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    fn canonical_url(&self, page: &dyn Page) -> Option<String> {
        let url = page_url(page)?;

        let job_id = url
            .query_pairs()
            .find(|(key, _)| key == "currentJobId")
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .or_else(|| {
                JOB_VIEW_PATH
                    .captures(url.path())
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })?;

        Some(format!("https://www.linkedin.com/jobs/view/{}/", job_id))
    }
}
