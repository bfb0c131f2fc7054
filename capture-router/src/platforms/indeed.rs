//! Indeed Apply.
//!
//! The apply flow runs on `smartapply.indeed.com` and ends on a
//! confirmation step; the posting key travels as `jk` (view page) or `vjk`
//! (search split view).

use super::{page_url, AdapterProfile, ConfirmationMatcher, PlatformAdapter, TitleLayout};
use crate::page::Page;
use relay_service::Platform;

const CONFIRMATION_PHRASES: &[&str] = &[
    "your application has been submitted",
    "application submitted",
    "you've applied to this job",
];

pub struct IndeedAdapter {
    profile: AdapterProfile,
}

impl IndeedAdapter {
    pub fn new() -> Self {
        Self::with_phrases(&[])
    }

    pub fn with_phrases(extra: &[String]) -> Self {
        let mut confirmation = ConfirmationMatcher::new(CONFIRMATION_PHRASES);
        confirmation.extend(extra);

        Self {
            profile: AdapterProfile {
                platform: Platform::Indeed,
                confirmation,
                title_selectors: &[
                    "[data-testid='jobsearch-JobInfoHeader-title']",
                    "h1.jobsearch-JobInfoHeader-title",
                    ".ia-JobHeader-title",
                ],
                company_selectors: &[
                    "[data-testid='inlineHeader-companyName']",
                    "[data-company-name='true']",
                    ".ia-JobHeader-information span",
                ],
                location_selectors: &[
                    "[data-testid='inlineHeader-companyLocation']",
                    "[data-testid='job-location']",
                ],
                apply_click_selectors: &[
                    "#indeedApplyButton",
                    "button.ia-continueButton",
                    "button[data-testid='submit-application-button']",
                ],
                // "Rust Developer - Acme - Remote | Indeed.com"
                title_layout: TitleLayout {
                    separator: " - ",
                    title_index: 0,
                    company_index: Some(1),
                },
            },
        }
    }
}

impl Default for IndeedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for IndeedAdapter {
    fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    fn canonical_url(&self, page: &dyn Page) -> Option<String> {
        let url = page_url(page)?;
        let job_key = ["jk", "vjk"].iter().find_map(|name| {
            url.query_pairs()
                .find(|(key, value)| key == name && !value.is_empty())
                .map(|(_, value)| value.into_owned())
        })?;

        let mut canonical = url::Url::parse("https://www.indeed.com/viewjob").ok()?;
        canonical.query_pairs_mut().append_pair("jk", &job_key);
        Some(canonical.into())
    }
}
