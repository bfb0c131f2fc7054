//! Lever hosted postings on `jobs.lever.co/{company}/{posting}`.
//!
//! The apply form lives at `.../apply` and the confirmation at `.../thanks`;
//! both map back to the posting itself.

use super::{
    clean_text, first_text, humanize_slug, page_url, read_or_none, title_segment, AdapterProfile,
    ConfirmationMatcher, PlatformAdapter, TitleLayout,
};
use crate::page::Page;
use crate::types::JobDetails;
use relay_service::Platform;

const CONFIRMATION_PHRASES: &[&str] = &[
    "application submitted",
    "thanks for applying",
    "your application has been received",
];

const COMPANY_LOGO: &str = ".main-header-logo img";

/// Trailing path steps of the apply flow
const FLOW_SUFFIXES: &[&str] = &["apply", "thanks"];

pub struct LeverAdapter {
    profile: AdapterProfile,
}

impl LeverAdapter {
    pub fn new() -> Self {
        Self::with_phrases(&[])
    }

    pub fn with_phrases(extra: &[String]) -> Self {
        let mut confirmation = ConfirmationMatcher::new(CONFIRMATION_PHRASES);
        confirmation.extend(extra);

        Self {
            profile: AdapterProfile {
                platform: Platform::Lever,
                confirmation,
                title_selectors: &[".posting-headline h2", ".posting-header h2"],
                company_selectors: &[".main-header-text", ".posting-company"],
                location_selectors: &[
                    ".posting-categories .location",
                    ".posting-category.location",
                ],
                apply_click_selectors: &[
                    "#btn-submit",
                    "button.postings-btn[type='submit']",
                    "a.postings-btn",
                ],
                // "Acme - Backend Engineer"
                title_layout: TitleLayout {
                    separator: " - ",
                    title_index: 1,
                    company_index: Some(0),
                },
            },
        }
    }

    /// Company slug and posting id, with apply-flow suffixes dropped
    fn posting(&self, page: &dyn Page) -> Option<(String, String)> {
        let url = page_url(page)?;
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [company, id] => Some((company.to_string(), id.to_string())),
            [company, id, step] if FLOW_SUFFIXES.contains(step) => {
                Some((company.to_string(), id.to_string()))
            }
            _ => None,
        }
    }
}

impl Default for LeverAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for LeverAdapter {
    fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    fn extract(&self, page: &dyn Page) -> JobDetails {
        let profile = self.profile();
        let layout = profile.title_layout;
        let posting = self.posting(page);

        let company = read_or_none(page.query_attr(COMPANY_LOGO, "alt"), COMPANY_LOGO)
            .and_then(|alt| clean_text(&alt))
            .or_else(|| first_text(page, profile.company_selectors))
            .or_else(|| {
                layout
                    .company_index
                    .and_then(|index| title_segment(page, layout.separator, index))
            })
            .or_else(|| posting.as_ref().and_then(|(slug, _)| humanize_slug(slug)));

        JobDetails {
            title: first_text(page, profile.title_selectors)
                .or_else(|| title_segment(page, layout.separator, layout.title_index)),
            company,
            location: first_text(page, profile.location_selectors),
            job_url: self.canonical_url(page),
        }
    }

    fn canonical_url(&self, page: &dyn Page) -> Option<String> {
        let (company, id) = self.posting(page)?;
        Some(format!("https://jobs.lever.co/{}/{}", company, id))
    }
}
