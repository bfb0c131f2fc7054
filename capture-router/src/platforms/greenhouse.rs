//! Greenhouse hosted job boards.
//!
//! Postings live at `/{board}/jobs/{id}` on `boards.greenhouse.io` or
//! `job-boards.greenhouse.io`. The board slug doubles as a company name when
//! the page does not show one.

use super::{
    clean_text, first_text, humanize_slug, page_url, read_or_none, AdapterProfile,
    ConfirmationMatcher, PlatformAdapter, TitleLayout,
};
use crate::page::Page;
use crate::types::JobDetails;
use relay_service::Platform;

const CONFIRMATION_PHRASES: &[&str] = &[
    "thank you for applying",
    "thanks for applying",
    "application has been submitted",
    "we have received your application",
];

/// "Job Application for {title} at {company}"
const TITLE_PREFIX: &str = "job application for ";
const TITLE_COMPANY_SEPARATOR: &str = " at ";

pub struct GreenhouseAdapter {
    profile: AdapterProfile,
}

impl GreenhouseAdapter {
    pub fn new() -> Self {
        Self::with_phrases(&[])
    }

    pub fn with_phrases(extra: &[String]) -> Self {
        let mut confirmation = ConfirmationMatcher::new(CONFIRMATION_PHRASES);
        confirmation.extend(extra);

        Self {
            profile: AdapterProfile {
                platform: Platform::Greenhouse,
                confirmation,
                title_selectors: &["h1.app-title", ".job__title h1", ".job-post h1"],
                company_selectors: &[".company-name", ".job__company"],
                location_selectors: &[".location", ".job__location"],
                apply_click_selectors: &[
                    "#submit_app",
                    "button.application--submit",
                    "button[type='submit'].btn--pill",
                ],
                title_layout: TitleLayout {
                    separator: TITLE_COMPANY_SEPARATOR,
                    title_index: 0,
                    company_index: None,
                },
            },
        }
    }

    /// Board slug and posting id from the page address
    fn posting(&self, page: &dyn Page) -> Option<(String, String)> {
        let url = page_url(page)?;
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let board = segments.next()?.to_string();
        if segments.next()? != "jobs" {
            return None;
        }
        let id = segments.next()?;
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some((board, id.to_string()))
    }
}

impl Default for GreenhouseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Split "Job Application for Rust Engineer at Acme" into its parts
fn parse_document_title(page: &dyn Page) -> (Option<String>, Option<String>) {
    let Some(title) = read_or_none(page.document_title(), "document title") else {
        return (None, None);
    };

    let has_prefix = title
        .get(..TITLE_PREFIX.len())
        .map(|head| head.eq_ignore_ascii_case(TITLE_PREFIX))
        .unwrap_or(false);
    if !has_prefix {
        return (None, None);
    }

    let rest = &title[TITLE_PREFIX.len()..];
    match rest.rfind(TITLE_COMPANY_SEPARATOR) {
        Some(at) => (
            clean_text(&rest[..at]),
            clean_text(&rest[at + TITLE_COMPANY_SEPARATOR.len()..]),
        ),
        None => (clean_text(rest), None),
    }
}

impl PlatformAdapter for GreenhouseAdapter {
    fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    fn extract(&self, page: &dyn Page) -> JobDetails {
        let profile = self.profile();
        let (doc_title, doc_company) = parse_document_title(page);
        let posting = self.posting(page);

        JobDetails {
            title: first_text(page, profile.title_selectors).or(doc_title),
            company: first_text(page, profile.company_selectors)
                .or(doc_company)
                .or_else(|| posting.as_ref().and_then(|(board, _)| humanize_slug(board))),
            location: first_text(page, profile.location_selectors),
            job_url: posting
                .map(|(board, id)| format!("https://boards.greenhouse.io/{}/jobs/{}", board, id))
                .or_else(|| self.canonical_url(page)),
        }
    }
}
