//! Per-site detection and extraction.
//!
//! Each supported job site gets one adapter implementing [`PlatformAdapter`]:
//! - LinkedIn: Easy Apply modal
//! - Indeed: Indeed Apply flow
//! - Greenhouse: hosted job boards
//! - Lever: hosted job postings
//!
//! Exactly one adapter is wired per page, chosen from the host name.
//! Adapter reads never fail: a page error becomes an absent field.

pub mod greenhouse;
pub mod indeed;
pub mod lever;
pub mod linkedin;

use crate::page::Page;
use crate::types::{JobDetails, PageError};
use relay_service::Platform;
use std::collections::HashMap;
use tracing::debug;

pub use greenhouse::GreenhouseAdapter;
pub use indeed::IndeedAdapter;
pub use lever::LeverAdapter;
pub use linkedin::LinkedinAdapter;

const CANONICAL_LINK: &str = "link[rel=canonical]";

/// Case-insensitive phrase matcher over page text
#[derive(Debug, Clone, Default)]
pub struct ConfirmationMatcher {
    phrases: Vec<String>,
}

impl ConfirmationMatcher {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// Add phrases, e.g. from configuration
    pub fn extend<I, S>(&mut self, phrases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for phrase in phrases {
            let phrase = phrase.as_ref().trim().to_lowercase();
            if !phrase.is_empty() && !self.phrases.contains(&phrase) {
                self.phrases.push(phrase);
            }
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.phrases.iter().any(|p| haystack.contains(p.as_str()))
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

/// How a site lays out its `<title>`
#[derive(Debug, Clone, Copy)]
pub struct TitleLayout {
    pub separator: &'static str,
    pub title_index: usize,
    pub company_index: Option<usize>,
}

/// Static site knowledge shared by the default detect/extract logic
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub platform: Platform,
    pub confirmation: ConfirmationMatcher,
    pub title_selectors: &'static [&'static str],
    pub company_selectors: &'static [&'static str],
    pub location_selectors: &'static [&'static str],
    pub apply_click_selectors: &'static [&'static str],
    pub title_layout: TitleLayout,
}

/// Site-specific capability wired into a capture controller
pub trait PlatformAdapter: Send + Sync {
    fn profile(&self) -> &AdapterProfile;

    fn platform(&self) -> Platform {
        self.profile().platform
    }

    /// True once confirmation text appears anywhere in the body
    fn detect(&self, page: &dyn Page) -> bool {
        read_or_none(page.body_text(), "body text")
            .map(|text| self.profile().confirmation.matches(&text))
            .unwrap_or(false)
    }

    /// Best-effort metadata; absent fields are left for the backend to fill
    fn extract(&self, page: &dyn Page) -> JobDetails {
        let profile = self.profile();
        let layout = profile.title_layout;
        JobDetails {
            title: first_text(page, profile.title_selectors)
                .or_else(|| title_segment(page, layout.separator, layout.title_index)),
            company: first_text(page, profile.company_selectors).or_else(|| {
                layout
                    .company_index
                    .and_then(|index| title_segment(page, layout.separator, index))
            }),
            location: first_text(page, profile.location_selectors),
            job_url: self.canonical_url(page),
        }
    }

    /// Stable posting URL, independent of tracking parameters
    fn canonical_url(&self, page: &dyn Page) -> Option<String> {
        canonical_link(page)
    }

    fn apply_click_selectors(&self) -> &[&'static str] {
        self.profile().apply_click_selectors
    }
}

/// Build the adapter for a platform, adding any configured phrases
pub fn adapter_for(platform: Platform, extra_phrases: &[String]) -> Box<dyn PlatformAdapter> {
    match platform {
        Platform::Linkedin => Box::new(LinkedinAdapter::with_phrases(extra_phrases)),
        Platform::Indeed => Box::new(IndeedAdapter::with_phrases(extra_phrases)),
        Platform::Greenhouse => Box::new(GreenhouseAdapter::with_phrases(extra_phrases)),
        Platform::Lever => Box::new(LeverAdapter::with_phrases(extra_phrases)),
    }
}

/// Registry of job-site hosts and the platform that handles them
pub struct PlatformRegistry {
    /// Host suffix -> platform
    hosts: HashMap<String, Platform>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        let mut hosts = HashMap::new();

        hosts.insert("linkedin.com".to_string(), Platform::Linkedin);

        // Indeed runs country sites on subdomains (uk.indeed.com, ca.indeed.com)
        hosts.insert("indeed.com".to_string(), Platform::Indeed);
        hosts.insert("smartapply.indeed.com".to_string(), Platform::Indeed);

        hosts.insert("boards.greenhouse.io".to_string(), Platform::Greenhouse);
        hosts.insert("job-boards.greenhouse.io".to_string(), Platform::Greenhouse);

        hosts.insert("jobs.lever.co".to_string(), Platform::Lever);

        Self { hosts }
    }

    /// Determine the platform for a page host
    pub fn platform_for_host(&self, host: &str) -> Option<Platform> {
        let host = host.trim().trim_end_matches('.').to_lowercase();
        self.hosts
            .iter()
            .filter(|(suffix, _)| host == **suffix || host.ends_with(&format!(".{}", suffix)))
            .max_by_key(|(suffix, _)| suffix.len())
            .map(|(_, platform)| *platform)
    }

    /// Determine the platform for a full page URL
    pub fn platform_for_url(&self, page_url: &str) -> Option<Platform> {
        let parsed = url::Url::parse(page_url).ok()?;
        self.platform_for_host(parsed.host_str()?)
    }

    /// Add a custom host, e.g. a company's self-hosted board
    pub fn add_host(&mut self, host: &str, platform: Platform) {
        self.hosts.insert(host.to_lowercase(), platform);
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Swallow a page read failure, logging it
pub(crate) fn read_or_none<T>(result: Result<Option<T>, PageError>, what: &str) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            debug!("Could not read {}: {}", what, e);
            None
        }
    }
}

/// Collapse whitespace; empty text counts as absent
pub(crate) fn clean_text(text: &str) -> Option<String> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Text of the first selector that yields any
pub(crate) fn first_text(page: &dyn Page, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        read_or_none(page.query_text(selector), selector).and_then(|t| clean_text(&t))
    })
}

/// One segment of the document title, split on the site's separator
pub(crate) fn title_segment(page: &dyn Page, separator: &str, index: usize) -> Option<String> {
    let title = read_or_none(page.document_title(), "document title")?;
    title.split(separator).nth(index).and_then(clean_text)
}

/// `<link rel="canonical">` href, when it is an absolute URL
pub(crate) fn canonical_link(page: &dyn Page) -> Option<String> {
    let href = read_or_none(page.query_attr(CANONICAL_LINK, "href"), CANONICAL_LINK)?;
    url::Url::parse(href.trim()).ok().map(String::from)
}

/// Parsed page address
pub(crate) fn page_url(page: &dyn Page) -> Option<url::Url> {
    let raw = read_or_none(page.url(), "page url")?;
    url::Url::parse(&raw).ok()
}

/// "acme-corp" -> "Acme Corp"
pub(crate) fn humanize_slug(slug: &str) -> Option<String> {
    let words: Vec<String> = slug
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::page::PageSnapshot;
    use crate::types::NodeId;

    /// Page whose every read fails
    pub(crate) struct BrokenPage;

    impl Page for BrokenPage {
        fn url(&self) -> Result<Option<String>, PageError> {
            Err(PageError::Unavailable("detached".to_string()))
        }
        fn document_title(&self) -> Result<Option<String>, PageError> {
            Err(PageError::Unavailable("detached".to_string()))
        }
        fn body_text(&self) -> Result<Option<String>, PageError> {
            Err(PageError::Unavailable("detached".to_string()))
        }
        fn query_text(&self, _selector: &str) -> Result<Option<String>, PageError> {
            Err(PageError::Unavailable("detached".to_string()))
        }
        fn query_attr(&self, _selector: &str, _attr: &str) -> Result<Option<String>, PageError> {
            Err(PageError::Unavailable("detached".to_string()))
        }
        fn query_all(&self, _selector: &str) -> Result<Vec<NodeId>, PageError> {
            Err(PageError::Unavailable("detached".to_string()))
        }
    }

    #[test]
    fn test_confirmation_is_case_insensitive_substring() {
        let matcher = ConfirmationMatcher::new(["application submitted", "thanks for applying"]);
        assert!(matcher.matches("Thanks for applying!"));
        assert!(matcher.matches("Your APPLICATION SUBMITTED successfully"));
        assert!(!matcher.matches("Apply now"));
        assert!(!matcher.matches(""));
    }

    #[test]
    fn test_matcher_ignores_blank_and_duplicate_phrases() {
        let mut matcher = ConfirmationMatcher::new(["", "  Applied  "]);
        matcher.extend(["applied", "you're in"]);
        assert_eq!(matcher.phrases(), ["applied", "you're in"]);
    }

    #[test]
    fn test_every_adapter_survives_any_page_shape() {
        let empty = PageSnapshot::default();
        let no_body = PageSnapshot::new("not a url").with_title("");

        for platform in Platform::ALL {
            let adapter = adapter_for(platform, &[]);
            for page in [&empty as &dyn Page, &no_body, &BrokenPage] {
                assert!(!adapter.detect(page));
                let details = adapter.extract(page);
                assert!(details.is_empty(), "{:?}: {:?}", platform, details);
            }
            assert!(!adapter.apply_click_selectors().is_empty());
        }
    }

    #[test]
    fn test_extra_phrases_extend_detection() {
        let adapter = adapter_for(Platform::Lever, &["Merci pour votre candidature".to_string()]);
        let page = PageSnapshot::new("https://jobs.lever.co/acme/1")
            .with_body("merci pour votre candidature !");
        assert!(adapter.detect(&page));
    }

    #[test]
    fn test_registry_hosts() {
        let registry = PlatformRegistry::new();

        assert_eq!(
            registry.platform_for_host("www.linkedin.com"),
            Some(Platform::Linkedin)
        );
        assert_eq!(
            registry.platform_for_host("uk.indeed.com"),
            Some(Platform::Indeed)
        );
        assert_eq!(
            registry.platform_for_host("smartapply.indeed.com"),
            Some(Platform::Indeed)
        );
        assert_eq!(
            registry.platform_for_url("https://job-boards.greenhouse.io/acme/jobs/1"),
            Some(Platform::Greenhouse)
        );
        assert_eq!(
            registry.platform_for_url("https://jobs.lever.co/acme/abc"),
            Some(Platform::Lever)
        );
    }

    #[test]
    fn test_registry_rejects_lookalikes() {
        let registry = PlatformRegistry::new();
        assert_eq!(registry.platform_for_host("notlinkedin.com"), None);
        assert_eq!(registry.platform_for_host("lever.co"), None);
        assert_eq!(registry.platform_for_url("not a url"), None);
    }

    #[test]
    fn test_registry_custom_host() {
        let mut registry = PlatformRegistry::new();
        registry.add_host("careers.acme.com", Platform::Greenhouse);
        assert_eq!(
            registry.platform_for_host("careers.acme.com"),
            Some(Platform::Greenhouse)
        );
    }

    #[test]
    fn test_humanize_slug() {
        assert_eq!(humanize_slug("acme-corp").as_deref(), Some("Acme Corp"));
        assert_eq!(humanize_slug("acme").as_deref(), Some("Acme"));
        assert_eq!(humanize_slug("--"), None);
    }

    #[test]
    fn test_canonical_link_requires_absolute_url() {
        let page = PageSnapshot::default().with_attr(CANONICAL_LINK, "l", "href", "/jobs/1");
        assert_eq!(canonical_link(&page), None);

        let page = PageSnapshot::default().with_attr(
            CANONICAL_LINK,
            "l",
            "href",
            "https://example.com/jobs/1",
        );
        assert_eq!(
            canonical_link(&page).as_deref(),
            Some("https://example.com/jobs/1")
        );
    }
}
