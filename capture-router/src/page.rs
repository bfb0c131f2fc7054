//! Read-only view of the hosted page.
//!
//! The host (the injected content script) evaluates selectors and streams a
//! [`PageSnapshot`] whenever the DOM changes. Adapters only ever see the
//! [`Page`] trait, so every read can fail without taking the engine down.

use crate::types::{NodeId, PageError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// DOM queries available to adapters
pub trait Page: Send + Sync {
    /// Current page address
    fn url(&self) -> Result<Option<String>, PageError>;

    fn document_title(&self) -> Result<Option<String>, PageError>;

    /// Visible text of the document body
    fn body_text(&self) -> Result<Option<String>, PageError>;

    /// Trimmed text of the first matching node with any text
    fn query_text(&self, selector: &str) -> Result<Option<String>, PageError>;

    /// Attribute of the first matching node that carries it
    fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>, PageError>;

    /// All nodes matching a selector
    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, PageError>;
}

/// Page-local persistent storage (the hosted app's `localStorage`)
pub trait PageStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, PageError>;
}

/// One node as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub node: NodeId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attrs: HashMap<String, String>,
}

/// Serializable page state, keyed by the selectors the host evaluated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub elements: HashMap<String, Vec<ElementSnapshot>>,
    #[serde(default)]
    pub local_storage: HashMap<String, String>,
}

impl PageSnapshot {
    pub fn new(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_body(mut self, text: &str) -> Self {
        self.body_text = Some(text.to_string());
        self
    }

    pub fn with_element(mut self, selector: &str, node: &str, text: &str) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push(ElementSnapshot {
                node: node.to_string(),
                text: Some(text.to_string()),
                attrs: HashMap::new(),
            });
        self
    }

    pub fn with_attr(mut self, selector: &str, node: &str, attr: &str, value: &str) -> Self {
        let elements = self.elements.entry(selector.to_string()).or_default();
        match elements.iter_mut().find(|e| e.node == node) {
            Some(element) => {
                element.attrs.insert(attr.to_string(), value.to_string());
            }
            None => elements.push(ElementSnapshot {
                node: node.to_string(),
                text: None,
                attrs: HashMap::from([(attr.to_string(), value.to_string())]),
            }),
        }
        self
    }

    pub fn with_storage(mut self, key: &str, value: &str) -> Self {
        self.local_storage.insert(key.to_string(), value.to_string());
        self
    }

    fn matches(&self, selector: &str) -> Result<&[ElementSnapshot], PageError> {
        if selector.trim().is_empty() {
            return Err(PageError::InvalidSelector(selector.to_string()));
        }
        Ok(self
            .elements
            .get(selector)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }
}

impl Page for PageSnapshot {
    fn url(&self) -> Result<Option<String>, PageError> {
        Ok(self.url.clone())
    }

    fn document_title(&self) -> Result<Option<String>, PageError> {
        Ok(self.title.clone())
    }

    fn body_text(&self) -> Result<Option<String>, PageError> {
        Ok(self.body_text.clone())
    }

    fn query_text(&self, selector: &str) -> Result<Option<String>, PageError> {
        Ok(self.matches(selector)?.iter().find_map(|e| {
            e.text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        }))
    }

    fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>, PageError> {
        Ok(self
            .matches(selector)?
            .iter()
            .find_map(|e| e.attrs.get(attr).cloned()))
    }

    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, PageError> {
        Ok(self
            .matches(selector)?
            .iter()
            .map(|e| e.node.clone())
            .collect())
    }
}

impl PageStorage for PageSnapshot {
    fn get_item(&self, key: &str) -> Result<Option<String>, PageError> {
        Ok(self.local_storage.get(key).cloned())
    }
}

/// The page as it is right now; replaced wholesale on every mutation
#[derive(Debug, Default)]
pub struct LivePage {
    current: RwLock<PageSnapshot>,
}

impl LivePage {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self {
            current: RwLock::new(snapshot),
        }
    }

    /// Replace the page view with a fresh snapshot
    pub fn update(&self, snapshot: PageSnapshot) {
        match self.current.write() {
            Ok(mut current) => *current = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    fn read<T>(&self, f: impl FnOnce(&PageSnapshot) -> Result<T, PageError>) -> Result<T, PageError> {
        let current = self
            .current
            .read()
            .map_err(|_| PageError::Unavailable("page lock poisoned".to_string()))?;
        f(&current)
    }
}

impl Page for LivePage {
    fn url(&self) -> Result<Option<String>, PageError> {
        self.read(|p| p.url())
    }

    fn document_title(&self) -> Result<Option<String>, PageError> {
        self.read(|p| p.document_title())
    }

    fn body_text(&self) -> Result<Option<String>, PageError> {
        self.read(|p| p.body_text())
    }

    fn query_text(&self, selector: &str) -> Result<Option<String>, PageError> {
        self.read(|p| p.query_text(selector))
    }

    fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>, PageError> {
        self.read(|p| p.query_attr(selector, attr))
    }

    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, PageError> {
        self.read(|p| p.query_all(selector))
    }
}

impl PageStorage for LivePage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PageError> {
        self.read(|p| p.get_item(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_text_skips_blank_nodes() {
        let page = PageSnapshot::new("https://example.com")
            .with_element("h1", "n1", "   ")
            .with_element("h1", "n2", "  Staff Engineer \n");
        assert_eq!(
            page.query_text("h1").unwrap().as_deref(),
            Some("Staff Engineer")
        );
        assert_eq!(page.query_text("h2").unwrap(), None);
    }

    #[test]
    fn test_query_attr_and_all() {
        let page = PageSnapshot::new("https://example.com")
            .with_attr("link[rel=canonical]", "l1", "href", "https://example.com/job/1")
            .with_element("button.apply", "b1", "Apply")
            .with_element("button.apply", "b2", "Apply now");

        assert_eq!(
            page.query_attr("link[rel=canonical]", "href")
                .unwrap()
                .as_deref(),
            Some("https://example.com/job/1")
        );
        assert_eq!(page.query_all("button.apply").unwrap(), vec!["b1", "b2"]);
    }

    #[test]
    fn test_empty_selector_is_an_error() {
        let page = PageSnapshot::default();
        assert!(matches!(
            page.query_text(" "),
            Err(PageError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_live_page_update_replaces_snapshot() {
        let page = LivePage::new(PageSnapshot::new("https://example.com/a").with_body("one"));
        assert_eq!(page.body_text().unwrap().as_deref(), Some("one"));

        page.update(PageSnapshot::new("https://example.com/b").with_storage("token", "t"));
        assert_eq!(page.url().unwrap().as_deref(), Some("https://example.com/b"));
        assert_eq!(page.body_text().unwrap(), None);
        assert_eq!(page.get_item("token").unwrap().as_deref(), Some("t"));
    }

    #[test]
    fn test_snapshot_deserializes_from_host_json() {
        let snapshot: PageSnapshot = serde_json::from_str(
            r##"{
                "url": "https://jobs.lever.co/acme/123",
                "body_text": "Apply for this job",
                "elements": {
                    "#btn-submit": [{"node": "n7", "text": "Submit application"}]
                }
            }"##,
        )
        .unwrap();
        assert_eq!(snapshot.query_all("#btn-submit").unwrap(), vec!["n7"]);
        assert!(snapshot.local_storage.is_empty());
    }
}
