//! Wire types shared by page-context scripts and the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Job sites the capture engine has an adapter for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    Indeed,
    Greenhouse,
    Lever,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Linkedin,
        Platform::Indeed,
        Platform::Greenhouse,
        Platform::Lever,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Indeed => "indeed",
            Platform::Greenhouse => "greenhouse",
            Platform::Lever => "lever",
        }
    }

    /// Provenance tag written to `extra.source`
    pub fn source_tag(&self) -> String {
        format!("{}-adapter", self.as_str())
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

/// Lifecycle event carried by a capture. Only submissions are modeled today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Applied,
}

/// Provenance metadata attached to every capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureExtra {
    pub source: String,
}

/// One detected job application submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
    pub platform: Platform,

    pub event_type: EventType,

    /// Canonical posting URL; the downstream dedup key
    pub job_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    pub applied_at: DateTime<Utc>,

    pub extra: CaptureExtra,
}

impl CaptureEvent {
    /// Build an `Applied` event stamped with the current time
    pub fn applied(platform: Platform, job_url: impl Into<String>) -> Self {
        Self {
            platform,
            event_type: EventType::Applied,
            job_url: job_url.into(),
            title: None,
            company: None,
            location: None,
            applied_at: Utc::now(),
            extra: CaptureExtra {
                source: platform.source_tag(),
            },
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_company(mut self, company: Option<String>) -> Self {
        self.company = company;
        self
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }
}

/// Request sent from a page context to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayRequest {
    #[serde(rename = "STORE_AUTH")]
    StoreAuth {
        token: String,
        uuid: String,
        #[serde(rename = "apiBase", default, skip_serializing_if = "Option::is_none")]
        api_base: Option<String>,
    },

    #[serde(rename = "IMPORT_APPLICATION")]
    ImportApplication { payload: CaptureEvent },

    /// Any `type` the relay does not recognise
    #[serde(other)]
    Unknown,
}

impl RelayRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayRequest::StoreAuth { .. } => "STORE_AUTH",
            RelayRequest::ImportApplication { .. } => "IMPORT_APPLICATION",
            RelayRequest::Unknown => "UNKNOWN",
        }
    }
}

/// Reply to exactly one [`RelayRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayResponse {
    /// Correlation id copied from the request, when it carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResponse {
    pub fn ok() -> Self {
        Self {
            id: None,
            ok: true,
            result: None,
            error: None,
        }
    }

    pub fn ok_with(result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::ok()
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            id: None,
            ok: false,
            result: None,
            error: Some(message.to_string()),
        }
    }

    pub fn with_id(mut self, id: Option<u64>) -> Self {
        self.id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_auth_parses_with_optional_api_base() {
        let request: RelayRequest =
            serde_json::from_str(r#"{"type":"STORE_AUTH","token":"t1","uuid":"u1"}"#).unwrap();
        assert_eq!(
            request,
            RelayRequest::StoreAuth {
                token: "t1".to_string(),
                uuid: "u1".to_string(),
                api_base: None,
            }
        );

        let request: RelayRequest = serde_json::from_str(
            r#"{"type":"STORE_AUTH","token":"t1","uuid":"u1","apiBase":"https://api.example.com"}"#,
        )
        .unwrap();
        match request {
            RelayRequest::StoreAuth { api_base, .. } => {
                assert_eq!(api_base.as_deref(), Some("https://api.example.com"))
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_maps_to_unknown_variant() {
        let request: RelayRequest =
            serde_json::from_str(r#"{"type":"PING","id":4}"#).unwrap();
        assert_eq!(request, RelayRequest::Unknown);
    }

    #[test]
    fn test_capture_event_omits_absent_fields() {
        let event = CaptureEvent::applied(Platform::Lever, "https://jobs.lever.co/acme/123")
            .with_company(Some("Acme".to_string()));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["platform"], "lever");
        assert_eq!(json["event_type"], "Applied");
        assert_eq!(json["job_url"], "https://jobs.lever.co/acme/123");
        assert_eq!(json["company"], "Acme");
        assert_eq!(json["extra"]["source"], "lever-adapter");
        assert!(json.get("title").is_none());
        assert!(json.get("location").is_none());

        // ISO-8601 timestamp
        let applied_at = json["applied_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(applied_at).is_ok());
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!(Platform::parse("LinkedIn"), Some(Platform::Linkedin));
        assert_eq!(Platform::parse(" greenhouse "), Some(Platform::Greenhouse));
        assert_eq!(Platform::parse("monster"), None);
    }

    #[test]
    fn test_response_shapes() {
        let json = serde_json::to_string(&RelayResponse::ok()).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);

        let json = serde_json::to_string(&RelayResponse::error("boom").with_id(Some(9))).unwrap();
        assert_eq!(json, r#"{"id":9,"ok":false,"error":"boom"}"#);
    }
}
