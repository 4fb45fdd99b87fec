use serde::{Deserialize, Serialize};

use crate::sanitize::TruncationReport;

pub const USER_AGENT: &str = "User-Agent";
pub const EXCLUDE_FILTERS: &str = "X-Exclude-Filters";
pub const FORWARDED_FOR: &str = "X-Forwarded-For";

/// An analytics event as submitted by the browser tracker.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Payload,
}

/// Event payload. Optional fields are left out of the serialized form when absent.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Payload {
    pub website: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form tracker data. A JSON `null` deserializes to `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Body of a successful `POST /api/send`.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub message: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation_report: Option<TruncationReport>,
}

impl Response {
    pub fn created(truncation_report: Option<TruncationReport>) -> Self {
        Self {
            message: "Created".to_string(),
            code: 201,
            truncation_report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: Option<&str>) -> Event {
        Event {
            event_type: "pageview".to_string(),
            payload: Payload {
                website: uuid::Uuid::new_v4().to_string(),
                id: id.map(str::to_string),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_omits_absent_id() {
        let json = serde_json::to_string(&event(None)).unwrap();
        assert!(!json.contains("\"id\""));
        assert!(json.contains("\"type\":\"pageview\""));
    }

    #[test]
    fn test_includes_present_id() {
        let json = serde_json::to_string(&event(Some("abc-123"))).unwrap();
        assert!(json.contains("\"id\":\"abc-123\""));
    }

    #[test]
    fn test_ignores_unknown_fields_and_null_data() {
        let json = serde_json::json!({
            "type": "pageview",
            "unknown": true,
            "payload": { "website": "w", "data": null, "extra": [1, 2] }
        });
        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event.payload.data, None);
        assert_eq!(event.payload.website, "w");
    }

    #[test]
    fn test_response_omits_missing_report() {
        let json = serde_json::to_value(Response::created(None)).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "Created", "code": 201 }));
    }
}
