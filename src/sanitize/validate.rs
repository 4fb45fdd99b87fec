use serde_json::Value;
use uuid::Uuid;

use crate::{event::Event, sanitize::InvalidEvent};

/// Checks the invariants every sanitized event must hold. Expects a normalized event, so
/// `type` is already trimmed.
pub fn validate(event: &Event) -> Result<(), InvalidEvent> {
    if event.event_type.trim().is_empty() {
        return Err(InvalidEvent::new("type must not be blank"));
    }
    validate_website(&event.payload.website)?;
    if let Some(data) = &event.payload.data {
        validate_data(data)?;
    }
    Ok(())
}

/// Only the hyphenated 36-character form is accepted; `Uuid::parse_str` alone also takes the
/// simple, braced and URN forms.
fn validate_website(website: &str) -> Result<(), InvalidEvent> {
    match Uuid::parse_str(website) {
        Ok(uuid) if website.eq_ignore_ascii_case(&uuid.hyphenated().to_string()) => Ok(()),
        _ => Err(InvalidEvent::new(format!(
            "payload.website must be a valid UUID, but was '{website}'"
        ))),
    }
}

fn validate_data(data: &Value) -> Result<(), InvalidEvent> {
    let kind = match data {
        Value::Object(_) | Value::Array(_) => return Ok(()),
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Number(_) => "NUMBER",
        Value::String(_) => "STRING",
    };
    Err(InvalidEvent::new(format!(
        "payload.data must be a JSON object or array, but was {kind}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Payload;
    use serde_json::json;

    fn event(event_type: &str, website: &str, data: Option<Value>) -> Event {
        Event {
            event_type: event_type.to_string(),
            payload: Payload {
                website: website.to_string(),
                data,
                ..Default::default()
            },
        }
    }

    const WEBSITE: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

    #[test]
    fn test_accepts_valid_event() {
        assert!(validate(&event("pageview", WEBSITE, None)).is_ok());
        assert!(validate(&event("pageview", WEBSITE, Some(json!([1])))).is_ok());
        assert!(validate(&event("pageview", WEBSITE, Some(json!({ "a": 1 })))).is_ok());
    }

    #[test]
    fn test_rejects_blank_type() {
        let err = validate(&event("   ", WEBSITE, None)).unwrap_err();
        assert_eq!(err.to_string(), "type must not be blank");
    }

    #[test]
    fn test_rejects_invalid_website() {
        let err = validate(&event("pageview", "not-a-uuid", None)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "payload.website must be a valid UUID, but was 'not-a-uuid'"
        );
    }

    #[test]
    fn test_accepts_uppercase_hyphenated_website() {
        let upper = WEBSITE.to_ascii_uppercase();
        assert!(validate(&event("pageview", &upper, None)).is_ok());
    }

    #[test]
    fn test_rejects_non_hyphenated_website_forms() {
        let forms = [
            format!("{{{WEBSITE}}}"),
            format!("urn:uuid:{WEBSITE}"),
            WEBSITE.replace('-', ""),
            format!(" {WEBSITE} "),
        ];
        for website in forms {
            let err = validate(&event("pageview", &website, None)).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("payload.website must be a valid UUID, but was '{website}'")
            );
        }
    }

    #[test]
    fn test_rejects_scalar_data() {
        let err = validate(&event("pageview", WEBSITE, Some(json!(123)))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "payload.data must be a JSON object or array, but was NUMBER"
        );
    }
}
