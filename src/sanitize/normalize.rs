use serde_json::{Map, Value};

use crate::event::{Event, Payload};

/// Trims `type` and the optional string fields, drops optional fields that are blank, and
/// wraps scalar `payload.data` as `{"value": <scalar>}` so consumers always see an object or
/// array. `payload.website` is left as sent; the validator decides whether it is acceptable.
pub fn normalize(event: Event) -> Event {
    let Event {
        event_type,
        payload,
    } = event;

    Event {
        event_type: event_type.trim().to_string(),
        payload: Payload {
            website: payload.website,
            id: trim_to_none(payload.id),
            hostname: trim_to_none(payload.hostname),
            screen: trim_to_none(payload.screen),
            language: trim_to_none(payload.language),
            title: trim_to_none(payload.title),
            url: trim_to_none(payload.url),
            referrer: trim_to_none(payload.referrer),
            name: trim_to_none(payload.name),
            data: payload.data.and_then(promote_scalar),
        },
    }
}

fn trim_to_none(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

fn promote_scalar(data: Value) -> Option<Value> {
    match data {
        Value::Null => None,
        Value::Object(_) | Value::Array(_) => Some(data),
        scalar => {
            let mut wrapped = Map::with_capacity(1);
            wrapped.insert("value".to_string(), scalar);
            Some(Value::Object(wrapped))
        }
    }
}
