mod normalize;
mod truncation;
mod validate;

use tracing::debug;

use crate::event::{Event, Payload};

pub use normalize::normalize;
pub use truncation::{MAX_LENGTH, TruncationEngine, TruncationReport};
pub use validate::validate;

/// The event broke one of the invariants checked by [`validate`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidEvent(String);

impl InvalidEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An event ready to be published, with a report of what was cut from it, if anything.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedEvent {
    pub event: Event,
    pub truncation_report: Option<TruncationReport>,
}

/// Normalizes, validates, and bounds an event. Only validation can fail.
pub fn sanitize(event: Event, limit: usize) -> Result<SanitizedEvent, InvalidEvent> {
    let event = normalize(event);
    validate(&event)?;

    let mut engine = TruncationEngine::new(limit);
    let Event {
        event_type,
        payload,
    } = event;
    let mut field = |name: &str, value: Option<String>| {
        value.map(|value| engine.truncate_marked(name, value))
    };

    let event_type = field("type", Some(event_type)).unwrap_or_default();
    let id = field("payload.id", payload.id);
    let hostname = field("payload.hostname", payload.hostname);
    let screen = field("payload.screen", payload.screen);
    let language = field("payload.language", payload.language);
    let title = field("payload.title", payload.title);
    let url = field("payload.url", payload.url);
    let referrer = field("payload.referrer", payload.referrer);
    let name = field("payload.name", payload.name);
    let data = payload
        .data
        .map(|data| engine.truncate_tree("payload.data", &data));

    let truncation_report = engine.report_or_none();
    if let Some(report) = &truncation_report {
        debug!("Truncated {} field(s)", report.violations.len());
    }

    Ok(SanitizedEvent {
        event: Event {
            event_type,
            payload: Payload {
                website: payload.website,
                id,
                hostname,
                screen,
                language,
                title,
                url,
                referrer,
                name,
                data,
            },
        },
        truncation_report,
    })
}
