use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, Method, StatusCode},
};
use std::sync::Arc;
use tracing::{error, instrument};

use crate::{
    event::{EXCLUDE_FILTERS, Event, FORWARDED_FOR, Response, USER_AGENT},
    publish::{ForwardedHeaders, PublishMode, truncate_for_log},
    sanitize::{SanitizedEvent, TruncationReport, sanitize},
    server::{AppState, app_error::AppError},
};

/// Accepts one event, sanitizes it, and publishes it to the broker.
///
/// Responds `201` with the truncation report, if any. In [`PublishMode::Await`] the response
/// waits for the broker and a failed send turns into a `500`.
#[axum::debug_handler]
#[instrument(skip_all)]
pub async fn send_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Event>, JsonRejection>,
) -> Result<(StatusCode, Json<Response>), AppError> {
    let result = accept_event(&state, &headers, body).await;
    state
        .metrics
        .request(if result.is_ok() { "success" } else { "failure" });
    result
}

/// Answers any method other than `POST` on the send route.
pub async fn method_not_allowed(State(state): State<Arc<AppState>>, method: Method) -> AppError {
    state.metrics.request("failure");
    AppError::MethodNotAllowed(method)
}

pub async fn render_metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}

pub async fn health() -> &'static str {
    "OK"
}

async fn accept_event(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Json<Event>, JsonRejection>,
) -> Result<(StatusCode, Json<Response>), AppError> {
    let Json(event) = body?;
    let SanitizedEvent {
        event,
        truncation_report,
    } = sanitize(event, state.truncation_limit)?;
    record_truncation_metrics(state, truncation_report.as_ref());

    let forwarded = forwarded_headers(headers);
    let pipeline = state.pipeline.clone();
    // The send runs on its own task so a client hanging up cannot cancel it.
    let publish = tokio::spawn(async move { pipeline.publish(&event, &forwarded).await });

    if state.publish_mode == PublishMode::Await {
        match publish.await {
            Ok(Ok(_)) => {}
            // The pipeline has already logged and counted the failure.
            Ok(Err(_)) => return Err(AppError::InternalError),
            Err(join_error) => {
                error!(
                    "Publish task failed: {}",
                    truncate_for_log(&join_error.to_string())
                );
                return Err(AppError::InternalError);
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(Response::created(truncation_report)),
    ))
}

/// Each violated field is counted once per event.
fn record_truncation_metrics(state: &AppState, report: Option<&TruncationReport>) {
    let Some(report) = report else {
        return;
    };
    let mut seen = ahash::AHashSet::new();
    for violation in &report.violations {
        if seen.insert(violation.field.as_str()) {
            state.metrics.truncated_field(&violation.field);
        }
    }
}

fn forwarded_headers(headers: &HeaderMap) -> ForwardedHeaders {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    ForwardedHeaders {
        user_agent: header(USER_AGENT).unwrap_or_default(),
        exclude_filters: header(EXCLUDE_FILTERS),
        forwarded_for: header(FORWARDED_FOR),
    }
}
