use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{Method, StatusCode},
    response::IntoResponse,
};
use tracing::{error, info};

use crate::{publish::truncate_for_log, sanitize::InvalidEvent};

/// Error type for the REST API.
///
/// This error type is used to convert errors into HTTP responses.
/// The standard error response looks like this:
///
/// ```json
/// {
///     "error": "ERROR_CODE",
///     "message": "Error message",
///     "status": 400
/// }
/// ```
#[derive(Debug, thiserror::Error, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AppError {
    #[error("{0}")]
    InvalidEvent(String),

    #[error("Invalid format in request body")]
    InvalidFormat,

    #[error("Content-Type must be application/json")]
    UnsupportedMediaType,

    #[error("HTTP method {0} is not supported")]
    MethodNotAllowed(Method),

    #[error("Unexpected error")]
    InternalError,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidEvent(_) | AppError::InvalidFormat => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Converts errors into HTTP responses.
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // Error code is the enum variant name in SCREAMING_SNAKE_CASE.
        let error_code = self.as_ref();
        let message = self.to_string();
        let status_code = self.status_code();
        let json = serde_json::json!({
            "error": error_code,
            "message": message,
            "status": status_code.as_u16(),
        });

        info!(
            "Returning error {error_code}: {}",
            truncate_for_log(&message)
        );
        (status_code, Json(json)).into_response()
    }
}

impl From<InvalidEvent> for AppError {
    fn from(error: InvalidEvent) -> Self {
        AppError::InvalidEvent(error.to_string())
    }
}

/// Converts body extraction failures. The rejection text can quote the request body, so only
/// the rejection kind and a short excerpt are logged and none of it reaches the client.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let kind = match &rejection {
            JsonRejection::MissingJsonContentType(_) => return AppError::UnsupportedMediaType,
            JsonRejection::JsonDataError(_) => "JsonDataError",
            JsonRejection::JsonSyntaxError(_) => "JsonSyntaxError",
            JsonRejection::BytesRejection(_) => "BytesRejection",
            _ => {
                error!(
                    "Unexpected body rejection: {}",
                    truncate_for_log(&rejection.body_text())
                );
                return AppError::InternalError;
            }
        };
        info!(
            "Invalid request body: {kind}: {}",
            truncate_for_log(&rejection.body_text())
        );
        AppError::InvalidFormat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::InvalidEvent(String::new()).as_ref(), "INVALID_EVENT");
        assert_eq!(AppError::InvalidFormat.as_ref(), "INVALID_FORMAT");
        assert_eq!(
            AppError::UnsupportedMediaType.as_ref(),
            "UNSUPPORTED_MEDIA_TYPE"
        );
        assert_eq!(
            AppError::MethodNotAllowed(Method::GET).as_ref(),
            "METHOD_NOT_ALLOWED"
        );
        assert_eq!(AppError::InternalError.as_ref(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_method_not_allowed_message() {
        let err = AppError::MethodNotAllowed(Method::PUT);
        assert_eq!(err.to_string(), "HTTP method PUT is not supported");
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
