//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use taskscope_core::Error;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error returned by API handlers, rendered as `{error, code}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

/// HTTP status for a core error
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::WorkshopNotFound(_) | Error::FileNotFound(_) => StatusCode::NOT_FOUND,
        Error::AnalysisInProgress(_) | Error::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        Error::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::UploadRejected(_)
        | Error::UnsupportedFormat(_)
        | Error::CorruptDocument { .. }
        | Error::EmptyDocument(_)
        | Error::NoFiles(_)
        | Error::NoExtractableText(_)
        | Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::InvalidToken => StatusCode::UNAUTHORIZED,
        Error::ProviderAuth(_) | Error::ProviderRateLimited | Error::ProviderUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!(code = err.code(), error = %err, "Request failed");
        }
        Self {
            status,
            message: err.to_string(),
            code: err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::WorkshopNotFound("w".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&Error::AnalysisInProgress("w".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&Error::UploadTooLarge { size: 2, limit: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(status_for(&Error::UploadRejected("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::LockPoisoned), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_code_carried_over() {
        let api: ApiError = Error::FileNotFound("f".into()).into();
        assert_eq!(api.code, "FILE_NOT_FOUND");
        assert_eq!(api.status, StatusCode::NOT_FOUND);
    }
}
