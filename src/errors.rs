use crate::services::relay_service::RelayError;
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

/// A lightweight wrapper for request failures: a status and a short
/// plain-text message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.message).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Upload(_) => AppError::internal(err.to_string()),
            RelayError::Auth(_) => AppError::internal(format!("Error: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::alist_client::BackendError;

    #[test]
    fn relay_errors_map_to_500_with_short_message() {
        let upload = AppError::from(RelayError::Upload(BackendError::Rejected {
            route: 1,
            endpoint: "/api/fs/put",
            code: 500,
            message: "disk full".into(),
        }));
        assert_eq!(upload.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(upload.message, "Upload failed");

        let auth = AppError::from(RelayError::Auth(BackendError::MissingField {
            route: 2,
            endpoint: "/api/auth/login",
            field: "token",
        }));
        assert_eq!(auth.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(auth.message, "Error: authentication with upstream failed");
    }

    #[test]
    fn response_is_plain_text() {
        let response = AppError::not_found("Route not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
