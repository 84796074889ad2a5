//! Mapping of library errors to HTTP responses.
//!
//! Upload problems are the user's to fix, so their message is shown as-is.
//! Provider and export failures are logged in full but shown as one generic
//! notice: API keys, quotas and Graphviz paths are the operator's business.

use crate::error::PathwayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

pub const PROVIDER_FAILURE: &str =
    "The extraction service failed. Please try again in a moment.";
pub const EXPORT_FAILURE: &str = "The pathway graph could not be rendered.";
pub const INTERNAL_FAILURE: &str = "Something went wrong while processing the request.";

/// An HTTP status plus the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<&PathwayError> for WebError {
    fn from(e: &PathwayError) -> Self {
        if e.is_upload_error() {
            let status = match e {
                PathwayError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return Self::new(status, e.to_string());
        }

        error!("{}", e);
        if e.is_provider_error() {
            Self::new(StatusCode::BAD_GATEWAY, PROVIDER_FAILURE)
        } else if matches!(
            e,
            PathwayError::ExportFailed { .. } | PathwayError::OutputWriteFailed { .. }
        ) {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, EXPORT_FAILURE)
        } else {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_FAILURE)
        }
    }
}

impl From<PathwayError> for WebError {
    fn from(e: PathwayError) -> Self {
        Self::from(&e)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_errors_are_shown_verbatim() {
        let e = PathwayError::NotAPdf {
            filename: "notes.txt".into(),
            magic: b"hell".to_vec(),
        };
        let web = WebError::from(&e);
        assert_eq!(web.status, StatusCode::BAD_REQUEST);
        assert_eq!(web.message, e.to_string());

        let big = PathwayError::UploadTooLarge {
            filename: "a.pdf".into(),
            size: 10,
            limit: 1,
        };
        assert_eq!(WebError::from(big).status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn provider_errors_are_generic() {
        let e = PathwayError::AuthError {
            provider: "gemini".into(),
            detail: "API key not valid: AIza-secret".into(),
        };
        let web = WebError::from(e);
        assert_eq!(web.status, StatusCode::BAD_GATEWAY);
        assert_eq!(web.message, PROVIDER_FAILURE);
        assert!(!web.message.contains("AIza"));
    }

    #[test]
    fn export_errors_are_generic() {
        let e = PathwayError::ExportFailed {
            format: "svg".into(),
            detail: "could not start '/usr/bin/dot'".into(),
        };
        let web = WebError::from(e);
        assert_eq!(web.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(web.message, EXPORT_FAILURE);
    }
}
