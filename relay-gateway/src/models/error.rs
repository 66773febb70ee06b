use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// Application-wide error types
///
/// Every variant is surfaced synchronously as a JSON body of the shape
/// `{"error": <message>}`, with `details` added when the upstream supplied one.
#[derive(Error, Debug)]
pub enum ApiError {
    /// A required field was absent or empty. Upstream is never contacted.
    #[error("{0}")]
    Validation(String),

    /// Phase one of an upload was refused by the upstream service.
    #[error("Failed to create file record")]
    FileRecordRejected { details: String },

    /// Phase two of an upload did not land on the storage target.
    #[error("Failed to upload file content")]
    ContentUploadFailed,

    /// DNS, connect, reset or timeout while talking to upstream.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a body we could not interpret.
    #[error(transparent)]
    Decode(#[from] serde_json::Error),

    #[error("Upstream response is missing field: {0}")]
    MissingField(&'static str),

    /// The multipart upload could not be read, e.g. it exceeded the body cap.
    #[error("Invalid upload body: {0}")]
    Multipart(#[from] MultipartError),
}

/// Error response structure for JSON API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::FileRecordRejected { .. }
            | ApiError::ContentUploadFailed => StatusCode::BAD_REQUEST,
            ApiError::Transport(_) | ApiError::Decode(_) | ApiError::MissingField(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Multipart(e) => e.status(),
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let details = match self {
            ApiError::FileRecordRejected { details } => Some(details.clone()),
            _ => None,
        };

        ErrorResponse {
            error: self.to_string(),
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }

        (status, Json(self.to_error_response())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = ApiError::validation("Missing API key");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = serde_json::to_value(err.to_error_response()).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Missing API key" }));
    }

    #[test]
    fn test_file_record_rejection_carries_details() {
        let err = ApiError::FileRecordRejected {
            details: r#"{"message":"quota exceeded"}"#.to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = serde_json::to_value(err.to_error_response()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Failed to create file record",
                "details": r#"{"message":"quota exceeded"}"#
            })
        );
    }

    #[test]
    fn test_content_upload_failure_is_generic() {
        let err = ApiError::ContentUploadFailed;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_error_response().details.is_none());
    }

    #[test]
    fn test_decode_failure_is_server_error() {
        let err: ApiError = serde_json::from_str::<serde_json::Value>("<html>")
            .unwrap_err()
            .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_missing_field_is_server_error() {
        let err = ApiError::MissingField("upload_url");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Upstream response is missing field: upload_url");
    }
}
