use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pdftool::{DeadlineError, InvokeError, JobError, OcrError, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// Response envelope shared by every JSON endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            error: false,
            message: None,
            data: Some(data),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Error returned by handlers and middleware
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request itself is unacceptable
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request body is too large")]
    PayloadTooLarge,

    /// Message is safe to show to clients
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, message = %self, "request failed");
        }
        (status, Json(ApiResponse::<()>::failure(self.to_string()))).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Io(err) => err.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<InvokeError> for ApiError {
    fn from(err: InvokeError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<DeadlineError> for ApiError {
    fn from(err: DeadlineError) -> Self {
        match err {
            DeadlineError::Elapsed(_) => ApiError::Timeout,
            DeadlineError::Panicked(_) | DeadlineError::Cancelled => {
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        error!(error = %err, "filesystem error");
        ApiError::Internal("Failed to process file".to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "object store error");
        ApiError::Internal("Failed to save file to storage".to_string())
    }
}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::Timeout => ApiError::Timeout,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        warn!(error = %err, "malformed multipart body");
        ApiError::BadRequest(err.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        warn!(error = %err, "multipart body rejected");
        ApiError::BadRequest("No file uploaded".to_string())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(err: BytesRejection) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest("Invalid JSON body".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdftool::Operation;
    use std::time::Duration;

    #[test]
    fn test_statuses() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Timeout.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            ApiError::from(DeadlineError::Elapsed(Duration::from_secs(1))).status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(ApiError::from(OcrError::Timeout).status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_job_errors_are_client_errors() {
        let err = ApiError::from(JobError::PasswordRequired);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Password is required");
    }

    #[test]
    fn test_invoke_errors() {
        let client = ApiError::from(InvokeError::NothingToRepair);
        assert_eq!(client.status(), StatusCode::BAD_REQUEST);

        let failed = ApiError::from(InvokeError::Failed {
            operation: Operation::Encrypt,
            message: "Failed to encrypt PDF: Bad things".to_string(),
        });
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.to_string(), "Failed to encrypt PDF: Bad things");
    }

    #[test]
    fn test_io_error_is_not_leaked() {
        let err = ApiError::from(std::io::Error::other("/var/tmp/job-1/input.pdf: denied"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("/var/tmp"));
    }

    #[test]
    fn test_envelope_serialization() {
        let value = serde_json::to_value(ApiResponse::<()>::failure("nope")).unwrap();
        assert_eq!(value, serde_json::json!({"error": true, "message": "nope"}));

        let value = serde_json::to_value(ApiResponse::data(vec![1, 2])).unwrap();
        assert_eq!(value, serde_json::json!({"error": false, "data": [1, 2]}));
    }
}
