//! HTTP error responses.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{error, warn};

/// Failure of an API call, rendered as `{success: false, error}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// A collaborator is not configured.
    Unavailable(String),
    /// An upstream service failed.
    Upstream(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unavailable(msg)
            | ApiError::Upstream(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl From<eziarr_core::Error> for ApiError {
    fn from(err: eziarr_core::Error) -> Self {
        use eziarr_core::Error;
        match err {
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Config(msg) => ApiError::Unavailable(msg),
            Error::Upstream { .. } | Error::Request(_) => ApiError::Upstream(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = self.message(), "Request failed");
        } else {
            warn!(status = status.as_u16(), error = self.message(), "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": self.message(),
        }));
        (status, body).into_response()
    }
}
