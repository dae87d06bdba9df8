//! Mapping of llmserve errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use llmserve_error::{ServeError, ServeErrorKind};
use serde_json::json;

/// An error returned from an API handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    /// A 404 for a model this server does not serve.
    pub fn model_not_found(model: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "not_found_error",
            message: format!("The model '{model}' does not exist"),
        }
    }

    /// HTTP status of the error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ServeError> for ApiError {
    fn from(err: ServeError) -> Self {
        let (status, kind) = match err.kind() {
            ServeErrorKind::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            ServeErrorKind::Engine(_) | ServeErrorKind::Http(_) => {
                (StatusCode::BAD_GATEWAY, "engine_error")
            }
            ServeErrorKind::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        Self {
            status,
            kind,
            message: err.kind().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.message,
                "type": self.kind,
                "code": self.status.as_u16(),
            }
        });
        (self.status, Json(body)).into_response()
    }
}
