//! API error responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use applift_kube::KubeError;

/// Error returned by the non-streaming endpoints.
#[derive(Debug)]
pub struct ApiError(pub KubeError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            error if error.is_not_found() => StatusCode::NOT_FOUND,
            KubeError::UnsupportedRuntime { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (
            self.status(),
            Json(serde_json::json!({ "message": self.0.to_string() })),
        )
            .into_response()
    }
}

impl From<KubeError> for ApiError {
    fn from(error: KubeError) -> Self {
        ApiError(error)
    }
}
