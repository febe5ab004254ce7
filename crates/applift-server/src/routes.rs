//! HTTP API layer
//!
//! The long-running operations (image build, image removal, deployment,
//! undeployment) respond with a server-sent event stream: heartbeat
//! comments while the operation runs, then a single `result` or `error`
//! event. Log retrieval and the health check are plain JSON endpoints.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use tower_http::trace::TraceLayer;

use applift_kube::{BuildPipeline, BuildRequest, DeployPipeline};

use crate::dto::{
    CreateDeploymentRequest, CreateDeploymentResponse, CreateImageRequest, CreateImageResponse,
    DeleteResponse, GetApplicationLogsResponse,
};
use crate::error::ApiError;
use crate::stream::{Frame, with_heartbeats};

const BEARER_PREFIX: &str = "Bearer ";

/// Shared handler dependencies.
#[derive(Clone)]
pub struct AppState {
    pub build: Arc<BuildPipeline>,
    pub deploy: Arc<DeployPipeline>,
    pub heartbeat_period: Duration,
    pub default_runtime: String,
}

/// Create the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/image/{name}", post(create_image).delete(delete_image))
        .route(
            "/v1/deployment/{name}",
            post(create_deployment).delete(delete_deployment),
        )
        .route("/v1/deployment/{name}/logs", get(get_logs))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// POST /v1/image/{name}
///
/// Builds and pushes the application image. Upstream credentials come from
/// the `api-key` header and the `Authorization` bearer token.
async fn create_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreateImageRequest>,
) -> impl IntoResponse {
    let request = BuildRequest {
        name: name.clone(),
        sources: body.sources,
        api_key: header_value(&headers, "api-key"),
        jwt: bearer_token(&headers),
        runtime: body
            .runtime
            .unwrap_or_else(|| state.default_runtime.clone()),
    };

    let build = state.build.clone();
    sse_stream(state.heartbeat_period, async move {
        match build.build(&request).await {
            Ok(image) => Frame::result(CreateImageResponse { image }),
            Err(error) => {
                tracing::error!(app = name, %error, "failed to create image");
                Frame::error(error.to_string())
            }
        }
    })
}

/// DELETE /v1/image/{name}
async fn delete_image(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    let build = state.build.clone();
    sse_stream(state.heartbeat_period, async move {
        match build.clean(&name).await {
            Ok(deleted) => Frame::result(DeleteResponse { deleted }),
            Err(error) => {
                tracing::error!(app = name, %error, "failed to delete image");
                Frame::error(error.to_string())
            }
        }
    })
}

/// POST /v1/deployment/{name}
async fn create_deployment(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<CreateDeploymentRequest>,
) -> impl IntoResponse {
    let deploy = state.deploy.clone();
    sse_stream(state.heartbeat_period, async move {
        match deploy.deploy(&name, &body.env).await {
            Ok(url) => Frame::result(CreateDeploymentResponse { url }),
            Err(error) => {
                tracing::error!(app = name, %error, "failed to deploy service");
                Frame::error(error.to_string())
            }
        }
    })
}

/// DELETE /v1/deployment/{name}
async fn delete_deployment(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let deploy = state.deploy.clone();
    sse_stream(state.heartbeat_period, async move {
        match deploy.undeploy(&name).await {
            Ok(deleted) => Frame::result(DeleteResponse { deleted }),
            Err(error) => {
                tracing::error!(app = name, %error, "failed to delete service");
                Frame::error(error.to_string())
            }
        }
    })
}

/// GET /v1/deployment/{name}/logs
async fn get_logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<GetApplicationLogsResponse>, ApiError> {
    let logs = state.deploy.logs(&name).await?;
    Ok(Json(GetApplicationLogsResponse { logs }))
}

fn sse_stream(
    period: Duration,
    operation: impl Future<Output = Frame> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(with_heartbeats(period, operation).map(|frame| Ok(frame.into_event())))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_at_checked(BEARER_PREFIX.len())?;
    scheme
        .eq_ignore_ascii_case(BEARER_PREFIX)
        .then(|| token.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_authorization(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted_and_trimmed() {
        let headers = headers_with_authorization("Bearer  some.jwt ");

        assert_eq!(bearer_token(&headers).as_deref(), Some("some.jwt"));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let headers = headers_with_authorization("bearer some.jwt");

        assert_eq!(bearer_token(&headers).as_deref(), Some("some.jwt"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let headers = headers_with_authorization("Basic dXNlcjpwYXNz");

        assert!(bearer_token(&headers).is_none());
    }

    #[test]
    fn missing_authorization_is_ignored() {
        assert!(bearer_token(&HeaderMap::new()).is_none());
    }
}
