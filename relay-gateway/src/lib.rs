//! Browser-facing relay for a remote AI task service.
//!
//! Every `/api/*` route validates the caller's API key (and any required
//! fields) locally, forwards the request to the upstream task API with the key
//! in a credential header, and relays the upstream status and JSON body back.
//! File uploads go through the two-phase [`services::UploadCoordinator`].
//! Nothing is stored between requests.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use config::{AppConfig, ConfigError};
use handlers::{files, health, index, tasks};
use middleware::{logging_middleware, metrics_middleware};
use services::UpstreamClient;

/// Application state shared across handlers. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub upstream: Arc<UpstreamClient>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: AppConfig, metrics: Option<PrometheusHandle>) -> Result<Self, ConfigError> {
        let upstream = UpstreamClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            upstream: Arc::new(upstream),
            metrics,
        })
    }
}

/// Build application router
pub fn create_router(state: AppState) -> Router {
    let max_body_bytes = state.config.limits.max_body_bytes;
    let cors = state.config.cors.to_layer();

    Router::new()
        .route("/", get(index::index))
        // Task relay
        .route("/api/create-task", post(tasks::create_task))
        .route("/api/get-task/:task_id", post(tasks::get_task))
        .route("/api/list-tasks", post(tasks::list_tasks))
        // File relay
        .route("/api/upload-file", post(files::upload_file))
        .route("/api/get-file/:file_id", post(files::get_file))
        .route("/api/list-files", post(files::list_files))
        // Monitoring
        .route("/api/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .layer(
            // Outermost first: CORS headers must reach every response, 413s included.
            ServiceBuilder::new()
                .layer(cors)
                .map_response(axum::response::IntoResponse::into_response)
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(logging_middleware))
                .layer(axum::middleware::from_fn(metrics_middleware))
                .layer(DefaultBodyLimit::max(max_body_bytes))
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_oversized_body_still_carries_cors_headers() {
        let mut config = AppConfig::default();
        config.upstream.base_url = "http://127.0.0.1:1".to_string();
        config.limits.max_body_bytes = 16;
        let app = create_router(AppState::new(config, None).unwrap());

        let body = "x".repeat(64);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/upload-file")
            .header(header::ORIGIN, "https://app.example")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=b")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
