pub mod files;
pub mod health;
pub mod index;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{config::AppConfig, create_router, AppState};

    /// Router wired to the given upstream base URL, without a metrics recorder.
    pub fn app(upstream_base_url: &str) -> Router {
        let mut config = AppConfig::default();
        config.upstream.base_url = upstream_base_url.to_string();
        create_router(AppState::new(config, None).unwrap())
    }

    /// An upstream that refuses connections.
    pub const DEAD_UPSTREAM: &str = "http://127.0.0.1:1";

    /// A stub upstream that fails the test if it is contacted at all.
    pub async fn untouchable_upstream() -> (mockito::ServerGuard, Vec<mockito::Mock>) {
        let mut server = mockito::Server::new_async().await;
        let mut mocks = Vec::new();
        for method in ["GET", "POST", "PUT"] {
            mocks.push(
                server
                    .mock(method, mockito::Matcher::Any)
                    .expect(0)
                    .create_async()
                    .await,
            );
        }
        (server, mocks)
    }

    pub fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}
