use axum::http::StatusCode;
use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client, Method, RequestBuilder,
};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::config::{AppConfig, ConfigError};
use crate::models::{ApiError, ApiKey, ApiResult, RelayedResponse, UpstreamTaskPayload};

/// Operations the gateway performs against the upstream task API. Used as
/// the metrics label and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateTask,
    GetTask,
    ListTasks,
    CreateFileRecord,
    GetFile,
    ListFiles,
    UploadContent,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateTask => "create_task",
            Operation::GetTask => "get_task",
            Operation::ListTasks => "list_tasks",
            Operation::CreateFileRecord => "create_file_record",
            Operation::GetFile => "get_file",
            Operation::ListFiles => "list_files",
            Operation::UploadContent => "upload_content",
        }
    }
}

/// Raw upstream answer before any JSON interpretation.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawResponse {
    /// Decode the body as JSON and pair it with the status for relaying.
    pub fn into_relayed(self) -> ApiResult<RelayedResponse> {
        let body: Value = serde_json::from_slice(&self.body)?;
        Ok(RelayedResponse {
            status: self.status,
            body,
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Client for the upstream task API.
///
/// Holds one pooled `reqwest::Client` for the life of the process. Every call
/// is issued once and awaited; nothing is retried.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    api_key_header: HeaderName,
}

impl UpstreamClient {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.upstream.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| {
            ConfigError::InvalidValue(format!("Failed to create HTTP client: {}", e))
        })?;

        debug!(
            base_url = %config.upstream_base_url(),
            timeout_seconds = ?config.upstream.timeout_seconds,
            "Upstream client initialized"
        );

        Ok(Self {
            client,
            base_url: config.upstream_base_url().to_string(),
            api_key_header: config.api_key_header()?,
        })
    }

    /// POST /v1/tasks
    pub async fn create_task(
        &self,
        api_key: &ApiKey,
        payload: &UpstreamTaskPayload,
    ) -> ApiResult<RelayedResponse> {
        self.send_json(Operation::CreateTask, Method::POST, "/v1/tasks", api_key, Some(payload))
            .await?
            .into_relayed()
    }

    /// GET /v1/tasks/{task_id}
    pub async fn get_task(&self, api_key: &ApiKey, task_id: &str) -> ApiResult<RelayedResponse> {
        let path = format!("/v1/tasks/{}", urlencoding::encode(task_id));
        self.send_json(Operation::GetTask, Method::GET, &path, api_key, None::<&()>)
            .await?
            .into_relayed()
    }

    /// GET /v1/tasks
    pub async fn list_tasks(&self, api_key: &ApiKey) -> ApiResult<RelayedResponse> {
        self.send_json(Operation::ListTasks, Method::GET, "/v1/tasks", api_key, None::<&()>)
            .await?
            .into_relayed()
    }

    /// GET /v1/files/{file_id}
    pub async fn get_file(&self, api_key: &ApiKey, file_id: &str) -> ApiResult<RelayedResponse> {
        let path = format!("/v1/files/{}", urlencoding::encode(file_id));
        self.send_json(Operation::GetFile, Method::GET, &path, api_key, None::<&()>)
            .await?
            .into_relayed()
    }

    /// GET /v1/files
    pub async fn list_files(&self, api_key: &ApiKey) -> ApiResult<RelayedResponse> {
        self.send_json(Operation::ListFiles, Method::GET, "/v1/files", api_key, None::<&()>)
            .await?
            .into_relayed()
    }

    /// POST /v1/files. The caller interprets the raw answer, since a refusal
    /// here must surface the upstream text rather than be relayed.
    pub async fn create_file_record(
        &self,
        api_key: &ApiKey,
        filename: &str,
    ) -> ApiResult<RawResponse> {
        let body = serde_json::json!({ "filename": filename });
        self.send_json(Operation::CreateFileRecord, Method::POST, "/v1/files", api_key, Some(&body))
            .await
    }

    /// PUT the raw bytes to a pre-signed storage URL. No credential header
    /// and no JSON wrapping.
    pub async fn upload_content(&self, upload_url: &str, content: Bytes) -> ApiResult<StatusCode> {
        let request = self.client.put(upload_url).body(content);
        let raw = self.execute(Operation::UploadContent, request).await?;
        Ok(raw.status)
    }

    fn headers(&self, api_key: &ApiKey) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut value = HeaderValue::from_str(api_key.expose())
            .map_err(|_| ApiError::validation("API key contains invalid characters"))?;
        value.set_sensitive(true);
        headers.insert(self.api_key_header.clone(), value);

        Ok(headers)
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        operation: Operation,
        method: Method,
        path: &str,
        api_key: &ApiKey,
        body: Option<&T>,
    ) -> ApiResult<RawResponse> {
        let url = format!("{}{}", self.base_url, path);
        debug!(operation = operation.as_str(), method = %method, url = %url, "Upstream request");

        let mut request = self
            .client
            .request(method, &url)
            .headers(self.headers(api_key)?);
        if let Some(body) = body {
            request = request.json(body);
        }

        self.execute(operation, request).await
    }

    async fn execute(&self, operation: Operation, request: RequestBuilder) -> ApiResult<RawResponse> {
        let start_time = Instant::now();

        let result = async {
            let response = request.send().await?;
            let status = StatusCode::from_u16(response.status().as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(RawResponse { status, body })
        }
        .await;

        let elapsed = start_time.elapsed();
        match result {
            Ok(raw) => {
                debug!(
                    operation = operation.as_str(),
                    status = %raw.status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Upstream response"
                );
                metrics::counter!(
                    "relay_upstream_requests_total",
                    "operation" => operation.as_str(),
                    "status" => raw.status.as_u16().to_string()
                )
                .increment(1);
                Ok(raw)
            }
            Err(e) => {
                error!(operation = operation.as_str(), error = %e, "Upstream request failed");
                metrics::counter!(
                    "relay_upstream_failures_total",
                    "operation" => operation.as_str()
                )
                .increment(1);
                Err(ApiError::Transport(e))
            }
        }
    }
}
