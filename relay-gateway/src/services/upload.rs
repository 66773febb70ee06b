//! Two-phase file upload.
//!
//! The upstream splits a file upload into metadata registration and blob
//! transfer. The coordinator walks a single upload through
//!
//! ```text
//! Idle ──create record──▶ RecordCreated ──PUT bytes──▶ Uploaded
//!   │                          │
//!   └────────────▶ Failed ◀────┘
//! ```
//!
//! Each state is its own type ([`PendingUpload`], [`FileRecord`],
//! [`UploadResult`]); `Failed` is the `Err` side of each transition. Nothing
//! is retried or rolled back. A failure after the record exists leaves an
//! orphaned record upstream.

use axum::http::StatusCode;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::models::{ApiError, ApiKey, ApiResult, UploadResponse};
use crate::services::upstream::UpstreamClient;
use crate::utils::UrlValidator;

/// Idle: everything needed to start, already validated and sanitized.
#[derive(Debug)]
pub struct PendingUpload {
    pub api_key: ApiKey,
    pub filename: String,
    pub content: Bytes,
}

/// RecordCreated: the upstream has registered the file and handed out a
/// short-lived write target.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: String,
    pub upload_url: String,
    pub filename: String,
}

/// Uploaded: synthesized locally from the record and the payload length.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub file_id: String,
    pub filename: String,
    pub size: usize,
}

impl From<UploadResult> for UploadResponse {
    fn from(result: UploadResult) -> Self {
        UploadResponse {
            success: true,
            file_id: result.file_id,
            filename: result.filename,
            size: result.size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileRecordBody {
    id: Option<Value>,
    upload_url: Option<String>,
}

/// File ids are relayed as text; the upstream may hand out numbers.
fn file_id_text(id: Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct UploadCoordinator<'a> {
    upstream: &'a UpstreamClient,
}

impl<'a> UploadCoordinator<'a> {
    pub fn new(upstream: &'a UpstreamClient) -> Self {
        Self { upstream }
    }

    /// Run both phases. Succeeds only if both do.
    pub async fn run(&self, upload: PendingUpload) -> ApiResult<UploadResult> {
        let outcome = match self.create_record(&upload.api_key, &upload.filename).await {
            Ok(record) => self.upload_content(record, upload.content).await,
            Err(e) => Err(e),
        };

        let label = match &outcome {
            Ok(_) => "uploaded",
            Err(ApiError::FileRecordRejected { .. }) => "record_rejected",
            Err(ApiError::ContentUploadFailed) => "content_failed",
            Err(_) => "error",
        };
        metrics::counter!("relay_uploads_total", "outcome" => label).increment(1);

        outcome
    }

    /// Idle -> RecordCreated
    pub async fn create_record(&self, api_key: &ApiKey, filename: &str) -> ApiResult<FileRecord> {
        let raw = self.upstream.create_file_record(api_key, filename).await?;

        if raw.status != StatusCode::OK {
            warn!(status = %raw.status, filename, "Upstream refused file record");
            return Err(ApiError::FileRecordRejected {
                details: raw.text(),
            });
        }

        let body: FileRecordBody = serde_json::from_slice(&raw.body)?;
        let record = FileRecord {
            id: body
                .id
                .and_then(file_id_text)
                .ok_or(ApiError::MissingField("id"))?,
            upload_url: body.upload_url.ok_or(ApiError::MissingField("upload_url"))?,
            filename: filename.to_string(),
        };

        info!(file_id = %record.id, filename, "File record created");
        Ok(record)
    }

    /// RecordCreated -> Uploaded
    ///
    /// The storage target is outside our control, so its response body is
    /// never surfaced; every failure collapses to [`ApiError::ContentUploadFailed`].
    pub async fn upload_content(&self, record: FileRecord, content: Bytes) -> ApiResult<UploadResult> {
        if let Err(e) = UrlValidator::validate(&record.upload_url) {
            error!(file_id = %record.id, error = %e, "Upstream returned an unusable upload target");
            return Err(ApiError::ContentUploadFailed);
        }

        let size = content.len();
        match self.upstream.upload_content(&record.upload_url, content).await {
            Ok(status) if status == StatusCode::OK || status == StatusCode::CREATED => {
                info!(file_id = %record.id, size, "File content uploaded");
                Ok(UploadResult {
                    file_id: record.id,
                    filename: record.filename,
                    size,
                })
            }
            Ok(status) => {
                warn!(file_id = %record.id, status = %status, "Storage target rejected file content");
                Err(ApiError::ContentUploadFailed)
            }
            Err(e) => {
                error!(file_id = %record.id, error = %e, "File content upload failed");
                Err(ApiError::ContentUploadFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn upstream_for(base_url: &str) -> UpstreamClient {
        let mut config = AppConfig::default();
        config.upstream.base_url = base_url.to_string();
        UpstreamClient::new(&config).unwrap()
    }

    fn pending(content: &'static [u8]) -> PendingUpload {
        PendingUpload {
            api_key: ApiKey::new("sk-test").unwrap(),
            filename: "report.pdf".to_string(),
            content: Bytes::from_static(content),
        }
    }

    #[tokio::test]
    async fn test_both_phases_succeed() {
        let mut server = mockito::Server::new_async().await;
        let upload_url = format!("{}/put", server.url());
        let record = server
            .mock("POST", "/v1/files")
            .match_header("api_key", "sk-test")
            .match_body(Matcher::Json(json!({ "filename": "report.pdf" })))
            .with_status(200)
            .with_body(json!({ "id": "f1", "upload_url": upload_url }).to_string())
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/put")
            .match_body("%PDF-1.7")
            .with_status(200)
            .create_async()
            .await;

        let upstream = upstream_for(&server.url());
        let result = UploadCoordinator::new(&upstream)
            .run(pending(b"%PDF-1.7"))
            .await
            .unwrap();

        assert_eq!(
            result,
            UploadResult {
                file_id: "f1".to_string(),
                filename: "report.pdf".to_string(),
                size: 8,
            }
        );
        record.assert_async().await;
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_record_rejection_skips_content_upload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/files")
            .with_status(401)
            .with_body(r#"{"message":"invalid api key"}"#)
            .create_async()
            .await;
        let put = server
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let upstream = upstream_for(&server.url());
        let err = UploadCoordinator::new(&upstream)
            .run(pending(b"data"))
            .await
            .unwrap_err();

        match err {
            ApiError::FileRecordRejected { details } => {
                assert_eq!(details, r#"{"message":"invalid api key"}"#)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_created_status_is_not_enough_for_record() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/files")
            .with_status(201)
            .with_body(r#"{"id":"f1","upload_url":"http://stub/put"}"#)
            .create_async()
            .await;

        let upstream = upstream_for(&server.url());
        let err = UploadCoordinator::new(&upstream)
            .create_record(&ApiKey::new("k").unwrap(), "a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::FileRecordRejected { .. }));
    }

    #[tokio::test]
    async fn test_numeric_file_id_accepted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/files")
            .with_status(200)
            .with_body(r#"{"id":1234,"upload_url":"https://storage.example/put"}"#)
            .create_async()
            .await;

        let upstream = upstream_for(&server.url());
        let record = UploadCoordinator::new(&upstream)
            .create_record(&ApiKey::new("k").unwrap(), "a.txt")
            .await
            .unwrap();

        assert_eq!(record.id, "1234");
        assert_eq!(record.upload_url, "https://storage.example/put");
    }

    #[tokio::test]
    async fn test_missing_upload_url_is_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/files")
            .with_status(200)
            .with_body(r#"{"id":"f1"}"#)
            .create_async()
            .await;

        let upstream = upstream_for(&server.url());
        let err = UploadCoordinator::new(&upstream)
            .run(pending(b"data"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingField("upload_url")));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_storage_failure_hides_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/put")
            .with_status(500)
            .with_body("<Error><Code>SignatureDoesNotMatch</Code></Error>")
            .create_async()
            .await;

        let upstream = upstream_for("http://unused.invalid");
        let record = FileRecord {
            id: "f1".to_string(),
            upload_url: format!("{}/put", server.url()),
            filename: "a.txt".to_string(),
        };
        let err = UploadCoordinator::new(&upstream)
            .upload_content(record, Bytes::from_static(b"data"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ContentUploadFailed));
        assert!(!err.to_string().contains("SignatureDoesNotMatch"));
    }

    #[tokio::test]
    async fn test_storage_transport_failure_is_client_error() {
        let upstream = upstream_for("http://unused.invalid");
        let record = FileRecord {
            id: "f1".to_string(),
            upload_url: "http://127.0.0.1:1/put".to_string(),
            filename: "a.txt".to_string(),
        };
        let err = UploadCoordinator::new(&upstream)
            .upload_content(record, Bytes::from_static(b"data"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ContentUploadFailed));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unusable_upload_target_rejected() {
        let upstream = upstream_for("http://unused.invalid");
        let record = FileRecord {
            id: "f1".to_string(),
            upload_url: "file:///tmp/x".to_string(),
            filename: "a.txt".to_string(),
        };
        let err = UploadCoordinator::new(&upstream)
            .upload_content(record, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ContentUploadFailed));
    }
}
