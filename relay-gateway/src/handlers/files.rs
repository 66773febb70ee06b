use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use tracing::{debug, info};

use crate::models::{
    parse_json_body, ApiError, ApiKey, ApiResult, CredentialRequest, RelayedResponse,
    UploadResponse,
};
use crate::services::{PendingUpload, UploadCoordinator};
use crate::utils::FileValidator;
use crate::AppState;

/// Fields pulled out of the multipart form, before validation.
#[derive(Debug, Default)]
struct UploadForm {
    api_key: Option<String>,
    file: Option<(Option<String>, Bytes)>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            debug!(field = %name, "Processing multipart field");

            match name.as_str() {
                "api_key" => form.api_key = Some(field.text().await?),
                "file" => {
                    let filename = field.file_name().map(|s| s.to_string());
                    let data = field.bytes().await?;
                    form.file = Some((filename, data));
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Check fields in the order a caller would fix them: key, file, name.
    fn into_pending(self) -> ApiResult<PendingUpload> {
        let api_key = self
            .api_key
            .and_then(ApiKey::new)
            .ok_or_else(|| ApiError::validation("Missing API key"))?;

        let (filename, content) = self
            .file
            .ok_or_else(|| ApiError::validation("No file provided"))?;

        let filename = filename
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::validation("No file selected"))?;

        let filename = FileValidator::validate_filename(&filename)
            .map_err(|e| ApiError::validation(e.to_string()))?;

        Ok(PendingUpload {
            api_key,
            filename,
            content,
        })
    }
}

/// Upload a file: register it upstream, then push the bytes to the storage
/// target the upstream hands back.
///
/// POST /api/upload-file (multipart: `api_key`, `file`)
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let multipart = multipart.map_err(|rejection| {
        ApiError::validation(format!("Expected a multipart form: {}", rejection.body_text()))
    })?;

    let pending = UploadForm::read(multipart).await?.into_pending()?;
    info!(filename = %pending.filename, size = pending.content.len(), "Starting two-phase upload");

    let result = UploadCoordinator::new(&state.upstream).run(pending).await?;
    Ok(Json(result.into()))
}

/// POST /api/get-file/:file_id
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    body: Bytes,
) -> ApiResult<RelayedResponse> {
    let api_key = parse_json_body::<CredentialRequest>(&body)?.into_api_key()?;
    state.upstream.get_file(&api_key, &file_id).await
}

/// POST /api/list-files
pub async fn list_files(State(state): State<AppState>, body: Bytes) -> ApiResult<RelayedResponse> {
    let api_key = parse_json_body::<CredentialRequest>(&body)?.into_api_key()?;
    state.upstream.list_files(&api_key).await
}
