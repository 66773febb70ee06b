use axum::extract::{Path, State};
use bytes::Bytes;
use tracing::info;

use crate::models::{parse_json_body, ApiResult, CreateTaskRequest, CredentialRequest, RelayedResponse};
use crate::AppState;

/// Create a task, or continue one when `task_id` is supplied.
///
/// POST /api/create-task
pub async fn create_task(State(state): State<AppState>, body: Bytes) -> ApiResult<RelayedResponse> {
    let request: CreateTaskRequest = parse_json_body(&body)?;
    let (api_key, payload) = request.into_upstream()?;

    info!(
        continuation = payload.task_id.is_some(),
        agent_profile = %payload.agent_profile,
        task_mode = %payload.task_mode,
        attachments = payload.attachments.is_some(),
        "Relaying task creation"
    );

    state.upstream.create_task(&api_key, &payload).await
}

/// POST /api/get-task/:task_id
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    body: Bytes,
) -> ApiResult<RelayedResponse> {
    let api_key = parse_json_body::<CredentialRequest>(&body)?.into_api_key()?;
    state.upstream.get_task(&api_key, &task_id).await
}

/// POST /api/list-tasks
pub async fn list_tasks(State(state): State<AppState>, body: Bytes) -> ApiResult<RelayedResponse> {
    let api_key = parse_json_body::<CredentialRequest>(&body)?.into_api_key()?;
    state.upstream.list_tasks(&api_key).await
}
